#![no_main]

use image_meta_io::{parse_exif_info, XmpPacket};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Packet validation and lookups should all be safe
    if let Ok(xmp) = XmpPacket::parse(data) {
        let _ = xmp.property("dc:title");
        let _ = xmp.property("dc:format");
        let _ = xmp.property("");
        let _ = xmp.property("x".repeat(1000).as_str());
    }

    // The same bytes as a TIFF/EXIF blob
    let _ = parse_exif_info(data);
});
