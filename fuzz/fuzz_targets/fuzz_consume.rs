#![no_main]

use image_meta_io::{MetadataFormat, Reader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First byte picks the split size, the rest is the stream.
    // This should NEVER panic, whatever the input or the split.
    let Some((&split, stream)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).max(1);

    for &format in MetadataFormat::all() {
        let mut reader = Reader::new(format);
        for block in stream.chunks(split) {
            reader.consume(block);
            if reader.is_finished() {
                break;
            }
        }

        // Resolve everything the reader can produce
        let _ = reader.icc_profile();
        let _ = reader.xmp_data();
        let _ = reader.exif_info();
        let _ = reader.take_raw_exif_chunk();
        assert!(reader.take_raw_exif_chunk().is_none());
    }

    // Format detection on the raw header
    let _ = MetadataFormat::detect(stream);
});
