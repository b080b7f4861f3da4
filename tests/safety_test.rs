//! Safety tests - basic validation of resource limits
//!
//! These tests verify that hostile lengths and oversized payloads are bounded.
//! Comprehensive testing should be done with fuzzing (cargo-fuzz).

use image_meta_io::{ReaderOptions, DEFAULT_BLOCK_SIZE, MAX_ICC_PROFILE_SIZE, MAX_SEGMENT_SIZE};

#[test]
fn test_max_segment_size_constant() {
    // Verify the limit is reasonable
    assert_eq!(MAX_SEGMENT_SIZE, 256 * 1024 * 1024, "256 MB limit");

    // Should allow large legitimate segments
    assert!(MAX_SEGMENT_SIZE > 100_000_000, "Allow >100MB");

    // Should prevent DOS attacks
    assert!(MAX_SEGMENT_SIZE < 1_000_000_000, "Prevent >1GB");
}

#[test]
fn test_icc_profile_ceiling_constant() {
    assert_eq!(MAX_ICC_PROFILE_SIZE, 5 * 1024 * 1024, "5 MB limit");
    assert_eq!(
        ReaderOptions::default().get_max_icc_profile_size(),
        MAX_ICC_PROFILE_SIZE
    );
}

#[test]
fn test_default_block_size() {
    assert_eq!(DEFAULT_BLOCK_SIZE, 64 * 1024);
    assert_eq!(ReaderOptions::default().get_block_size(), DEFAULT_BLOCK_SIZE);
}

#[test]
#[cfg(feature = "jpeg")]
fn test_jpeg_declared_length_is_not_trusted() {
    use image_meta_io::{MetadataFormat, Reader};

    // APP1 claims 65533 payload bytes but the stream ends after a few
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE1, 0xFF, 0xFF];
    data.extend_from_slice(b"Exif\0\0MM");

    let mut reader = Reader::new(MetadataFormat::Jpeg);
    reader.consume(&data);
    assert!(!reader.is_finished());
    assert!(reader.take_raw_exif_chunk().is_none(), "partial segments are never exposed");
}

#[test]
#[cfg(feature = "png")]
fn test_png_chunk_length_out_of_range() {
    use image_meta_io::{MetadataReader, PngReader};

    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);

    let mut reader = PngReader::new();
    reader.consume(&data);
    assert!(reader.is_finished());
}

#[test]
#[cfg(all(feature = "png", feature = "test-utils"))]
fn test_png_huge_iccp_length_does_not_allocate() {
    use image_meta_io::{test_utils::*, MetadataReader, PngReader};

    // iCCP claiming 2 GB with only a few bytes behind it
    let mut data = PNG_SIGNATURE.to_vec();
    data.extend_from_slice(&png_ihdr());
    data.extend_from_slice(&0x7FFF_FFFFu32.to_be_bytes());
    data.extend_from_slice(b"iCCP");
    data.extend_from_slice(&[0; 64]);

    let mut reader = PngReader::new();
    reader.consume(&data);
    assert!(!reader.is_finished());
    assert!(reader.iccp_chunk().is_none());
}

#[test]
#[cfg(all(feature = "png", feature = "test-utils"))]
fn test_iccp_inflate_ceiling() {
    use image_meta_io::{test_utils::*, ColorProfile, MetadataReader, PngReader};

    // A highly compressible profile that inflates past the ceiling
    let profile = vec![0u8; 256 * 1024];
    let data = minimal_png(&[iccp_chunk(b"bomb", &profile), png_chunk(b"sRGB", &[0])]);

    let options = ReaderOptions::new().max_icc_profile_size(64 * 1024);
    let mut reader = PngReader::with_options(options);
    reader.consume(&data);
    assert!(reader.is_finished());
    // The oversized profile is rejected and sRGB takes over
    assert_eq!(reader.icc_profile(), Some(ColorProfile::Srgb));

    let mut reader = PngReader::new();
    reader.consume(&data);
    assert_eq!(reader.icc_profile(), Some(ColorProfile::Embedded(profile)));
}

#[test]
#[cfg(all(feature = "png", feature = "test-utils"))]
fn test_max_segment_size_skips_png_chunk() {
    use image_meta_io::{test_utils::*, MetadataReader, PngReader};

    let data = minimal_png(&[itxt_xmp_chunk(TEST_XMP), png_chunk(b"gAMA", &[0, 1, 0x86, 0xA0])]);
    let mut reader = PngReader::with_options(ReaderOptions::new().max_segment_size(64));
    reader.consume(&data);

    assert!(reader.is_finished());
    assert!(reader.xmp_chunk().is_none());
    assert!(reader.gama_chunk().is_some(), "small chunks are still read");
}

#[test]
#[cfg(all(feature = "exif", feature = "test-utils"))]
fn test_exif_offsets_out_of_range() {
    use image_meta_io::parse_exif_info;

    // IFD0 with one ASCII entry pointing far past the end
    let mut tiff = b"MM\0\x2A\0\0\0\x08".to_vec();
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x010Fu16.to_be_bytes());
    tiff.extend_from_slice(&2u16.to_be_bytes());
    tiff.extend_from_slice(&100u32.to_be_bytes());
    tiff.extend_from_slice(&0xFFFF_FF00u32.to_be_bytes());
    tiff.extend_from_slice(&[0; 4]);

    let info = parse_exif_info(&tiff).unwrap().unwrap();
    assert!(info.make.is_none());
}
