//! Test utilities for building synthetic JPEG and PNG streams.
//!
//! This module provides fixture builders for:
//! - JPEG marker segments (EXIF, XMP, ICC) and minimal JPEG files
//! - CRC-correct PNG chunks, zlib-compressed iCCP chunks and minimal PNG files
//!   (requires the `png` feature)
//! - TIFF/EXIF blobs with selected tags ([`ExifBuilder`])
//!
//! # Usage
//!
//! ```
//! use image_meta_io::test_utils::*;
//!
//! let jpeg = minimal_jpeg(&[xmp_app1(TEST_XMP)]);
//! assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
//! ```

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// A small XMP packet with a `dc:format` attribute and an `xmp:Rating` element
pub const TEST_XMP: &str = r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
    <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
        <rdf:Description rdf:about=""
            xmlns:dc="http://purl.org/dc/elements/1.1/"
            xmlns:xmp="http://ns.adobe.com/xap/1.0/"
            dc:format="image/jpeg">
            <xmp:Rating>4</xmp:Rating>
        </rdf:Description>
    </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#;

// ============================================================================
// JPEG
// ============================================================================

/// A JPEG marker segment: `FF marker length payload`
///
/// # Panics
///
/// Panics if the payload does not fit a 16-bit length field.
pub fn jpeg_segment(marker: u8, payload: &[u8]) -> Vec<u8> {
    let length = u16::try_from(payload.len() + 2).expect("segment payload too large");
    let mut segment = vec![0xFF, marker, 0, 0];
    BigEndian::write_u16(&mut segment[2..4], length);
    segment.extend_from_slice(payload);
    segment
}

/// APP1 segment carrying `"Exif\0\0"` followed by `tiff`
pub fn exif_app1(tiff: &[u8]) -> Vec<u8> {
    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(tiff);
    jpeg_segment(0xE1, &payload)
}

/// APP1 segment carrying an XMP packet
pub fn xmp_app1(xmp: &str) -> Vec<u8> {
    let mut payload = b"http://ns.adobe.com/xap/1.0/\0".to_vec();
    payload.extend_from_slice(xmp.as_bytes());
    jpeg_segment(0xE1, &payload)
}

/// APP2 segment carrying a whole ICC profile (sequence 1 of 1)
pub fn icc_app2(profile: &[u8]) -> Vec<u8> {
    let mut payload = b"ICC_PROFILE\0\x01\x01".to_vec();
    payload.extend_from_slice(profile);
    jpeg_segment(0xE2, &payload)
}

/// A JPEG file: SOI, the given segments, then a quantization table, a scan
/// header, a few bytes of scan data and EOI
pub fn minimal_jpeg(segments: &[Vec<u8>]) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    for segment in segments {
        data.extend_from_slice(segment);
    }
    data.extend_from_slice(&jpeg_segment(0xDB, &[0; 65]));
    data.extend_from_slice(&jpeg_segment(0xDA, &[1, 1, 0, 0, 0x3F, 0]));
    data.extend_from_slice(&[0x12, 0x34, 0x56, 0xFF, 0xD9]);
    data
}

// ============================================================================
// PNG
// ============================================================================

#[cfg(feature = "png")]
pub use self::png::*;

#[cfg(feature = "png")]
mod png {
    use byteorder::{BigEndian, ByteOrder};
    use flate2::{write::ZlibEncoder, Compression};
    use std::io::Write;

    pub const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

    /// A PNG chunk with a correct CRC
    pub fn png_chunk(name: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut chunk = vec![0u8; 4];
        BigEndian::write_u32(&mut chunk, data.len() as u32);
        chunk.extend_from_slice(name);
        chunk.extend_from_slice(data);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(name);
        hasher.update(data);
        chunk.extend_from_slice(&hasher.finalize().to_be_bytes());
        chunk
    }

    /// IHDR chunk of a 1x1 8-bit RGB image
    pub fn png_ihdr() -> Vec<u8> {
        png_chunk(b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 2, 0, 0, 0])
    }

    pub fn png_iend() -> Vec<u8> {
        png_chunk(b"IEND", &[])
    }

    /// iTXt chunk carrying an XMP packet
    pub fn itxt_xmp_chunk(xmp: &str) -> Vec<u8> {
        let mut data = b"XML:com.adobe.xmp\0\0\0\0\0".to_vec();
        data.extend_from_slice(xmp.as_bytes());
        png_chunk(b"iTXt", &data)
    }

    /// iCCP chunk carrying a zlib-compressed profile
    pub fn iccp_chunk(name: &[u8], profile: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(profile)
            .expect("writing to a Vec cannot fail");
        let compressed = encoder.finish().expect("writing to a Vec cannot fail");

        let mut data = name.to_vec();
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(&compressed);
        png_chunk(b"iCCP", &data)
    }

    /// A PNG file: signature, IHDR, the given chunks, one IDAT and IEND
    pub fn minimal_png(chunks: &[Vec<u8>]) -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(&png_ihdr());
        for chunk in chunks {
            data.extend_from_slice(chunk);
        }
        data.extend_from_slice(&png_chunk(
            b"IDAT",
            &[0x78, 0x9C, 0x63, 0x60, 0x60, 0x60, 0, 0, 0, 4, 0, 1],
        ));
        data.extend_from_slice(&png_iend());
        data
    }
}

// ============================================================================
// EXIF
// ============================================================================

const TIFF_SHORT: u16 = 3;
const TIFF_LONG: u16 = 4;
const TIFF_ASCII: u16 = 2;
const TIFF_RATIONAL: u16 = 5;

const TAG_ORIENTATION: u16 = 0x0112;
const TAG_EXIF_IFD_POINTER: u16 = 0x8769;
const TAG_COLOR_SPACE: u16 = 0xA001;
const TAG_GAMMA: u16 = 0xA500;

#[derive(Debug, Clone)]
struct Field {
    tag: u16,
    kind: u16,
    count: u32,
    bytes: Vec<u8>,
}

/// Builder for a TIFF structure in an `"Exif\0\0"` envelope
///
/// IFD0 holds orientation, ASCII and rational tags. Colour space and gamma
/// go to an EXIF sub-IFD that is linked from IFD0 when present.
///
/// # Example
///
/// ```
/// use image_meta_io::test_utils::ExifBuilder;
///
/// let exif = ExifBuilder::new(true).orientation(6).build();
/// assert!(exif.starts_with(b"Exif\0\0MM"));
/// ```
#[derive(Debug, Clone)]
pub struct ExifBuilder {
    big_endian: bool,
    ifd0: Vec<Field>,
    exif_ifd: Vec<Field>,
}

impl ExifBuilder {
    pub fn new(big_endian: bool) -> Self {
        Self {
            big_endian,
            ifd0: Vec::new(),
            exif_ifd: Vec::new(),
        }
    }

    pub fn orientation(mut self, value: u16) -> Self {
        let field = self.short_field(TAG_ORIENTATION, value);
        self.ifd0.push(field);
        self
    }

    /// NUL-terminated ASCII tag in IFD0
    pub fn ascii(mut self, tag: u16, value: &str) -> Self {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        self.ifd0.push(Field {
            tag,
            kind: TIFF_ASCII,
            count: bytes.len() as u32,
            bytes,
        });
        self
    }

    /// RATIONAL tag in IFD0
    pub fn rationals(mut self, tag: u16, values: &[(u32, u32)]) -> Self {
        let field = self.rational_field(tag, values);
        self.ifd0.push(field);
        self
    }

    /// ColorSpace tag in the EXIF sub-IFD
    pub fn color_space(mut self, value: u16) -> Self {
        let field = self.short_field(TAG_COLOR_SPACE, value);
        self.exif_ifd.push(field);
        self
    }

    /// Gamma tag in the EXIF sub-IFD
    pub fn gamma(mut self, numerator: u32, denominator: u32) -> Self {
        let field = self.rational_field(TAG_GAMMA, &[(numerator, denominator)]);
        self.exif_ifd.push(field);
        self
    }

    /// Serialize with the `"Exif\0\0"` prefix
    pub fn build(&self) -> Vec<u8> {
        let mut ifd0 = self.ifd0.clone();
        let exif_ifd_size = if self.exif_ifd.is_empty() {
            0
        } else {
            ifd_size(self.exif_ifd.len())
        };
        let has_exif_ifd = exif_ifd_size > 0;

        let ifd0_size = ifd_size(ifd0.len() + usize::from(has_exif_ifd));
        let exif_ifd_offset = 8 + ifd0_size;
        if has_exif_ifd {
            let mut bytes = vec![0u8; 4];
            self.write_u32(&mut bytes, exif_ifd_offset as u32);
            ifd0.push(Field {
                tag: TAG_EXIF_IFD_POINTER,
                kind: TIFF_LONG,
                count: 1,
                bytes,
            });
        }
        ifd0.sort_by_key(|f| f.tag);

        let data_base = exif_ifd_offset + exif_ifd_size;
        let mut data = Vec::new();

        let mut tiff = if self.big_endian {
            b"MM\0\x2A".to_vec()
        } else {
            b"II\x2A\0".to_vec()
        };
        self.push_u32(&mut tiff, 8);
        self.write_ifd(&mut tiff, &mut data, data_base, &ifd0);
        if has_exif_ifd {
            self.write_ifd(&mut tiff, &mut data, data_base, &self.exif_ifd);
        }
        tiff.extend_from_slice(&data);

        let mut exif = b"Exif\0\0".to_vec();
        exif.extend_from_slice(&tiff);
        exif
    }

    fn write_ifd(&self, out: &mut Vec<u8>, data: &mut Vec<u8>, data_base: usize, fields: &[Field]) {
        self.push_u16(out, fields.len() as u16);
        for field in fields {
            self.push_u16(out, field.tag);
            self.push_u16(out, field.kind);
            self.push_u32(out, field.count);
            if field.bytes.len() <= 4 {
                let mut inline = field.bytes.clone();
                inline.resize(4, 0);
                out.extend_from_slice(&inline);
            } else {
                self.push_u32(out, (data_base + data.len()) as u32);
                data.extend_from_slice(&field.bytes);
                if data.len() % 2 == 1 {
                    data.push(0);
                }
            }
        }
        // No next IFD
        self.push_u32(out, 0);
    }

    fn short_field(&self, tag: u16, value: u16) -> Field {
        let mut bytes = vec![0u8; 2];
        self.write_u16(&mut bytes, value);
        Field {
            tag,
            kind: TIFF_SHORT,
            count: 1,
            bytes,
        }
    }

    fn rational_field(&self, tag: u16, values: &[(u32, u32)]) -> Field {
        let mut bytes = vec![0u8; values.len() * 8];
        for (pair, (numerator, denominator)) in bytes.chunks_exact_mut(8).zip(values) {
            self.write_u32(&mut pair[0..4], *numerator);
            self.write_u32(&mut pair[4..8], *denominator);
        }
        Field {
            tag,
            kind: TIFF_RATIONAL,
            count: values.len() as u32,
            bytes,
        }
    }

    fn write_u16(&self, buf: &mut [u8], value: u16) {
        if self.big_endian {
            BigEndian::write_u16(buf, value);
        } else {
            LittleEndian::write_u16(buf, value);
        }
    }

    fn write_u32(&self, buf: &mut [u8], value: u32) {
        if self.big_endian {
            BigEndian::write_u32(buf, value);
        } else {
            LittleEndian::write_u32(buf, value);
        }
    }

    fn push_u16(&self, out: &mut Vec<u8>, value: u16) {
        let mut buf = [0u8; 2];
        self.write_u16(&mut buf, value);
        out.extend_from_slice(&buf);
    }

    fn push_u32(&self, out: &mut Vec<u8>, value: u32) {
        let mut buf = [0u8; 4];
        self.write_u32(&mut buf, value);
        out.extend_from_slice(&buf);
    }
}

/// Entry count, entries and next-IFD offset
fn ifd_size(entries: usize) -> usize {
    2 + 12 * entries + 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg_segment_length_covers_itself() {
        assert_eq!(jpeg_segment(0xE1, b"abc"), vec![0xFF, 0xE1, 0, 5, b'a', b'b', b'c']);
    }

    #[test]
    #[cfg(feature = "png")]
    fn test_png_chunk_crc() {
        // Well-known CRC of an empty IEND chunk
        assert_eq!(&png_iend()[8..], &[0xAE, 0x42, 0x60, 0x82]);
    }

    #[test]
    fn test_exif_builder_layout() {
        let exif = ExifBuilder::new(false).color_space(1).build();
        let tiff = &exif[6..];
        assert_eq!(&tiff[0..8], b"II\x2A\0\x08\0\0\0");
        // IFD0 holds only the sub-IFD pointer
        assert_eq!(LittleEndian::read_u16(&tiff[8..10]), 1);
        assert_eq!(LittleEndian::read_u16(&tiff[10..12]), TAG_EXIF_IFD_POINTER);
        assert_eq!(LittleEndian::read_u32(&tiff[18..22]), 8 + 18);
    }
}
