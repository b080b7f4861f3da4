//! Minimal TIFF/EXIF parser
//!
//! Reads the handful of EXIF tags the metadata readers care about:
//! - Orientation, for autorotation
//! - ColorSpace, WhitePoint, PrimaryChromaticities and Gamma, for colour
//!   profile fallback when no ICC profile is embedded
//! - Basic descriptive tags (Make, Model, DateTime, ...)
//!
//! TIFF Structure:
//! - Header: byte order (II/MM), magic (0x002A), IFD offset
//! - IFD (Image File Directory): tag count, tags (12 bytes each), next IFD offset
//! - Tags: tag ID (2), type (2), count (4), value/offset (4)

use crate::error::Result;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::io::{Cursor, Read, Seek, SeekFrom};

/// Signature preceding the TIFF header in JPEG APP1 segments
const EXIF_SIGNATURE: &[u8] = b"Exif\0\0";

/// TIFF/EXIF tag IDs
mod tags {
    // IFD0 (main image) tags
    pub const MAKE: u16 = 0x010F;
    pub const MODEL: u16 = 0x0110;
    pub const ORIENTATION: u16 = 0x0112;
    pub const SOFTWARE: u16 = 0x0131;
    pub const DATE_TIME: u16 = 0x0132;
    pub const ARTIST: u16 = 0x013B;
    pub const WHITE_POINT: u16 = 0x013E;
    pub const PRIMARY_CHROMATICITIES: u16 = 0x013F;
    pub const COPYRIGHT: u16 = 0x8298;
    pub const EXIF_IFD_POINTER: u16 = 0x8769;

    // EXIF sub-IFD tags
    pub const DATE_TIME_ORIGINAL: u16 = 0x9003;
    pub const COLOR_SPACE: u16 = 0xA001;
    pub const GAMMA: u16 = 0xA500;
}

/// TIFF data types
mod types {
    pub const ASCII: u16 = 2;
    pub const SHORT: u16 = 3;
    pub const LONG: u16 = 4;
    pub const RATIONAL: u16 = 5;
}

/// Values of the EXIF ColorSpace tag
pub mod color_space {
    pub const SRGB: u16 = 1;
    /// Not part of EXIF proper, but written by many cameras for Adobe RGB
    pub const ADOBE_RGB: u16 = 2;
    pub const UNCALIBRATED: u16 = 0xFFFF;
}

/// Maximum number of tags in an IFD (prevents DOS attacks)
const MAX_IFD_TAGS: u16 = 1000;

/// Byte order of the TIFF structure
#[derive(Debug, Clone, Copy)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn read_u16(&self, data: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(data),
            Endian::Big => BigEndian::read_u16(data),
        }
    }

    fn read_u32(&self, data: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(data),
            Endian::Big => BigEndian::read_u32(data),
        }
    }
}

/// Basic EXIF metadata
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExifInfo {
    /// Camera manufacturer (e.g., "Canon", "Nikon")
    pub make: Option<String>,
    /// Camera model (e.g., "EOS R5", "D850")
    pub model: Option<String>,
    /// Image orientation (1-8, where 1 is normal)
    pub orientation: Option<u16>,
    /// Software used to create/edit the image
    pub software: Option<String>,
    /// Date and time of image creation (format: "YYYY:MM:DD HH:MM:SS")
    pub date_time: Option<String>,
    /// Original capture date/time (from EXIF sub-IFD)
    pub date_time_original: Option<String>,
    /// Artist/photographer name
    pub artist: Option<String>,
    /// Copyright notice
    pub copyright: Option<String>,
    /// EXIF ColorSpace tag (see [`color_space`])
    pub color_space: Option<u16>,
    /// White point chromaticity (x, y)
    pub white_point: Option<[f64; 2]>,
    /// Primary chromaticities (red x, y, green x, y, blue x, y)
    pub primary_chromaticities: Option<[f64; 6]>,
    /// Gamma coefficient
    pub gamma: Option<f64>,
}

impl ExifInfo {
    /// True when the stored pixels are transposed relative to display
    ///
    /// Orientations 5-8 rotate by 90 or 270 degrees, so width and height swap.
    pub fn needs_dimension_swap(&self) -> bool {
        matches!(self.orientation, Some(5..=8))
    }
}

impl std::fmt::Display for ExifInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref make) = self.make {
            parts.push(make.clone());
        }
        if let Some(ref model) = self.model {
            parts.push(model.clone());
        }
        if let Some(dt) = self.date_time_original.as_ref().or(self.date_time.as_ref()) {
            parts.push(dt.clone());
        }
        if parts.is_empty() {
            write!(f, "(no metadata)")
        } else {
            write!(f, "{}", parts.join(" | "))
        }
    }
}

/// A raw 12-byte IFD entry
struct Entry {
    tag: u16,
    kind: u16,
    count: u32,
    value: [u8; 4],
}

impl Entry {
    fn value_or_offset(&self, order: Endian) -> u32 {
        order.read_u32(&self.value)
    }

    /// Inline SHORT value (left-justified in the value field)
    fn short(&self, order: Endian) -> Option<u16> {
        (self.kind == types::SHORT && self.count >= 1).then(|| order.read_u16(&self.value[0..2]))
    }
}

/// Parse EXIF data to extract basic metadata
///
/// Accepts the payload of a JPEG APP1 segment (starting with `"Exif\0\0"`) or
/// a bare TIFF structure. Returns `Ok(None)` if the data is not TIFF.
pub fn parse_exif_info(exif_data: &[u8]) -> Result<Option<ExifInfo>> {
    let data = exif_data.strip_prefix(EXIF_SIGNATURE).unwrap_or(exif_data);
    if data.len() < 8 {
        return Ok(None);
    }

    // Byte order: "II" (0x4949) = little endian, "MM" (0x4D4D) = big endian
    let order = match &data[0..2] {
        b"II" => Endian::Little,
        b"MM" => Endian::Big,
        _ => return Ok(None),
    };

    if order.read_u16(&data[2..4]) != 0x002A {
        return Ok(None);
    }

    let ifd0_offset = order.read_u32(&data[4..8]);
    if ifd0_offset as usize >= data.len() {
        return Ok(None);
    }

    let Some(entries) = read_ifd(data, ifd0_offset, order)? else {
        return Ok(None);
    };

    let mut info = ExifInfo::default();
    let mut exif_ifd_offset: Option<u32> = None;

    for entry in &entries {
        match entry.tag {
            tags::MAKE => info.make = read_ascii_tag(data, entry, order),
            tags::MODEL => info.model = read_ascii_tag(data, entry, order),
            tags::ORIENTATION => info.orientation = entry.short(order),
            tags::SOFTWARE => info.software = read_ascii_tag(data, entry, order),
            tags::DATE_TIME => info.date_time = read_ascii_tag(data, entry, order),
            tags::ARTIST => info.artist = read_ascii_tag(data, entry, order),
            tags::COPYRIGHT => info.copyright = read_ascii_tag(data, entry, order),
            tags::WHITE_POINT => {
                info.white_point = read_rational_tag(data, entry, order)
                    .and_then(|v| <[f64; 2]>::try_from(v).ok());
            }
            tags::PRIMARY_CHROMATICITIES => {
                info.primary_chromaticities = read_rational_tag(data, entry, order)
                    .and_then(|v| <[f64; 6]>::try_from(v).ok());
            }
            tags::EXIF_IFD_POINTER => {
                if entry.kind == types::LONG {
                    exif_ifd_offset = Some(entry.value_or_offset(order));
                }
            }
            _ => {}
        }
    }

    if let Some(offset) = exif_ifd_offset {
        parse_exif_subifd(data, offset, order, &mut info)?;
    }

    Ok(Some(info))
}

/// Read the entries of the IFD at `offset`
///
/// Returns `Ok(None)` for an out-of-range offset or a suspicious tag count.
/// A truncated entry list yields the entries read so far.
fn read_ifd(data: &[u8], offset: u32, order: Endian) -> Result<Option<Vec<Entry>>> {
    if offset as usize >= data.len() {
        return Ok(None);
    }

    let mut cursor = Cursor::new(data);
    cursor.seek(SeekFrom::Start(offset as u64))?;

    let mut count_bytes = [0u8; 2];
    if cursor.read_exact(&mut count_bytes).is_err() {
        return Ok(None);
    }
    let tag_count = order.read_u16(&count_bytes);

    if tag_count > MAX_IFD_TAGS {
        log::debug!("EXIF: IFD at {} claims {} tags, ignoring", offset, tag_count);
        return Ok(None);
    }

    let mut entries = Vec::with_capacity(tag_count as usize);
    for _ in 0..tag_count {
        let mut tag_bytes = [0u8; 12];
        if cursor.read_exact(&mut tag_bytes).is_err() {
            break;
        }

        entries.push(Entry {
            tag: order.read_u16(&tag_bytes[0..2]),
            kind: order.read_u16(&tag_bytes[2..4]),
            count: order.read_u32(&tag_bytes[4..8]),
            value: [tag_bytes[8], tag_bytes[9], tag_bytes[10], tag_bytes[11]],
        });
    }

    Ok(Some(entries))
}

/// Parse the EXIF sub-IFD for capture time and colour information
fn parse_exif_subifd(data: &[u8], offset: u32, order: Endian, info: &mut ExifInfo) -> Result<()> {
    let Some(entries) = read_ifd(data, offset, order)? else {
        return Ok(());
    };

    for entry in &entries {
        match entry.tag {
            tags::DATE_TIME_ORIGINAL => {
                info.date_time_original = read_ascii_tag(data, entry, order);
            }
            tags::COLOR_SPACE => info.color_space = entry.short(order),
            tags::GAMMA => {
                info.gamma = read_rational_tag(data, entry, order).and_then(|v| v.first().copied());
            }
            _ => {}
        }
    }

    Ok(())
}

/// Read an ASCII string tag value
fn read_ascii_tag(data: &[u8], entry: &Entry, order: Endian) -> Option<String> {
    if entry.kind != types::ASCII || entry.count == 0 {
        return None;
    }

    let bytes = if entry.count <= 4 {
        // Value is inline in the tag
        entry.value[..entry.count as usize].to_vec()
    } else {
        let offset = entry.value_or_offset(order) as usize;
        let end = offset.checked_add(entry.count as usize)?;
        data.get(offset..end)?.to_vec()
    };

    // Convert to string, trimming null terminator
    String::from_utf8(bytes)
        .ok()
        .map(|s| s.trim_end_matches('\0').trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Read a RATIONAL tag as floating point values
///
/// RATIONAL values (8 bytes each) never fit inline, so they always live at
/// the offset. A zero denominator invalidates the whole tag.
fn read_rational_tag(data: &[u8], entry: &Entry, order: Endian) -> Option<Vec<f64>> {
    if entry.kind != types::RATIONAL || entry.count == 0 || entry.count > 16 {
        return None;
    }

    let offset = entry.value_or_offset(order) as usize;
    let end = offset.checked_add(entry.count as usize * 8)?;
    let raw = data.get(offset..end)?;

    raw.chunks_exact(8)
        .map(|pair| {
            let numerator = order.read_u32(&pair[0..4]);
            let denominator = order.read_u32(&pair[4..8]);
            (denominator != 0).then(|| numerator as f64 / denominator as f64)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ExifBuilder;

    #[test]
    fn test_byte_order() {
        let be = Endian::Big;
        let le = Endian::Little;

        assert_eq!(be.read_u16(&[0x12, 0x34]), 0x1234);
        assert_eq!(le.read_u16(&[0x34, 0x12]), 0x1234);

        assert_eq!(be.read_u32(&[0x12, 0x34, 0x56, 0x78]), 0x12345678);
        assert_eq!(le.read_u32(&[0x78, 0x56, 0x34, 0x12]), 0x12345678);
    }

    #[test]
    fn test_orientation_both_byte_orders() {
        for big_endian in [false, true] {
            let exif = ExifBuilder::new(big_endian).orientation(6).build();
            let info = parse_exif_info(&exif).unwrap().unwrap();
            assert_eq!(info.orientation, Some(6), "big_endian = {}", big_endian);
            assert!(info.needs_dimension_swap());
        }
    }

    #[test]
    fn test_ascii_tags() {
        let exif = ExifBuilder::new(false)
            .ascii(tags::MAKE, "Canon")
            .ascii(tags::MODEL, "EOS R5")
            .ascii(tags::ARTIST, "AB")
            .build();
        let info = parse_exif_info(&exif).unwrap().unwrap();
        assert_eq!(info.make.as_deref(), Some("Canon"));
        assert_eq!(info.model.as_deref(), Some("EOS R5"));
        // Short enough to be stored inline
        assert_eq!(info.artist.as_deref(), Some("AB"));
        assert_eq!(info.to_string(), "Canon | EOS R5");
    }

    #[test]
    fn test_colour_tags() {
        let exif = ExifBuilder::new(true)
            .color_space(color_space::UNCALIBRATED)
            .rationals(tags::WHITE_POINT, &[(3127, 10000), (3290, 10000)])
            .rationals(
                tags::PRIMARY_CHROMATICITIES,
                &[(64, 100), (33, 100), (21, 100), (71, 100), (15, 100), (6, 100)],
            )
            .gamma(22, 10)
            .build();
        let info = parse_exif_info(&exif).unwrap().unwrap();
        assert_eq!(info.color_space, Some(color_space::UNCALIBRATED));
        assert_eq!(info.white_point, Some([0.3127, 0.329]));
        assert_eq!(info.primary_chromaticities.unwrap()[3], 0.71);
        assert_eq!(info.gamma, Some(2.2));
    }

    #[test]
    fn test_not_tiff() {
        assert!(parse_exif_info(b"Exif\0\0XX").unwrap().is_none());
        assert!(parse_exif_info(b"Exif\0\0MM\0\x2A\xFF\xFF\xFF\xFF").unwrap().is_none());
        assert!(parse_exif_info(&[]).unwrap().is_none());
    }

    #[test]
    fn test_excessive_tag_count_is_ignored() {
        let mut data = b"MM\0\x2A\0\0\0\x08".to_vec();
        data.extend_from_slice(&5000u16.to_be_bytes());
        data.extend_from_slice(&[0; 64]);
        assert!(parse_exif_info(&data).unwrap().is_none());
    }
}
