//! PNG metadata reader
//!
//! Walks the chunk sequence of a PNG stream and keeps the first XMP (iTXt),
//! iCCP, sRGB, cHRM and gAMA chunks whose CRC checks out. Chunk layout:
//!
//! ```text
//! length (4, big-endian) | type (4) | data (length) | CRC32 over type ++ data (4)
//! ```

use super::{MetadataFormat, MetadataReader};
use crate::{
    profile::{self, ColorProfile},
    segment::{Accumulator, Skip},
    ReaderOptions,
};
use byteorder::{BigEndian, ByteOrder};

// PNG signature
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

// Chunk types
const IHDR: &[u8; 4] = b"IHDR";
const IEND: &[u8; 4] = b"IEND";
const ITXT: &[u8; 4] = b"iTXt";
const ICCP: &[u8; 4] = b"iCCP";
const SRGB: &[u8; 4] = b"sRGB";
const CHRM: &[u8; 4] = b"cHRM";
const GAMA: &[u8; 4] = b"gAMA";

const IHDR_LEN: u32 = 13;
const SRGB_LEN: usize = 1;
const CHRM_LEN: usize = 32;
const GAMA_LEN: usize = 4;
const CRC_LEN: usize = 4;

/// Chunk lengths are limited to 2^31 - 1
const MAX_CHUNK_LEN: u32 = 0x7FFF_FFFF;

/// iTXt keyword, NUL separator, compression flag and method, empty language
/// tag and empty translated keyword of an XMP packet
const XMP_ITXT_HEADER: &[u8] = b"XML:com.adobe.xmp\0\0\0\0\0";

/// Shortest iTXt chunk considered for XMP
const MIN_XMP_ITXT_LEN: usize = 76;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ReadMagic,
    ReadSizeHighHigh,
    ReadSizeHighLow,
    ReadSizeLowHigh,
    ReadSizeLowLow,
    ReadChunkName,
    SkipBytes,
    CheckCrc,
    SkipCrc,
    ReadXmpItxt,
    ReadIccp,
    ReadSrgb,
    ReadChrm,
    ReadGama,
    Finished,
}

/// Incremental PNG metadata reader
///
/// # Example
///
/// ```
/// use image_meta_io::{MetadataReader, PngReader};
///
/// let mut reader = PngReader::new();
/// reader.consume(b"GIF89a");
/// assert!(reader.is_finished());
/// assert!(reader.icc_profile().is_none());
/// ```
#[derive(Debug)]
pub struct PngReader {
    state: State,
    options: ReaderOptions,
    magic_pos: usize,
    size_bytes: [u8; 4],
    size: u32,
    name: [u8; 4],
    name_pos: usize,
    crc_bytes: [u8; 4],
    crc_pos: usize,
    seen_ihdr: bool,
    acc: Accumulator,
    skip: Skip,

    xmp: Option<Vec<u8>>,
    iccp: Option<Vec<u8>>,
    srgb: Option<Vec<u8>>,
    chrm: Option<Vec<u8>>,
    gama: Option<Vec<u8>>,
}

impl Default for PngReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PngReader {
    pub fn new() -> Self {
        Self::with_options(ReaderOptions::default())
    }

    pub fn with_options(options: ReaderOptions) -> Self {
        Self {
            state: State::ReadMagic,
            options,
            magic_pos: 0,
            size_bytes: [0; 4],
            size: 0,
            name: [0; 4],
            name_pos: 0,
            crc_bytes: [0; 4],
            crc_pos: 0,
            seen_ihdr: false,
            acc: Accumulator::default(),
            skip: Skip::default(),
            xmp: None,
            iccp: None,
            srgb: None,
            chrm: None,
            gama: None,
        }
    }

    /// Raw iCCP payload (profile name, method, compressed profile)
    pub fn iccp_chunk(&self) -> Option<&[u8]> {
        self.iccp.as_deref()
    }

    /// Raw sRGB payload (rendering intent)
    pub fn srgb_chunk(&self) -> Option<&[u8]> {
        self.srgb.as_deref()
    }

    /// Raw cHRM payload (white point and primaries, fixed point)
    pub fn chrm_chunk(&self) -> Option<&[u8]> {
        self.chrm.as_deref()
    }

    /// Raw gAMA payload (gamma, fixed point)
    pub fn gama_chunk(&self) -> Option<&[u8]> {
        self.gama.as_deref()
    }

    fn chunk_name(&self) -> &str {
        std::str::from_utf8(&self.name).unwrap_or("????")
    }

    /// Run the state machine over the front of `buf`, returning bytes consumed
    fn step(&mut self, buf: &[u8]) -> usize {
        let byte = buf[0];
        match self.state {
            State::ReadMagic => {
                if byte != PNG_SIGNATURE[self.magic_pos] {
                    log::debug!("PNG: bad signature at byte {}", self.magic_pos);
                    self.state = State::Finished;
                    return 1;
                }
                self.magic_pos += 1;
                if self.magic_pos == PNG_SIGNATURE.len() {
                    self.state = State::ReadSizeHighHigh;
                }
                1
            }
            State::ReadSizeHighHigh => {
                self.size_bytes[0] = byte;
                self.state = State::ReadSizeHighLow;
                1
            }
            State::ReadSizeHighLow => {
                self.size_bytes[1] = byte;
                self.state = State::ReadSizeLowHigh;
                1
            }
            State::ReadSizeLowHigh => {
                self.size_bytes[2] = byte;
                self.state = State::ReadSizeLowLow;
                1
            }
            State::ReadSizeLowLow => {
                self.size_bytes[3] = byte;
                self.size = BigEndian::read_u32(&self.size_bytes);
                if self.size > MAX_CHUNK_LEN {
                    log::warn!("PNG: chunk length {} out of range", self.size);
                    self.state = State::Finished;
                } else {
                    self.name_pos = 0;
                    self.state = State::ReadChunkName;
                }
                1
            }
            State::ReadChunkName => {
                self.name[self.name_pos] = byte;
                self.name_pos += 1;
                if self.name_pos == self.name.len() {
                    self.dispatch();
                }
                1
            }
            State::ReadXmpItxt if self.acc.filled().len() < XMP_ITXT_HEADER.len() => {
                let n = self.acc.fill_to(buf, XMP_ITXT_HEADER.len());
                if self.acc.filled().len() == XMP_ITXT_HEADER.len()
                    && !self.acc.filled().starts_with(XMP_ITXT_HEADER)
                {
                    log::trace!("PNG: iTXt is not XMP");
                    let rest = self.acc.remaining() as u64;
                    self.acc.discard();
                    self.skip = Skip::new(rest + CRC_LEN as u64);
                    self.state = State::SkipCrc;
                }
                n
            }
            State::ReadXmpItxt
            | State::ReadIccp
            | State::ReadSrgb
            | State::ReadChrm
            | State::ReadGama => {
                let n = self.acc.fill(buf);
                if self.acc.is_complete() {
                    self.crc_pos = 0;
                    self.state = State::CheckCrc;
                }
                n
            }
            State::CheckCrc => {
                self.crc_bytes[self.crc_pos] = byte;
                self.crc_pos += 1;
                if self.crc_pos == CRC_LEN {
                    self.check_crc();
                }
                1
            }
            State::SkipBytes | State::SkipCrc => {
                let n = self.skip.advance(buf);
                if self.skip.is_done() {
                    self.state = State::ReadSizeHighHigh;
                }
                n
            }
            State::Finished => buf.len(),
        }
    }

    /// Pick the state for the chunk whose name was just read
    fn dispatch(&mut self) {
        if !self.seen_ihdr {
            if &self.name != IHDR || self.size != IHDR_LEN {
                log::debug!(
                    "PNG: first chunk is {} ({} bytes), not IHDR",
                    self.chunk_name(),
                    self.size
                );
                self.state = State::Finished;
                return;
            }
            self.seen_ihdr = true;
        }

        let len = self.size as usize;
        let next = match &self.name {
            IEND => {
                log::trace!("PNG: IEND");
                self.state = State::Finished;
                return;
            }
            ITXT if len > MIN_XMP_ITXT_LEN && self.xmp.is_none() => State::ReadXmpItxt,
            ICCP if self.iccp.is_none() => State::ReadIccp,
            SRGB if len == SRGB_LEN && self.srgb.is_none() => State::ReadSrgb,
            CHRM if len == CHRM_LEN && self.chrm.is_none() => State::ReadChrm,
            GAMA if len == GAMA_LEN && self.gama.is_none() => State::ReadGama,
            _ => State::SkipBytes,
        };

        if next != State::SkipBytes && self.size as u64 > self.options.max_segment_size {
            log::warn!(
                "PNG: skipping {} byte {} chunk (limit {})",
                self.size,
                self.chunk_name(),
                self.options.max_segment_size
            );
            self.skip_chunk();
            return;
        }

        if next == State::SkipBytes {
            self.skip_chunk();
        } else {
            self.acc.begin(len);
            self.state = next;
        }
    }

    /// Skip the chunk data and its CRC
    fn skip_chunk(&mut self) {
        self.skip = Skip::new(self.size as u64 + CRC_LEN as u64);
        self.state = State::SkipBytes;
    }

    /// Validate the buffered chunk against the CRC just read and commit it
    fn check_crc(&mut self) {
        let expected = BigEndian::read_u32(&self.crc_bytes);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.name);
        hasher.update(self.acc.filled());
        let actual = hasher.finalize();

        if actual != expected {
            log::warn!(
                "PNG: CRC mismatch in {} chunk (expected {:08X}, got {:08X})",
                self.chunk_name(),
                expected,
                actual
            );
            self.acc.discard();
            self.state = State::Finished;
            return;
        }

        let chunk = self.acc.take();
        log::debug!("PNG: {} chunk complete, {} bytes", self.chunk_name(), chunk.len());
        let slot = match &self.name {
            ITXT => &mut self.xmp,
            ICCP => &mut self.iccp,
            SRGB => &mut self.srgb,
            CHRM => &mut self.chrm,
            _ => &mut self.gama,
        };
        *slot = Some(chunk);
        self.state = State::ReadSizeHighHigh;
    }
}

impl MetadataReader for PngReader {
    fn format() -> MetadataFormat {
        MetadataFormat::Png
    }

    fn extensions() -> &'static [&'static str] {
        &["png"]
    }

    fn mime_types() -> &'static [&'static str] {
        &["image/png"]
    }

    fn detect(header: &[u8]) -> Option<MetadataFormat> {
        if header.starts_with(PNG_SIGNATURE) {
            Some(MetadataFormat::Png)
        } else {
            None
        }
    }

    fn consume(&mut self, mut buf: &[u8]) {
        while !buf.is_empty() && self.state != State::Finished {
            let n = self.step(buf);
            buf = &buf[n..];
        }
    }

    fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    fn take_raw_exif_chunk(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn exif_chunk(&self) -> Option<&[u8]> {
        None
    }

    fn xmp_chunk(&self) -> Option<&[u8]> {
        self.xmp.as_deref()
    }

    fn xmp_bytes(&self) -> Option<&[u8]> {
        self.xmp
            .as_deref()
            .map(|chunk| &chunk[XMP_ITXT_HEADER.len()..])
    }

    fn icc_profile(&self) -> Option<ColorProfile> {
        if let Some(iccp) = &self.iccp {
            if let Some(data) = profile::inflate_iccp(iccp, self.options.max_icc_profile_size) {
                return Some(ColorProfile::Embedded(data));
            }
        }

        if self.srgb.is_some() {
            return Some(ColorProfile::Srgb);
        }

        match (&self.chrm, &self.gama) {
            (Some(chrm), Some(gama)) => profile::from_chrm_gama(chrm, gama),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        iccp_chunk, itxt_xmp_chunk, minimal_png, png_chunk, png_ihdr, TEST_XMP,
    };

    fn read_all(data: &[u8]) -> PngReader {
        let mut reader = PngReader::new();
        reader.consume(data);
        reader
    }

    fn chrm_payload() -> Vec<u8> {
        [31270u32, 32900, 64000, 33000, 30000, 60000, 15000, 6000]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect()
    }

    #[test]
    fn test_ihdr_iend_only() {
        let reader = read_all(&minimal_png(&[]));
        assert!(reader.is_finished());
        assert!(reader.xmp_chunk().is_none());
        assert!(reader.iccp_chunk().is_none());
        assert!(reader.srgb_chunk().is_none());
        assert!(reader.chrm_chunk().is_none());
        assert!(reader.gama_chunk().is_none());
        assert!(reader.icc_profile().is_none());
    }

    #[test]
    fn test_srgb_wrong_length_skipped() {
        let data = minimal_png(&[png_chunk(b"sRGB", &[0, 0])]);
        let reader = read_all(&data);
        assert!(reader.is_finished());
        assert!(reader.srgb_chunk().is_none());
        assert!(reader.icc_profile().is_none());
    }

    #[test]
    fn test_xmp_extracted() {
        let reader = read_all(&minimal_png(&[itxt_xmp_chunk(TEST_XMP)]));
        assert_eq!(reader.xmp_bytes(), Some(TEST_XMP.as_bytes()));
        assert!(reader.xmp_chunk().unwrap().starts_with(XMP_ITXT_HEADER));
    }

    #[test]
    fn test_non_xmp_itxt_skipped() {
        let mut text = b"Comment\0\0\0\0\0".to_vec();
        text.extend_from_slice(&[b'x'; 100]);
        let data = minimal_png(&[png_chunk(b"iTXt", &text), itxt_xmp_chunk(TEST_XMP)]);

        let reader = read_all(&data);
        assert_eq!(reader.xmp_bytes(), Some(TEST_XMP.as_bytes()));
    }

    #[test]
    fn test_short_itxt_skipped() {
        let data = minimal_png(&[itxt_xmp_chunk("<x/>")]);
        let reader = read_all(&data);
        assert!(reader.is_finished());
        assert!(reader.xmp_chunk().is_none());
    }

    #[test]
    fn test_itxt_length_boundary() {
        let mut text = XMP_ITXT_HEADER.to_vec();
        text.extend_from_slice(&[b' '; MIN_XMP_ITXT_LEN - XMP_ITXT_HEADER.len()]);
        let reader = read_all(&minimal_png(&[png_chunk(b"iTXt", &text)]));
        assert!(reader.is_finished());
        assert!(reader.xmp_chunk().is_none());

        text.push(b' ');
        let reader = read_all(&minimal_png(&[png_chunk(b"iTXt", &text)]));
        assert_eq!(reader.xmp_chunk().map(<[u8]>::len), Some(MIN_XMP_ITXT_LEN + 1));
    }

    #[test]
    fn test_non_xmp_itxt_not_buffered() {
        let mut text = b"Description\0\0\0\0\0\0\0\0\0\0\0".to_vec();
        text.extend_from_slice(&[b'x'; 500]);
        let data = minimal_png(&[png_chunk(b"iTXt", &text), itxt_xmp_chunk(TEST_XMP)]);

        // Signature, IHDR, chunk header, the keyword prefix and some text
        let partial = 8 + 25 + 8 + XMP_ITXT_HEADER.len() + 100;
        let mut reader = PngReader::new();
        reader.consume(&data[..partial]);
        assert!(reader.state == State::SkipCrc);
        assert!(reader.acc.filled().is_empty());

        reader.consume(&data[partial..]);
        assert!(reader.is_finished());
        assert_eq!(reader.xmp_bytes(), Some(TEST_XMP.as_bytes()));

        let mut split = PngReader::new();
        for byte in &data {
            split.consume(std::slice::from_ref(byte));
        }
        assert_eq!(split.xmp_chunk(), reader.xmp_chunk());
    }

    #[test]
    fn test_crc_mismatch_halts() {
        let mut bad = itxt_xmp_chunk(TEST_XMP);
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        let data = minimal_png(&[bad, png_chunk(b"sRGB", &[0])]);

        let reader = read_all(&data);
        assert!(reader.is_finished());
        assert!(reader.xmp_chunk().is_none());
        // Nothing after the bad chunk is read
        assert!(reader.srgb_chunk().is_none());
    }

    #[test]
    fn test_crc_mismatch_keeps_earlier_chunks() {
        let mut bad_gama = png_chunk(b"gAMA", &45455u32.to_be_bytes());
        let last = bad_gama.len() - 1;
        bad_gama[last] ^= 0xFF;
        let data = minimal_png(&[
            png_chunk(b"sRGB", &[0]),
            itxt_xmp_chunk(TEST_XMP),
            bad_gama,
        ]);

        let reader = read_all(&data);
        assert!(reader.is_finished());
        assert_eq!(reader.srgb_chunk(), Some(&[0][..]));
        assert_eq!(reader.xmp_bytes(), Some(TEST_XMP.as_bytes()));
        assert!(reader.gama_chunk().is_none());
        assert_eq!(reader.icc_profile(), Some(ColorProfile::Srgb));
    }

    #[test]
    fn test_first_iccp_wins() {
        let data = minimal_png(&[
            iccp_chunk(b"first", b"first profile"),
            iccp_chunk(b"second", b"second profile"),
        ]);
        let reader = read_all(&data);
        assert!(reader.iccp_chunk().unwrap().starts_with(b"first\0"));
        assert_eq!(
            reader.icc_profile(),
            Some(ColorProfile::Embedded(b"first profile".to_vec()))
        );
    }

    #[test]
    fn test_icc_fallbacks() {
        let reader = read_all(&minimal_png(&[
            png_chunk(b"sRGB", &[0]),
            png_chunk(b"gAMA", &45455u32.to_be_bytes()),
            png_chunk(b"cHRM", &chrm_payload()),
        ]));
        assert_eq!(reader.icc_profile(), Some(ColorProfile::Srgb));

        let reader = read_all(&minimal_png(&[
            png_chunk(b"gAMA", &45455u32.to_be_bytes()),
            png_chunk(b"cHRM", &chrm_payload()),
        ]));
        match reader.icc_profile() {
            Some(ColorProfile::Calibrated { gamma, .. }) => assert!((gamma - 2.2).abs() < 0.001),
            other => panic!("expected calibrated profile, got {:?}", other),
        }

        // cHRM without gAMA is not enough
        let reader = read_all(&minimal_png(&[png_chunk(b"cHRM", &chrm_payload())]));
        assert!(reader.chrm_chunk().is_some());
        assert!(reader.icc_profile().is_none());
    }

    #[test]
    fn test_corrupt_iccp_falls_back() {
        let mut corrupt = b"name\0\0".to_vec();
        corrupt.extend_from_slice(b"not a zlib stream");
        let data = minimal_png(&[png_chunk(b"iCCP", &corrupt), png_chunk(b"sRGB", &[1])]);

        let reader = read_all(&data);
        assert!(reader.iccp_chunk().is_some());
        assert_eq!(reader.icc_profile(), Some(ColorProfile::Srgb));
    }

    #[test]
    fn test_iccp_ceiling() {
        let profile = vec![7u8; 8 * 1024];
        let data = minimal_png(&[iccp_chunk(b"big", &profile)]);

        let mut reader = PngReader::with_options(ReaderOptions::new().max_icc_profile_size(4096));
        reader.consume(&data);
        assert!(reader.iccp_chunk().is_some());
        assert!(reader.icc_profile().is_none());
    }

    #[test]
    fn test_first_chunk_must_be_ihdr() {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(&png_chunk(b"sRGB", &[0]));
        data.extend_from_slice(&png_ihdr());
        let reader = read_all(&data);
        assert!(reader.is_finished());
        assert!(reader.srgb_chunk().is_none());

        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(&png_chunk(b"IHDR", &[0; 12]));
        data.extend_from_slice(&png_chunk(b"sRGB", &[0]));
        let reader = read_all(&data);
        assert!(reader.is_finished());
        assert!(reader.srgb_chunk().is_none());
    }

    #[test]
    fn test_oversized_length_finishes() {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(&png_ihdr());
        data.extend_from_slice(&0x8000_0000u32.to_be_bytes());
        data.extend_from_slice(b"iTXt");

        let mut reader = PngReader::new();
        reader.consume(&data[..data.len() - 4]);
        assert!(reader.is_finished());
    }

    #[test]
    fn test_bad_signature() {
        let reader = read_all(b"\x89PNX\r\n\x1a\n");
        assert!(reader.is_finished());
    }

    #[test]
    fn test_byte_at_a_time() {
        let data = minimal_png(&[
            iccp_chunk(b"icc", b"some profile bytes"),
            itxt_xmp_chunk(TEST_XMP),
            png_chunk(b"gAMA", &45455u32.to_be_bytes()),
        ]);
        let whole = read_all(&data);

        let mut split = PngReader::new();
        for byte in &data {
            split.consume(std::slice::from_ref(byte));
        }

        assert!(split.is_finished());
        assert_eq!(split.xmp_chunk(), whole.xmp_chunk());
        assert_eq!(split.iccp_chunk(), whole.iccp_chunk());
        assert_eq!(split.gama_chunk(), whole.gama_chunk());
        assert_eq!(split.icc_profile(), whole.icc_profile());
    }

    #[test]
    fn test_consume_after_finish_is_noop() {
        let mut reader = read_all(&minimal_png(&[]));
        assert!(reader.is_finished());
        reader.consume(&png_chunk(b"sRGB", &[0]));
        assert!(reader.srgb_chunk().is_none());
    }

    #[test]
    fn test_no_exif() {
        let mut reader = read_all(&minimal_png(&[]));
        assert!(reader.take_raw_exif_chunk().is_none());
    }

    #[test]
    #[cfg(feature = "xmp")]
    fn test_xmp_data() {
        let reader = read_all(&minimal_png(&[itxt_xmp_chunk(TEST_XMP)]));
        let xmp = reader.xmp_data().unwrap();
        assert_eq!(xmp.property("xmp:Rating").as_deref(), Some("4"));
    }
}
