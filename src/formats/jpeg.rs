//! JPEG metadata reader
//!
//! Walks the marker segments at the head of a JPEG stream and keeps the first
//! EXIF, XMP, ICC and IPTC payloads it meets. Parsing stops at the first byte
//! that is not a marker, which in a well-formed file is the start of the
//! entropy-coded data following the headers.

use super::{MetadataFormat, MetadataReader};
use crate::{
    profile::ColorProfile,
    segment::{Accumulator, Skip},
    ReaderOptions,
};
use byteorder::{BigEndian, ByteOrder};

// JPEG markers
const MARKER_PREFIX: u8 = 0xFF;
const SOI: u8 = 0xD8;
const APP1: u8 = 0xE1;
const APP2: u8 = 0xE2;
const APP13: u8 = 0xED;
const COM: u8 = 0xFE;

/// Signatures at the start of APP1/APP2 payloads
const EXIF_SIGNATURE: &[u8] = b"Exif\0\0";
const XMP_NAMESPACE: &[u8] = b"http://ns.adobe.com/xap/1.0/";
const ICC_SIGNATURE: &[u8] = b"ICC_PROFILE\0";

/// XMP namespace plus its NUL terminator
const XMP_HEADER_LEN: usize = 29;

/// ICC signature plus sequence number and segment count
const ICC_HEADER_LEN: usize = 14;

/// Bytes of an APP1 payload needed to tell EXIF from XMP
const APP1_PREFIX_LEN: usize = XMP_HEADER_LEN;

/// Shortest APP1 payload that is classified at all
const MIN_APP1_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Read,
    ReadSizeHigh,
    ReadSizeLow,
    ReadMarker,
    SkipBytes,
    ReadApp1,
    ReadExif,
    ReadXmp,
    ReadIcc,
    ReadIptc,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum App1Kind {
    Exif,
    Xmp,
    Other,
}

/// Incremental JPEG metadata reader
///
/// # Example
///
/// ```
/// use image_meta_io::{JpegReader, MetadataReader};
///
/// let mut reader = JpegReader::new();
/// reader.consume(&[0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x0D]);
/// reader.consume(b"Exif\0\0\0\0\0\0\0");
///
/// let exif = reader.take_raw_exif_chunk().unwrap();
/// assert!(exif.starts_with(b"Exif\0\0"));
/// assert!(reader.take_raw_exif_chunk().is_none());
/// ```
#[derive(Debug)]
pub struct JpegReader {
    state: State,
    options: ReaderOptions,
    marker: u8,
    size_high: u8,
    /// Payload size of the current segment (length field minus itself)
    size: usize,
    acc: Accumulator,
    skip: Skip,

    exif: Option<Vec<u8>>,
    xmp: Option<Vec<u8>>,
    icc: Option<Vec<u8>>,
    iptc: Option<Vec<u8>>,
    /// Stays set after the EXIF chunk is taken so a later APP1 cannot refill it
    exif_found: bool,
}

impl Default for JpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl JpegReader {
    pub fn new() -> Self {
        Self::with_options(ReaderOptions::default())
    }

    pub fn with_options(options: ReaderOptions) -> Self {
        Self {
            state: State::Read,
            options,
            marker: 0,
            size_high: 0,
            size: 0,
            acc: Accumulator::default(),
            skip: Skip::default(),
            exif: None,
            xmp: None,
            icc: None,
            iptc: None,
            exif_found: false,
        }
    }

    /// Raw APP2 ICC payload, including the 14-byte ICC header
    pub fn icc_chunk(&self) -> Option<&[u8]> {
        self.icc.as_deref()
    }

    /// Raw APP13 payload (Photoshop image resources carrying IPTC)
    pub fn iptc_chunk(&self) -> Option<&[u8]> {
        self.iptc.as_deref()
    }

    fn has_all_chunks(&self) -> bool {
        self.exif_found && self.xmp.is_some() && self.icc.is_some()
    }

    /// Run the state machine over the front of `buf`, returning bytes consumed
    fn step(&mut self, buf: &[u8]) -> usize {
        match self.state {
            State::Read => {
                if self.has_all_chunks() {
                    log::debug!("JPEG: all metadata found");
                    self.state = State::Finished;
                    return 0;
                }
                if buf[0] == MARKER_PREFIX {
                    self.state = State::ReadMarker;
                } else {
                    log::trace!("JPEG: non-marker byte 0x{:02X}, done", buf[0]);
                    self.state = State::Finished;
                }
                1
            }
            State::ReadMarker => {
                let marker = buf[0];
                if (marker & 0xF0) == 0xE0 || marker == COM {
                    self.marker = marker;
                    self.state = State::ReadSizeHigh;
                } else {
                    // SOI and other standalone markers
                    self.state = State::Read;
                }
                1
            }
            State::ReadSizeHigh => {
                self.size_high = buf[0];
                self.state = State::ReadSizeLow;
                1
            }
            State::ReadSizeLow => {
                let length = BigEndian::read_u16(&[self.size_high, buf[0]]) as usize;
                // A length below 2 is malformed; treat it as an empty segment
                self.size = length.saturating_sub(2);
                self.dispatch();
                1
            }
            State::ReadApp1 => {
                let target = self.size.min(APP1_PREFIX_LEN);
                let n = self.acc.fill_to(buf, target);
                if self.acc.filled().len() < target {
                    return n;
                }

                match classify_app1(self.acc.filled(), self.size) {
                    App1Kind::Exif if !self.exif_found => self.state = State::ReadExif,
                    App1Kind::Xmp if self.xmp.is_none() => self.state = State::ReadXmp,
                    kind => {
                        log::trace!("JPEG: skipping APP1 ({:?}, {} bytes)", kind, self.size);
                        self.skip_rest_of_segment();
                        return n;
                    }
                }
                n + self.read_segment(&buf[n..])
            }
            State::ReadIcc if self.acc.filled().len() < ICC_HEADER_LEN => {
                let n = self.acc.fill_to(buf, ICC_HEADER_LEN);
                if self.acc.filled().len() == ICC_HEADER_LEN
                    && !self.acc.filled().starts_with(ICC_SIGNATURE)
                {
                    log::trace!("JPEG: skipping APP2 without ICC signature");
                    self.skip_rest_of_segment();
                }
                n
            }
            State::ReadExif | State::ReadXmp | State::ReadIcc | State::ReadIptc => {
                self.read_segment(buf)
            }
            State::SkipBytes => {
                let n = self.skip.advance(buf);
                if self.skip.is_done() {
                    self.state = State::Read;
                }
                n
            }
            State::Finished => buf.len(),
        }
    }

    /// Pick the state for the segment whose length was just read
    fn dispatch(&mut self) {
        if self.size == 0 {
            self.state = State::Read;
            return;
        }

        if self.size as u64 > self.options.max_segment_size {
            log::warn!(
                "JPEG: skipping {} byte segment 0x{:02X} (limit {})",
                self.size,
                self.marker,
                self.options.max_segment_size
            );
            self.skip = Skip::new(self.size as u64);
            self.state = State::SkipBytes;
            return;
        }

        let next = match self.marker {
            APP1 if !self.exif_found || self.xmp.is_none() => State::ReadApp1,
            APP2 if self.icc.is_none() && self.size > ICC_HEADER_LEN => State::ReadIcc,
            APP13 if self.iptc.is_none() => State::ReadIptc,
            _ => State::SkipBytes,
        };

        if next == State::SkipBytes {
            self.skip = Skip::new(self.size as u64);
        } else {
            self.acc.begin(self.size);
        }
        self.state = next;
    }

    /// Continue the segment in the accumulator, storing it once complete
    fn read_segment(&mut self, buf: &[u8]) -> usize {
        let n = self.acc.fill(buf);
        if !self.acc.is_complete() {
            return n;
        }

        let chunk = self.acc.take();
        log::debug!("JPEG: {:?} complete, {} bytes", self.state, chunk.len());
        match self.state {
            State::ReadExif => {
                self.exif = Some(chunk);
                self.exif_found = true;
            }
            State::ReadXmp => self.xmp = Some(chunk),
            State::ReadIcc => self.icc = Some(chunk),
            State::ReadIptc => self.iptc = Some(chunk),
            _ => {}
        }
        self.state = State::Read;
        n
    }

    fn skip_rest_of_segment(&mut self) {
        let rest = self.acc.remaining();
        self.acc.discard();
        self.skip = Skip::new(rest as u64);
        self.state = if rest == 0 {
            State::Read
        } else {
            State::SkipBytes
        };
    }
}

/// Classify an APP1 payload from its first bytes
///
/// Segments shorter than 5 bytes are never classified, even when they could
/// be a truncated EXIF signature.
fn classify_app1(prefix: &[u8], size: usize) -> App1Kind {
    if size < MIN_APP1_SIZE {
        return App1Kind::Other;
    }

    let exif_len = prefix.len().min(EXIF_SIGNATURE.len());
    if prefix[..exif_len] == EXIF_SIGNATURE[..exif_len] {
        App1Kind::Exif
    } else if prefix.starts_with(XMP_NAMESPACE) {
        App1Kind::Xmp
    } else {
        App1Kind::Other
    }
}

impl MetadataReader for JpegReader {
    fn format() -> MetadataFormat {
        MetadataFormat::Jpeg
    }

    fn extensions() -> &'static [&'static str] {
        &["jpg", "jpeg", "jpe", "jfif"]
    }

    fn mime_types() -> &'static [&'static str] {
        &["image/jpeg", "image/jpg"]
    }

    fn detect(header: &[u8]) -> Option<MetadataFormat> {
        if header.len() >= 2 && header[0] == MARKER_PREFIX && header[1] == SOI {
            Some(MetadataFormat::Jpeg)
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
        self.exif.take()
    }

    fn exif_chunk(&self) -> Option<&[u8]> {
        self.exif.as_deref()
    }

    fn xmp_chunk(&self) -> Option<&[u8]> {
        self.xmp.as_deref()
    }

    fn xmp_bytes(&self) -> Option<&[u8]> {
        self.xmp
            .as_deref()
            .and_then(|chunk| chunk.get(XMP_HEADER_LEN..))
            .filter(|data| !data.is_empty())
    }

    fn icc_profile(&self) -> Option<ColorProfile> {
        // Only APP2 segments that start with the ICC signature are kept
        if let Some(profile) = self.icc.as_deref().and_then(|icc| icc.get(ICC_HEADER_LEN..)) {
            return Some(ColorProfile::Embedded(profile.to_vec()));
        }

        #[cfg(feature = "exif")]
        {
            if let Some(info) = self.exif_info() {
                return crate::profile::from_exif(&info);
            }
        }

        None
    }
}
