//! Block read loop driving a metadata reader from a byte source
//!
//! The readers never do I/O themselves. This module feeds them from any
//! [`std::io::Read`], one block at a time, and stops as soon as the reader
//! has seen everything it needs.

use crate::{
    error::{Error, Result},
    formats::{MetadataFormat, Reader},
    profile::ColorProfile,
    ReaderOptions,
};
use std::{
    fs::File,
    io::{ErrorKind, Read},
    path::Path,
};

#[cfg(feature = "exif")]
use crate::tiff::ExifInfo;

#[cfg(feature = "xmp")]
use crate::xmp::XmpPacket;

/// Bytes needed to recognize every supported format
const HEADER_LEN: usize = 8;

/// Read metadata from `source`, detecting the format from its first bytes
///
/// Returns `Ok(None)` if the format is not supported. Stops reading at end of
/// input or once the reader is finished, whichever comes first.
///
/// # Example
///
/// ```
/// use image_meta_io::{read_metadata, test_utils::*, MetadataFormat, ReaderOptions};
/// use std::io::Cursor;
///
/// let jpeg = minimal_jpeg(&[xmp_app1(TEST_XMP)]);
/// let reader = read_metadata(&mut Cursor::new(jpeg), ReaderOptions::default())
///     .unwrap()
///     .unwrap();
/// assert_eq!(reader.format(), MetadataFormat::Jpeg);
/// assert!(reader.xmp_bytes().is_some());
/// ```
pub fn read_metadata<R: Read>(source: &mut R, options: ReaderOptions) -> Result<Option<Reader>> {
    let mut header = [0u8; HEADER_LEN];
    let filled = read_up_to(source, &mut header)?;
    let header = &header[..filled];

    let Some(format) = MetadataFormat::detect(header) else {
        log::debug!("no supported format in {} header bytes", filled);
        return Ok(None);
    };

    let mut reader = Reader::with_options(format, options);
    reader.consume(header);

    let mut block = vec![0u8; options.get_block_size()];
    while !reader.is_finished() {
        let n = match source.read(&mut block) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        reader.consume(&block[..n]);
    }

    log::trace!("{}: read loop done, finished = {}", format, reader.is_finished());
    Ok(Some(reader))
}

/// Open a file and read its metadata
pub fn read_metadata_from_path<P: AsRef<Path>>(
    path: P,
    options: ReaderOptions,
) -> Result<Option<Reader>> {
    let mut file = File::open(path)?;
    read_metadata(&mut file, options)
}

/// Fill `buf` from `source` until it is full or the source is exhausted
fn read_up_to<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Everything a reader extracted, detached from the reader
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub format: MetadataFormat,
    /// Raw EXIF chunk including its `"Exif\0\0"` prefix (JPEG only)
    pub exif: Option<Vec<u8>>,
    /// XMP packet bytes past the format's signature prefix
    pub xmp: Option<Vec<u8>>,
    pub color_profile: Option<ColorProfile>,
    #[cfg(feature = "exif")]
    pub exif_info: Option<ExifInfo>,
}

impl Metadata {
    /// Collect the reader's results
    ///
    /// The colour profile and EXIF summary are resolved before the EXIF chunk
    /// is taken, so the JPEG colour-space fallback still applies.
    pub fn from_reader(mut reader: Reader) -> Self {
        let color_profile = reader.icc_profile();
        #[cfg(feature = "exif")]
        let exif_info = reader.exif_info();
        let xmp = reader.xmp_bytes().map(<[u8]>::to_vec);

        Self {
            format: reader.format(),
            exif: reader.take_raw_exif_chunk(),
            xmp,
            color_profile,
            #[cfg(feature = "exif")]
            exif_info,
        }
    }

    /// Open a file and collect its metadata
    ///
    /// Unlike [`read_metadata_from_path`], an unsupported format is an error.
    pub fn open<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        read_metadata_from_path(path, options)?
            .map(Self::from_reader)
            .ok_or(Error::UnsupportedFormat)
    }

    /// Parse the XMP packet
    #[cfg(feature = "xmp")]
    pub fn xmp_packet(&self) -> Result<Option<XmpPacket>> {
        self.xmp.as_deref().map(XmpPacket::parse).transpose()
    }
}
