//! Incremental, streaming extraction of image metadata.
//!
//! This crate pulls EXIF, XMP, ICC profiles and colour information out of
//! JPEG and PNG files while the bytes are still arriving, so an image loader
//! can obtain them without a second pass over the file.
//!
//! # Design Principles
//!
//! - **Incremental**: Readers accept the file in slices of any size, down to
//!   one byte, and resume exactly where the previous slice ended
//! - **Early exit**: A reader reports when it has seen everything it needs so
//!   the caller can stop feeding it
//! - **Never fails**: Malformed input only limits what metadata is retrievable
//! - **Bounded**: Declared lengths are untrusted and buffer growth is capped
//!
//! # Quick Start
//!
//! Feed a reader while decoding, then ask it for metadata:
//!
//! ```
//! use image_meta_io::{MetadataFormat, Reader};
//! # let jpeg = image_meta_io::test_utils::minimal_jpeg(&[]);
//!
//! let mut reader = Reader::new(MetadataFormat::Jpeg);
//! for block in jpeg.chunks(4096) {
//!     reader.consume(block);
//!     if reader.is_finished() {
//!         break;
//!     }
//! }
//!
//! let exif = reader.take_raw_exif_chunk();
//! let profile = reader.icc_profile();
//! # assert!(exif.is_none() && profile.is_none());
//! ```
//!
//! # Reading From a Source
//!
//! When nothing else needs the bytes, [`read_metadata`] detects the format and
//! runs the read loop:
//!
//! ```no_run
//! use image_meta_io::{Metadata, ReaderOptions};
//!
//! # fn main() -> image_meta_io::Result<()> {
//! let metadata = Metadata::open("image.jpg", ReaderOptions::default())?;
//! if let Some(xmp) = &metadata.xmp {
//!     println!("XMP: {} bytes", xmp.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! Discarded chunks, CRC failures and early finishes are reported through the
//! [`log`] facade. No logger is installed by this crate.

mod error;
mod formats;
mod options;
mod profile;
mod read;
mod segment;
#[cfg(feature = "exif")]
mod tiff;
#[cfg(feature = "xmp")]
mod xmp;

pub use error::{Error, Result};
pub use formats::{MetadataFormat, MetadataReader, Reader};
pub use options::{ReaderOptions, MAX_ICC_PROFILE_SIZE};
pub use profile::{Chromaticity, ColorProfile, Primaries};
pub use read::{read_metadata, read_metadata_from_path, Metadata};
pub use segment::{DEFAULT_BLOCK_SIZE, MAX_SEGMENT_SIZE};

#[cfg(feature = "jpeg")]
pub use formats::jpeg::JpegReader;
#[cfg(feature = "png")]
pub use formats::png::PngReader;
#[cfg(feature = "exif")]
pub use tiff::{color_space, parse_exif_info, ExifInfo};
#[cfg(feature = "xmp")]
pub use xmp::XmpPacket;

// Test utilities - only compiled for tests or when explicitly enabled
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
