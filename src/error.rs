//! Error types for image-meta-io
//!
//! The incremental parsers never return errors: malformed input only changes
//! what metadata ends up retrievable. These errors come from the surrounding
//! operations (the block read loop, EXIF and XMP decoding).

use std::io;

/// Result type for image-meta-io operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur outside the incremental parsers
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid file format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Unsupported file format
    #[error("Unsupported format")]
    UnsupportedFormat,

    /// Malformed XMP packet
    #[cfg(feature = "xmp")]
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}
