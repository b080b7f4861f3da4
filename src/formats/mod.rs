//! Format-specific incremental metadata readers
//!
//! Each format (JPEG, PNG) has a reader that consumes the file's bytes in
//! arbitrarily sized slices and retains the metadata it finds along the way.

use crate::{profile::ColorProfile, ReaderOptions};

#[cfg(feature = "xmp")]
use crate::xmp::XmpPacket;

#[cfg(feature = "exif")]
use crate::tiff::ExifInfo;

/// Trait for format-specific incremental metadata readers
///
/// A reader is bound to one format for its whole life. It is fed the file's
/// bytes in order through [`consume`](Self::consume) and queried with
/// [`is_finished`](Self::is_finished) after each feed. Malformed input never
/// produces an error: it only limits what metadata is retrievable.
pub trait MetadataReader {
    /// Format this reader parses
    fn format() -> MetadataFormat
    where
        Self: Sized;

    /// File extensions of this format (e.g., ["jpg", "jpeg"])
    fn extensions() -> &'static [&'static str]
    where
        Self: Sized;

    /// MIME types of this format
    fn mime_types() -> &'static [&'static str]
    where
        Self: Sized;

    /// Try to detect this format from the first bytes of a file
    fn detect(header: &[u8]) -> Option<MetadataFormat>
    where
        Self: Sized;

    /// Feed the next slice of the file
    ///
    /// Once the reader is finished, further calls are no-ops.
    fn consume(&mut self, buf: &[u8]);

    /// True once no further bytes will be processed
    fn is_finished(&self) -> bool;

    /// Take ownership of the raw EXIF chunk
    ///
    /// Returns the chunk the first time and `None` afterwards. Always `None`
    /// for formats that do not carry EXIF.
    fn take_raw_exif_chunk(&mut self) -> Option<Vec<u8>>;

    /// The raw EXIF chunk, if found and not yet taken
    fn exif_chunk(&self) -> Option<&[u8]>;

    /// The raw XMP chunk, including its format-specific signature prefix
    fn xmp_chunk(&self) -> Option<&[u8]>;

    /// The XMP packet bytes, past the signature prefix
    fn xmp_bytes(&self) -> Option<&[u8]>;

    /// Resolve the image's colour profile
    ///
    /// The profile is computed on each call from the retained chunks.
    fn icc_profile(&self) -> Option<ColorProfile>;

    /// Parse the retained XMP chunk
    #[cfg(feature = "xmp")]
    fn xmp_data(&self) -> Option<XmpPacket> {
        match XmpPacket::parse(self.xmp_bytes()?) {
            Ok(packet) => Some(packet),
            Err(e) => {
                log::debug!("XMP: discarding unparsable packet: {}", e);
                None
            }
        }
    }

    /// Parse the retained EXIF chunk
    #[cfg(feature = "exif")]
    fn exif_info(&self) -> Option<ExifInfo> {
        match crate::tiff::parse_exif_info(self.exif_chunk()?) {
            Ok(info) => info,
            Err(e) => {
                log::debug!("EXIF: discarding unparsable chunk: {}", e);
                None
            }
        }
    }
}

#[cfg(feature = "jpeg")]
pub(crate) mod jpeg;

#[cfg(feature = "png")]
pub(crate) mod png;

// ============================================================================
// Reader Registration Macro
// ============================================================================

/// Register all supported formats in one place
///
/// This macro generates:
/// - MetadataFormat enum
/// - Reader enum (zero-cost dispatch over the format readers)
/// - Format detection, extension and MIME type lookup
macro_rules! register_readers {
    ($(
        $(#[$meta:meta])*
        $variant:ident => $module:ident :: $reader:ident
    ),* $(,)?) => {
        /// Format of the byte stream a reader is bound to
        ///
        /// Note: The actual variants are determined by enabled features.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum MetadataFormat {
            $(
                $(#[$meta])*
                $variant,
            )*
        }

        /// A metadata reader bound to one format
        ///
        /// # Example
        ///
        /// ```
        /// # #[cfg(feature = "jpeg")]
        /// # {
        /// use image_meta_io::{MetadataFormat, Reader};
        ///
        /// let mut reader = Reader::new(MetadataFormat::Jpeg);
        /// reader.consume(&[0xFF, 0xD8]);
        /// reader.consume(&[0xFF, 0xDB, 0x00, 0x43]);
        /// assert!(reader.is_finished());
        /// assert!(reader.take_raw_exif_chunk().is_none());
        /// # }
        /// ```
        #[derive(Debug)]
        pub enum Reader {
            $(
                $(#[$meta])*
                $variant($module::$reader),
            )*
        }

        impl Reader {
            /// Create a reader for `format` with default limits
            pub fn new(format: MetadataFormat) -> Self {
                Self::with_options(format, ReaderOptions::default())
            }

            /// Create a reader for `format` with the given limits
            pub fn with_options(format: MetadataFormat, options: ReaderOptions) -> Self {
                match format {
                    $(
                        $(#[$meta])*
                        MetadataFormat::$variant => Reader::$variant($module::$reader::with_options(options)),
                    )*
                }
            }

            /// Format this reader is bound to
            #[allow(unreachable_patterns)]
            pub fn format(&self) -> MetadataFormat {
                match self {
                    $(
                        $(#[$meta])*
                        Reader::$variant(_) => MetadataFormat::$variant,
                    )*
                }
            }

            /// Feed the next slice of the file
            #[allow(unreachable_patterns)]
            pub fn consume(&mut self, buf: &[u8]) {
                match self {
                    $(
                        $(#[$meta])*
                        Reader::$variant(r) => r.consume(buf),
                    )*
                }
            }

            /// True once no further bytes will be processed
            #[allow(unreachable_patterns)]
            pub fn is_finished(&self) -> bool {
                match self {
                    $(
                        $(#[$meta])*
                        Reader::$variant(r) => r.is_finished(),
                    )*
                }
            }

            /// Take ownership of the raw EXIF chunk (JPEG only)
            #[allow(unreachable_patterns)]
            pub fn take_raw_exif_chunk(&mut self) -> Option<Vec<u8>> {
                match self {
                    $(
                        $(#[$meta])*
                        Reader::$variant(r) => r.take_raw_exif_chunk(),
                    )*
                }
            }

            /// The raw EXIF chunk, if found and not yet taken
            #[allow(unreachable_patterns)]
            pub fn exif_chunk(&self) -> Option<&[u8]> {
                match self {
                    $(
                        $(#[$meta])*
                        Reader::$variant(r) => r.exif_chunk(),
                    )*
                }
            }

            /// The raw XMP chunk, including its signature prefix
            #[allow(unreachable_patterns)]
            pub fn xmp_chunk(&self) -> Option<&[u8]> {
                match self {
                    $(
                        $(#[$meta])*
                        Reader::$variant(r) => r.xmp_chunk(),
                    )*
                }
            }

            /// The XMP packet bytes, past the signature prefix
            #[allow(unreachable_patterns)]
            pub fn xmp_bytes(&self) -> Option<&[u8]> {
                match self {
                    $(
                        $(#[$meta])*
                        Reader::$variant(r) => r.xmp_bytes(),
                    )*
                }
            }

            /// Resolve the image's colour profile
            #[allow(unreachable_patterns)]
            pub fn icc_profile(&self) -> Option<ColorProfile> {
                match self {
                    $(
                        $(#[$meta])*
                        Reader::$variant(r) => r.icc_profile(),
                    )*
                }
            }

            /// Parse the retained XMP chunk
            #[cfg(feature = "xmp")]
            #[allow(unreachable_patterns)]
            pub fn xmp_data(&self) -> Option<XmpPacket> {
                match self {
                    $(
                        $(#[$meta])*
                        Reader::$variant(r) => r.xmp_data(),
                    )*
                }
            }

            /// Parse the retained EXIF chunk
            #[cfg(feature = "exif")]
            #[allow(unreachable_patterns)]
            pub fn exif_info(&self) -> Option<ExifInfo> {
                match self {
                    $(
                        $(#[$meta])*
                        Reader::$variant(r) => r.exif_info(),
                    )*
                }
            }
        }

        impl MetadataFormat {
            /// All formats available in this build
            pub fn all() -> &'static [MetadataFormat] {
                &[
                    $(
                        $(#[$meta])*
                        MetadataFormat::$variant,
                    )*
                ]
            }

            /// Detect the format from the first bytes of a file
            ///
            /// Readers never sniff their input; this is for callers that do
            /// not know the format up front.
            pub fn detect(header: &[u8]) -> Option<MetadataFormat> {
                $(
                    $(#[$meta])*
                    if let Some(format) = $module::$reader::detect(header) {
                        return Some(format);
                    }
                )*
                None
            }

            /// Detect the format from a file extension
            pub fn from_extension(ext: &str) -> Option<MetadataFormat> {
                let ext_lower = ext.to_lowercase();
                $(
                    $(#[$meta])*
                    if $module::$reader::extensions().contains(&ext_lower.as_str()) {
                        return Some($module::$reader::format());
                    }
                )*
                None
            }

            /// Detect the format from a MIME type
            pub fn from_mime(mime: &str) -> Option<MetadataFormat> {
                $(
                    $(#[$meta])*
                    if $module::$reader::mime_types().iter().any(|m| m.eq_ignore_ascii_case(mime)) {
                        return Some($module::$reader::format());
                    }
                )*
                None
            }

            /// All file extensions (without dot prefix) of this format
            pub fn extensions(&self) -> &'static [&'static str] {
                match self {
                    $(
                        $(#[$meta])*
                        MetadataFormat::$variant => $module::$reader::extensions(),
                    )*
                }
            }

            /// All MIME types of this format
            pub fn mime_types(&self) -> &'static [&'static str] {
                match self {
                    $(
                        $(#[$meta])*
                        MetadataFormat::$variant => $module::$reader::mime_types(),
                    )*
                }
            }

            /// Primary MIME type of this format
            pub fn to_mime(&self) -> &'static str {
                self.mime_types()[0]
            }

            /// Primary file extension of this format
            pub fn to_extension(&self) -> &'static str {
                self.extensions()[0]
            }
        }

        impl std::fmt::Display for MetadataFormat {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.to_mime())
            }
        }
    };
}

// ============================================================================
// SINGLE POINT OF REGISTRATION
// ============================================================================
register_readers! {
    #[cfg(feature = "jpeg")]
    Jpeg => jpeg::JpegReader,

    #[cfg(feature = "png")]
    Png => png::PngReader,
}
