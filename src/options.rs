//! Runtime limits for metadata readers

use crate::segment::{DEFAULT_BLOCK_SIZE, MAX_SEGMENT_SIZE};

/// Maximum size of an inflated PNG iCCP profile (5 MB)
pub const MAX_ICC_PROFILE_SIZE: usize = 5 * 1024 * 1024;

/// Options controlling resource limits while reading metadata
///
/// This struct uses a builder pattern where the default applies the crate's
/// documented limits. Use the builder methods to tighten or relax them.
///
/// # Example
///
/// ```
/// use image_meta_io::ReaderOptions;
///
/// let options = ReaderOptions::new()
///     .max_segment_size(1024 * 1024)
///     .block_size(4096);
/// assert_eq!(options.get_block_size(), 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    pub(crate) max_segment_size: u64,
    pub(crate) max_icc_profile_size: usize,
    pub(crate) block_size: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_segment_size: MAX_SEGMENT_SIZE,
            max_icc_profile_size: MAX_ICC_PROFILE_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl ReaderOptions {
    /// Create options with the default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Largest metadata segment or chunk that will be buffered
    ///
    /// Anything declared larger is skipped as if it were not metadata.
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.max_segment_size = size;
        self
    }

    /// Ceiling for the inflated size of a PNG iCCP profile
    pub fn max_icc_profile_size(mut self, size: usize) -> Self {
        self.max_icc_profile_size = size;
        self
    }

    /// Size of the blocks read by [`read_metadata`](crate::read_metadata)
    ///
    /// A block size of zero is treated as one byte.
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size.max(1);
        self
    }

    pub fn get_max_segment_size(&self) -> u64 {
        self.max_segment_size
    }

    pub fn get_max_icc_profile_size(&self) -> usize {
        self.max_icc_profile_size
    }

    pub fn get_block_size(&self) -> usize {
        self.block_size
    }
}
