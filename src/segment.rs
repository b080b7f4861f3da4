//! Incremental segment accumulation
//!
//! Input arrives in slices of arbitrary size, so the logical position inside a
//! segment or chunk is tracked independently of the position in the current
//! input slice. Both format parsers build on the two cursors here:
//!
//! - [`Accumulator`] reassembles a segment payload across feeds
//! - [`Skip`] discards a segment payload across feeds

/// Block size used by the read loop (64KB)
pub const DEFAULT_BLOCK_SIZE: usize = 65536;

/// Maximum size of a single metadata segment that will be accumulated (256 MB)
///
/// Larger segments are skipped rather than buffered. Legitimate metadata is
/// typically much smaller:
/// - XMP: usually < 1 MB
/// - ICC profiles: usually < 1 MB
/// - EXIF: at most 64 KB in JPEG
pub const MAX_SEGMENT_SIZE: u64 = 256 * 1024 * 1024;

/// Upper bound on the up-front reservation for a segment buffer (64KB)
///
/// The declared length comes from untrusted input, so the buffer grows as
/// bytes actually arrive instead of being sized from the length field alone.
const INITIAL_RESERVE: usize = 64 * 1024;

/// In-progress segment payload
///
/// Holds the bytes copied so far together with the number still owed for the
/// declared segment length.
#[derive(Debug, Default)]
pub(crate) struct Accumulator {
    buf: Vec<u8>,
    remaining: usize,
}

impl Accumulator {
    /// Start accumulating a segment with the given declared length
    pub(crate) fn begin(&mut self, size: usize) {
        self.buf = Vec::with_capacity(size.min(INITIAL_RESERVE));
        self.remaining = size;
    }

    /// Copy as much of the segment as `input` holds
    ///
    /// Returns the number of bytes consumed from `input`.
    pub(crate) fn fill(&mut self, input: &[u8]) -> usize {
        let n = self.remaining.min(input.len());
        self.buf.extend_from_slice(&input[..n]);
        self.remaining -= n;
        n
    }

    /// Like [`fill`](Self::fill), but stop once `target` bytes are buffered
    pub(crate) fn fill_to(&mut self, input: &[u8], target: usize) -> usize {
        let wanted = target.saturating_sub(self.buf.len());
        let limit = wanted.min(input.len());
        self.fill(&input[..limit])
    }

    /// True once the full declared length has been copied
    pub(crate) fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Bytes copied so far
    pub(crate) fn filled(&self) -> &[u8] {
        &self.buf
    }

    /// Bytes still owed for the current segment
    pub(crate) fn remaining(&self) -> usize {
        self.remaining
    }

    /// Hand out the accumulated payload and reset
    pub(crate) fn take(&mut self) -> Vec<u8> {
        self.remaining = 0;
        std::mem::take(&mut self.buf)
    }

    /// Drop whatever has been accumulated
    pub(crate) fn discard(&mut self) {
        self.buf = Vec::new();
        self.remaining = 0;
    }
}

/// Number of bytes still to be discarded
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Skip {
    remaining: u64,
}

impl Skip {
    pub(crate) fn new(count: u64) -> Self {
        Self { remaining: count }
    }

    /// Discard up to the remaining count from `input`, returning bytes consumed
    pub(crate) fn advance(&mut self, input: &[u8]) -> usize {
        let n = self.remaining.min(input.len() as u64) as usize;
        self.remaining -= n as u64;
        n
    }

    pub(crate) fn is_done(&self) -> bool {
        self.remaining == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_across_feeds() {
        let mut acc = Accumulator::default();
        acc.begin(5);

        assert_eq!(acc.fill(b"ab"), 2);
        assert!(!acc.is_complete());
        assert_eq!(acc.remaining(), 3);

        // Only the owed bytes are consumed
        assert_eq!(acc.fill(b"cdefg"), 3);
        assert!(acc.is_complete());
        assert_eq!(acc.filled(), b"abcde");

        assert_eq!(acc.take(), b"abcde".to_vec());
        assert!(acc.filled().is_empty());
    }

    #[test]
    fn test_accumulator_fill_to() {
        let mut acc = Accumulator::default();
        acc.begin(10);

        assert_eq!(acc.fill_to(b"0123456789", 4), 4);
        assert_eq!(acc.filled(), b"0123");
        // Already at target: nothing consumed
        assert_eq!(acc.fill_to(b"456789", 4), 0);
        assert_eq!(acc.fill(b"456789"), 6);
        assert!(acc.is_complete());
    }

    #[test]
    fn test_accumulator_huge_declared_size_does_not_preallocate() {
        let mut acc = Accumulator::default();
        acc.begin(0x7FFF_FFFF);
        assert!(acc.buf.capacity() <= INITIAL_RESERVE);
        acc.discard();
        assert!(acc.is_complete());
    }

    #[test]
    fn test_skip_across_feeds() {
        let mut skip = Skip::new(6);
        assert_eq!(skip.advance(&[0; 4]), 4);
        assert!(!skip.is_done());
        assert_eq!(skip.advance(&[0; 4]), 2);
        assert!(skip.is_done());
        assert_eq!(skip.advance(&[0; 4]), 0);
    }
}
