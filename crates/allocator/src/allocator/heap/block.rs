//! In-band bookkeeping records of the heap allocator
//!
//! Both records live inside the heap's own extent. A [`Header`] sits right
//! before every live payload; a [`FreeBlock`] occupies the first bytes of
//! every free range. Neither type is visible outside the heap module.

use core::fmt;
use core::mem;
use core::ptr;

/// Record stored immediately before a live payload
///
/// `size` is the full block consumed by the allocation (padding, header,
/// payload and any unsplit tail). `adjust` is the padding between the block
/// start and the header, so the block start is `payload - HEADER_SIZE - adjust`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(super) struct Header {
    pub(super) size: usize,
    pub(super) adjust: usize,
    #[cfg(debug_assertions)]
    pub(super) canary: usize,
}

/// Guard word written into every header in debug builds
#[cfg(debug_assertions)]
pub(super) const HEADER_CANARY: usize = 0xB10C_CA9A_5AFE_0123_u64 as usize;

impl Header {
    pub(super) const fn new(size: usize, adjust: usize) -> Self {
        Self {
            size,
            adjust,
            #[cfg(debug_assertions)]
            canary: HEADER_CANARY,
        }
    }

    /// Whether the guard word is intact (always true in release builds)
    #[inline]
    pub(super) const fn is_intact(&self) -> bool {
        #[cfg(debug_assertions)]
        {
            self.canary == HEADER_CANARY
        }
        #[cfg(not(debug_assertions))]
        {
            true
        }
    }
}

/// Intrusive free-list node written into free memory itself
#[repr(C)]
pub(super) struct FreeBlock {
    pub(super) size: usize,
    pub(super) next: *mut FreeBlock,
}

impl fmt::Debug for FreeBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeBlock")
            .field("size", &self.size)
            .field("next", &format_args!("{:#x}", self.next.addr()))
            .finish()
    }
}

/// Bytes occupied by a header
pub(super) const HEADER_SIZE: usize = mem::size_of::<Header>();

/// Alignment of headers, and the smallest alignment a payload gets
pub(super) const HEADER_ALIGN: usize = mem::align_of::<Header>();

/// Granularity of block starts and sizes
pub(super) const BLOCK_ALIGN: usize = mem::align_of::<FreeBlock>();

/// Smallest block that can rejoin the free list
pub const MIN_BLOCK_SIZE: usize = mem::size_of::<FreeBlock>();

const _: () = assert!(HEADER_SIZE % BLOCK_ALIGN == 0);
const _: () = assert!(HEADER_SIZE >= MIN_BLOCK_SIZE);

/// Null free-list link
#[inline]
pub(super) const fn null_block() -> *mut FreeBlock {
    ptr::null_mut()
}

/// Free-space summary of a heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FragmentationStats {
    /// Total free memory across all fragments (bytes)
    pub total_free: usize,

    /// Size of the largest contiguous free block (bytes)
    pub largest_block: usize,

    /// Number of distinct free fragments
    pub fragment_count: usize,

    /// External fragmentation ratio (0-100)
    ///
    /// Calculated as: `100 * (1 - largest_block / total_free)`
    /// High values indicate poor memory utilization.
    pub fragmentation_percent: u8,
}

impl FragmentationStats {
    /// Calculate fragmentation percentage from free space metrics
    pub fn calculate(total_free: usize, largest_block: usize, fragment_count: usize) -> Self {
        let fragmentation_percent = if total_free > 0 {
            let ratio = 1.0 - (largest_block as f64 / total_free as f64);
            (ratio * 100.0).clamp(0.0, 100.0) as u8
        } else {
            0
        };

        Self {
            total_free,
            largest_block,
            fragment_count,
            fragmentation_percent,
        }
    }

    /// Check if fragmentation is concerning (>50%)
    #[inline]
    pub fn is_fragmented(&self) -> bool {
        self.fragmentation_percent > 50
    }
}

impl fmt::Display for FragmentationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes free in {} fragments, largest {} bytes ({}% fragmented)",
            self.total_free, self.fragment_count, self.largest_block, self.fragmentation_percent
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_keeps_block_granularity() {
        assert_eq!(HEADER_SIZE % BLOCK_ALIGN, 0);
        assert!(HEADER_ALIGN.is_power_of_two());
        assert!(Header::new(64, 0).is_intact());
    }

    #[test]
    fn fragmentation_percent() {
        let whole = FragmentationStats::calculate(4096, 4096, 1);
        assert_eq!(whole.fragmentation_percent, 0);
        assert!(!whole.is_fragmented());

        let split = FragmentationStats::calculate(1000, 250, 4);
        assert_eq!(split.fragmentation_percent, 75);
        assert!(split.is_fragmented());

        assert_eq!(FragmentationStats::calculate(0, 0, 0).fragmentation_percent, 0);
    }
}
