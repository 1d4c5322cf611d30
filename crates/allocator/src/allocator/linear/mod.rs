//! Linear (arena) allocator
//!
//! A linear allocator hands out memory by bumping a marker through its extent.
//! Individual frees are not supported: memory comes back only when the whole
//! arena is reset with [`clear`](crate::Allocator::clear) or dropped.
//!
//! # Safety
//!
//! ## Invariants
//!
//! - `begin <= marker <= end` at all times
//! - Every returned block lies in `[begin, marker)` and blocks never overlap
//! - The marker only moves forward between resets
//!
//! ## Thread Safety
//!
//! The marker lives in a `Cell`, so the allocator is `!Sync`. The live count
//! is atomic so observers holding a shared reference read a consistent value.

use core::cell::Cell;
use core::fmt;
use core::ops::Range;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

mod config;

pub use config::LinearConfig;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

use crate::allocator::{AllocResult, Allocator, Extent};
use crate::utils::{checked_align_up, fill_pattern, is_aligned};

/// Bump-pointer arena with bulk reset only
///
/// # Memory Layout
/// ```text
/// [begin]----[alloc1]--[alloc2]----[alloc3]----[marker]----[free]----[end]
///            <---------- allocated ---------->          <- max_size ->
/// ```
pub struct LinearAllocator<'a> {
    extent: Extent<'a>,
    marker: Cell<usize>,
    count: AtomicUsize,
    config: LinearConfig,
}

impl<'a> LinearAllocator<'a> {
    /// Creates a linear allocator over an existing extent
    pub fn with_extent(extent: Extent<'a>, config: LinearConfig) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            len = extent.len(),
            owner = extent.owner().map(|owner| owner.name()),
            "linear allocator created"
        );

        let marker = Cell::new(extent.begin_addr());
        Self {
            extent,
            marker,
            count: AtomicUsize::new(0),
            config,
        }
    }

    /// Creates a linear allocator drawing `capacity` bytes from `owner`
    ///
    /// # Errors
    /// Fails if `capacity` is zero or the owner cannot supply the extent.
    pub fn new_in(owner: &'a dyn Allocator, capacity: usize) -> AllocResult<Self> {
        Self::with_config_in(owner, capacity, LinearConfig::default())
    }

    /// Creates a linear allocator with custom configuration drawing from `owner`
    ///
    /// # Errors
    /// Fails if `capacity` is zero or the owner cannot supply the extent.
    pub fn with_config_in(
        owner: &'a dyn Allocator,
        capacity: usize,
        config: LinearConfig,
    ) -> AllocResult<Self> {
        Ok(Self::with_extent(Extent::draw(owner, capacity)?, config))
    }

    /// Creates a root linear allocator over a caller-provided buffer
    pub fn from_buffer(buffer: &'a mut [u8]) -> Self {
        Self::with_extent(Extent::from_buffer(buffer), LinearConfig::default())
    }

    /// Returns the total capacity of the allocator
    pub fn capacity(&self) -> usize {
        self.extent.len()
    }

    /// Returns the number of bytes consumed, padding included
    pub fn used(&self) -> usize {
        self.marker.get() - self.extent.begin_addr()
    }

    /// Returns the number of bytes left before the end of the extent
    pub fn available(&self) -> usize {
        self.extent.end_addr() - self.marker.get()
    }

    /// Returns the current marker address
    pub fn marker(&self) -> usize {
        self.marker.get()
    }

    /// Returns the active configuration
    pub fn config(&self) -> &LinearConfig {
        &self.config
    }
}

// SAFETY: LinearAllocator hands out disjoint slices of its extent.
// - Each block starts at an aligned address >= marker and ends <= end
// - The marker moves past every block it hands out
// - deallocate never touches memory; clear only writes [begin, marker)
unsafe impl Allocator for LinearAllocator<'_> {
    unsafe fn allocate_unchecked(
        &self,
        size: usize,
        align: usize,
    ) -> AllocResult<Option<NonNull<u8>>> {
        let marker = self.marker.get();
        let Some(start) = checked_align_up(marker, align) else {
            return Ok(None);
        };
        let Some(end) = start.checked_add(size) else {
            return Ok(None);
        };
        if end > self.extent.end_addr() {
            #[cfg(feature = "logging")]
            trace!(size, align, available = self.available(), "linear allocator exhausted");
            return Ok(None);
        }

        debug_assert!(is_aligned(start, align));
        self.marker.set(end);
        self.count.fetch_add(1, Ordering::Release);

        let ptr = self.extent.ptr_at(start);
        if let Some(pattern) = self.config.alloc_pattern {
            // SAFETY: [start, end) was just reserved and lies in the extent.
            unsafe { fill_pattern(ptr.as_ptr(), size, pattern) };
        }

        #[cfg(feature = "logging")]
        trace!(size, align, offset = start - self.extent.begin_addr(), "linear allocate");

        Ok(Some(ptr))
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _size: usize) {
        // Individual frees are not supported; memory returns on clear or drop.
    }

    unsafe fn clear(&self) {
        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: [begin, marker) lies in the extent and the caller
            // guarantees no block in it is used any more.
            unsafe { fill_pattern(self.extent.begin().as_ptr(), self.used(), pattern) };
        }

        self.marker.set(self.extent.begin_addr());
        self.count.store(0, Ordering::Release);

        #[cfg(feature = "logging")]
        trace!("linear allocator cleared");
    }

    fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn size(&self) -> usize {
        self.extent.len()
    }

    fn max_size(&self) -> usize {
        self.available()
    }

    fn owner(&self) -> Option<&dyn Allocator> {
        self.extent.owner()
    }

    fn is_shared(&self) -> bool {
        self.config.shared
    }

    fn name(&self) -> &'static str {
        "linear"
    }

    fn extent(&self) -> Option<Range<usize>> {
        Some(self.extent.range())
    }
}

impl fmt::Debug for LinearAllocator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearAllocator")
            .field("extent", &self.extent)
            .field("used", &self.used())
            .field("count", &self.count())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::SystemAllocator;

    #[test]
    fn test_basic_allocation() {
        let system = SystemAllocator::new();
        let arena = LinearAllocator::new_in(&system, 1024).unwrap();

        let a = arena.allocate(16, 8).unwrap().unwrap();
        let b = arena.allocate(16, 8).unwrap().unwrap();
        assert_eq!(b.as_ptr().addr() - a.as_ptr().addr(), 16);
        assert_eq!(arena.count(), 2);
        assert_eq!(arena.used(), 32);
        assert_eq!(arena.max_size(), 1024 - 32);
    }

    #[test]
    fn test_exhaustion_returns_none() {
        let system = SystemAllocator::new();
        let arena = LinearAllocator::new_in(&system, 64).unwrap();

        assert!(arena.allocate(64, 1).unwrap().is_some());
        assert_eq!(arena.allocate(1, 1).unwrap(), None);
        assert_eq!(arena.count(), 1);
    }

    #[test]
    fn test_padding_is_consumed() {
        let system = SystemAllocator::new();
        let arena = LinearAllocator::new_in(&system, 256).unwrap();

        arena.allocate(1, 1).unwrap().unwrap();
        let aligned = arena.allocate(8, 64).unwrap().unwrap();
        assert_eq!(aligned.as_ptr().addr() % 64, 0);
        assert!(arena.used() >= 9);
    }

    #[test]
    fn test_deallocate_is_noop() {
        let system = SystemAllocator::new();
        let arena = LinearAllocator::new_in(&system, 128).unwrap();

        let ptr = arena.allocate(32, 8).unwrap().unwrap();
        let used = arena.used();
        unsafe { arena.deallocate(ptr, 32) };
        assert_eq!(arena.used(), used);
        assert_eq!(arena.count(), 1);
    }

    #[test]
    fn test_clear_fills_dealloc_pattern() {
        let mut buffer = [0u8; 64];
        let extent = Extent::from_buffer(&mut buffer);
        let arena = LinearAllocator::with_extent(extent, LinearConfig::debug());

        let ptr = arena.allocate(8, 1).unwrap().unwrap();
        unsafe {
            assert_eq!(*ptr.as_ptr(), 0xCC);
            arena.clear();
            assert_eq!(*ptr.as_ptr(), 0xDD);
        }
        assert_eq!(arena.count(), 0);
        assert_eq!(arena.used(), 0);
    }
}
