//! Main stacked allocator implementation
//!
//! # Safety
//!
//! This module implements a LIFO stack allocator over an [`Extent`]:
//! - The top of stack lives in a `Cell` (single owner, `!Sync`)
//! - Deallocation is only valid for the most recent allocation
//! - Markers enable batch deallocation by rewinding the top
//!
//! Every block is followed by a one-word footer holding the top as it was
//! before the block was pushed, alignment padding included. The footers form
//! a chain from the current top down to `begin`: a pop restores the exact
//! previous top, and `rewind` walks the chain to check that a marker still
//! sits on a block boundary.
//!
//! ## Invariants
//!
//! - `begin <= top <= end` at all times
//! - Every live block lies in `[begin, top)`; the most recent one's footer
//!   ends exactly at `top`
//! - Following footers from `top` reaches `begin` after exactly `count` steps
//! - `rewind` only accepts positions on that chain
//!
//! ## Precondition violations
//!
//! Popping anything but the most recent block is a caller error. Debug builds
//! assert; release builds log a warning and leave the stack untouched.

use core::cell::Cell;
use core::fmt;
use core::ops::Range;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, error, trace, warn};

use super::{StackFrame, StackMarker, StackedConfig};
use crate::allocator::{AllocError, AllocResult, Allocator, Extent};
use crate::utils::{checked_align_up, fill_pattern, is_aligned, saturating_decrement};

/// Bytes of bookkeeping stored after every block
const FOOTER_SIZE: usize = size_of::<usize>();

/// Stack allocator that supports LIFO allocation and deallocation
///
/// This allocator maintains a stack-like structure where memory can only
/// be deallocated in reverse order of allocation. It's more flexible than
/// a linear allocator but still very efficient.
///
/// # Memory Layout
/// ```text
/// [begin]--[pad][alloc1][f1]--[pad][alloc2][f2]--[top]----[free]----[end]
///           <------------ allocated ------------>     <-- available -->
/// ```
///
/// `fN` is the footer of block N. Deallocations must happen in reverse
/// order: alloc2, then alloc1.
pub struct StackedAllocator<'a> {
    extent: Extent<'a>,
    top: Cell<usize>,
    count: AtomicUsize,
    config: StackedConfig,
}

impl<'a> StackedAllocator<'a> {
    /// Creates a stacked allocator over an existing extent
    pub fn with_extent(extent: Extent<'a>, config: StackedConfig) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            len = extent.len(),
            owner = extent.owner().map(|owner| owner.name()),
            "stacked allocator created"
        );

        let top = Cell::new(extent.begin_addr());
        Self {
            extent,
            top,
            count: AtomicUsize::new(0),
            config,
        }
    }

    /// Creates a stacked allocator drawing `capacity` bytes from `owner`
    ///
    /// # Errors
    /// Fails if `capacity` is zero or the owner cannot supply the extent.
    pub fn new_in(owner: &'a dyn Allocator, capacity: usize) -> AllocResult<Self> {
        Self::with_config_in(owner, capacity, StackedConfig::default())
    }

    /// Creates a stacked allocator with custom configuration drawing from `owner`
    ///
    /// # Errors
    /// Fails if `capacity` is zero or the owner cannot supply the extent.
    pub fn with_config_in(
        owner: &'a dyn Allocator,
        capacity: usize,
        config: StackedConfig,
    ) -> AllocResult<Self> {
        Ok(Self::with_extent(Extent::draw(owner, capacity)?, config))
    }

    /// Creates a root stacked allocator over a caller-provided buffer
    pub fn from_buffer(buffer: &'a mut [u8]) -> Self {
        Self::with_extent(Extent::from_buffer(buffer), StackedConfig::default())
    }

    /// Returns the total capacity of the allocator
    pub fn capacity(&self) -> usize {
        self.extent.len()
    }

    /// Returns the amount of memory currently in use, padding and footers included
    pub fn used(&self) -> usize {
        self.top.get() - self.extent.begin_addr()
    }

    /// Returns the amount of memory available for allocation
    pub fn available(&self) -> usize {
        self.extent.end_addr() - self.top.get()
    }

    /// Returns the current top of stack address
    pub fn current_top(&self) -> usize {
        self.top.get()
    }

    /// Bytes of bookkeeping stored after every block
    pub const fn footer_size() -> usize {
        FOOTER_SIZE
    }

    /// Creates a marker at the current stack position
    ///
    /// The marker can be used later to rewind the allocator to this position,
    /// deallocating all allocations made after this point.
    pub fn marker(&self) -> StackMarker {
        StackMarker {
            position: self.top.get(),
            count: self.count.load(Ordering::Acquire),
        }
    }

    /// Opens a scoped frame that rewinds to the current position on drop
    pub fn frame(&self) -> StackFrame<'_, 'a> {
        StackFrame::new(self)
    }

    /// Rewinds the stack to a previous marker position
    ///
    /// This deallocates all allocations made after the marker was created in
    /// one step.
    ///
    /// # Safety
    /// - All pointers to memory allocated after the marker become invalid
    ///
    /// # Errors
    /// - `InvalidArgument` if the marker lies outside `[begin, top]` or no
    ///   longer sits on a block boundary (the stack was cleared or rewound
    ///   below it and has grown past it since)
    /// - `InvalidState` if the footer chain is corrupted
    pub unsafe fn rewind(&self, marker: StackMarker) -> AllocResult<()> {
        let top = self.top.get();
        let position = marker.position;

        if position < self.extent.begin_addr() || position > top {
            #[cfg(feature = "logging")]
            warn!(position, top, "stack marker outside the live stack");
            return Err(AllocError::invalid_argument("stack marker outside the live stack"));
        }

        let popped = self.blocks_above(position)?;

        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: [position, top) lies in the extent and the caller gives up
            // every block in it.
            unsafe { fill_pattern(self.extent.ptr_at(position).as_ptr(), top - position, pattern) };
        }

        self.top.set(position);
        saturating_decrement(&self.count, popped);

        #[cfg(feature = "logging")]
        trace!(released = top - position, popped, "stack rewound");

        Ok(())
    }

    /// Returns the active configuration
    pub fn config(&self) -> &StackedConfig {
        &self.config
    }

    /// Pointer to the footer starting at `addr`
    #[inline]
    fn footer(&self, addr: usize) -> *mut usize {
        self.extent.ptr_at(addr).cast::<usize>().as_ptr()
    }

    /// Number of live blocks between `position` and the top
    ///
    /// Walks the footer chain down from the top and fails unless it lands
    /// exactly on `position`.
    fn blocks_above(&self, position: usize) -> AllocResult<usize> {
        let begin = self.extent.begin_addr();
        let live = self.count.load(Ordering::Acquire);
        let mut cursor = self.top.get();
        let mut popped = 0;

        while cursor > position {
            let Some(slot) = cursor.checked_sub(FOOTER_SIZE).filter(|&at| at >= begin) else {
                return Err(self.broken_chain(cursor));
            };
            if popped == live {
                return Err(self.broken_chain(cursor));
            }
            // SAFETY: cursor is the end of a live block's footer, which lies
            // in [begin, cursor).
            let below = unsafe { self.footer(slot).read_unaligned() };
            if below < begin || below >= slot {
                return Err(self.broken_chain(cursor));
            }
            cursor = below;
            popped += 1;
        }

        if cursor != position {
            #[cfg(feature = "logging")]
            warn!(position, boundary = cursor, "stack marker is not on a block boundary");
            return Err(AllocError::invalid_argument(
                "stack marker is not on a block boundary",
            ));
        }
        Ok(popped)
    }

    fn broken_chain(&self, at: usize) -> AllocError {
        #[cfg(feature = "logging")]
        error!(at, top = self.top.get(), "stacked footer chain corrupted");
        #[cfg(not(feature = "logging"))]
        let _ = at;
        AllocError::invalid_state("stacked footer chain corrupted")
    }
}

// SAFETY: StackedAllocator implements Allocator with stack discipline.
// - allocate returns aligned pointers in [top, end) and moves top past them
//   and their footer
// - deallocate only lowers top to the value recorded by the most recent block
// - rewind and clear only lower top, never past begin
unsafe impl Allocator for StackedAllocator<'_> {
    unsafe fn allocate_unchecked(
        &self,
        size: usize,
        align: usize,
    ) -> AllocResult<Option<NonNull<u8>>> {
        let top = self.top.get();
        let Some(start) = checked_align_up(top, align) else {
            return Ok(None);
        };
        let Some(end) = start.checked_add(size) else {
            return Ok(None);
        };
        let Some(new_top) = end.checked_add(FOOTER_SIZE) else {
            return Ok(None);
        };
        if new_top > self.extent.end_addr() {
            #[cfg(feature = "logging")]
            trace!(size, align, available = self.available(), "stacked allocator exhausted");
            return Ok(None);
        }
        debug_assert!(is_aligned(start, align));

        // SAFETY: [end, new_top) was just reserved and lies in the extent.
        unsafe { self.footer(end).write_unaligned(top) };
        self.top.set(new_top);
        self.count.fetch_add(1, Ordering::Release);

        let ptr = self.extent.ptr_at(start);
        if let Some(pattern) = self.config.alloc_pattern {
            // SAFETY: [start, end) was just pushed and lies in the extent.
            unsafe { fill_pattern(ptr.as_ptr(), size, pattern) };
        }

        #[cfg(feature = "logging")]
        trace!(size, align, offset = start - self.extent.begin_addr(), "stacked push");

        Ok(Some(ptr))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        let top = self.top.get();
        let begin = self.extent.begin_addr();
        let start = ptr.as_ptr().addr();
        let is_top = start >= begin
            && start
                .checked_add(size)
                .and_then(|end| end.checked_add(FOOTER_SIZE))
                == Some(top);

        debug_assert!(
            is_top,
            "stacked allocator: deallocation of {start:#x} (+{size}) is not the top block (top {top:#x})"
        );
        if !is_top {
            #[cfg(feature = "logging")]
            warn!(ptr = start, size, top, "out-of-order stacked deallocation ignored");
            return;
        }

        // SAFETY: the top block's footer occupies [top - FOOTER_SIZE, top).
        let below = unsafe { self.footer(top - FOOTER_SIZE).read_unaligned() };
        let below = if (begin..=start).contains(&below) {
            below
        } else {
            #[cfg(feature = "logging")]
            error!(ptr = start, below, "stacked footer corrupted, padding not reclaimed");
            start
        };

        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: [start, start + size) is the most recent block and is
            // being given up by the caller.
            unsafe { fill_pattern(ptr.as_ptr(), size, pattern) };
        }

        self.top.set(below);
        saturating_decrement(&self.count, 1);

        #[cfg(feature = "logging")]
        trace!(size, count = self.count(), "stacked pop");
    }

    unsafe fn clear(&self) {
        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: [begin, top) lies in the extent and the caller gives up
            // every block in it.
            unsafe { fill_pattern(self.extent.begin().as_ptr(), self.used(), pattern) };
        }

        self.top.set(self.extent.begin_addr());
        self.count.store(0, Ordering::Release);

        #[cfg(feature = "logging")]
        trace!("stacked allocator cleared");
    }

    fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn size(&self) -> usize {
        self.extent.len()
    }

    fn max_size(&self) -> usize {
        self.available().saturating_sub(FOOTER_SIZE)
    }

    fn owner(&self) -> Option<&dyn Allocator> {
        self.extent.owner()
    }

    fn is_shared(&self) -> bool {
        self.config.shared
    }

    fn name(&self) -> &'static str {
        "stacked"
    }

    fn extent(&self) -> Option<Range<usize>> {
        Some(self.extent.range())
    }
}

impl fmt::Debug for StackedAllocator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackedAllocator")
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
    fn test_lifo_pop_restores_top() {
        let system = SystemAllocator::new();
        let stack = StackedAllocator::new_in(&system, 256).unwrap();
        let begin = stack.current_top();

        let a = stack.allocate(24, 8).unwrap().unwrap();
        let b = stack.allocate(40, 8).unwrap().unwrap();
        assert_eq!(stack.count(), 2);

        unsafe {
            stack.deallocate(b, 40);
            assert_eq!(stack.current_top(), a.as_ptr().addr() + 24 + FOOTER_SIZE);
            stack.deallocate(a, 24);
        }
        assert_eq!(stack.count(), 0);
        assert_eq!(stack.current_top(), begin);
    }

    #[test]
    fn test_rewind_to_marker() {
        let system = SystemAllocator::new();
        let stack = StackedAllocator::new_in(&system, 512).unwrap();

        stack.allocate(32, 8).unwrap().unwrap();
        let marker = stack.marker();
        stack.allocate(64, 8).unwrap().unwrap();
        stack.allocate(64, 8).unwrap().unwrap();
        assert_eq!(stack.count(), 3);

        unsafe { stack.rewind(marker).unwrap() };
        assert_eq!(stack.count(), 1);
        assert_eq!(stack.current_top(), marker.position());
    }

    #[test]
    fn test_marker_from_the_future_is_rejected() {
        let system = SystemAllocator::new();
        let stack = StackedAllocator::new_in(&system, 512).unwrap();

        stack.allocate(64, 8).unwrap().unwrap();
        let marker = stack.marker();
        unsafe {
            stack.clear();
            let err = stack.rewind(marker).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn test_frame_rewinds_on_drop() {
        let system = SystemAllocator::new();
        let stack = StackedAllocator::new_in(&system, 512).unwrap();

        stack.allocate(16, 8).unwrap().unwrap();
        let before = stack.marker();
        {
            let frame = stack.frame();
            frame.allocator().allocate(100, 8).unwrap().unwrap();
            frame.allocator().allocate(100, 8).unwrap().unwrap();
            assert_eq!(stack.count(), 3);
        }
        assert_eq!(stack.marker(), before);
    }

    #[test]
    fn test_pop_reclaims_padding_exactly() {
        let system = SystemAllocator::new();
        let stack = StackedAllocator::new_in(&system, 512).unwrap();

        let a = stack.allocate(3, 1).unwrap().unwrap();
        let below = stack.current_top();
        let b = stack.allocate(16, 64).unwrap().unwrap();
        assert!(b.as_ptr().addr() > below);

        unsafe { stack.deallocate(b, 16) };
        assert_eq!(stack.current_top(), below);
        unsafe { stack.deallocate(a, 3) };
        assert_eq!(stack.used(), 0);
    }

    #[test]
    fn test_stale_marker_is_rejected() {
        let system = SystemAllocator::new();
        let stack = StackedAllocator::new_in(&system, 1024).unwrap();

        stack.allocate(64, 8).unwrap().unwrap();
        let stale = stack.marker();
        unsafe { stack.clear() };

        let big = stack.allocate(256, 8).unwrap().unwrap();
        assert!(stale.position() < stack.current_top());

        let err = unsafe { stack.rewind(stale) }.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);
        assert_eq!(stack.count(), 1);

        unsafe { stack.deallocate(big, 256) };
        assert_eq!(stack.count(), 0);
        assert_eq!(stack.used(), 0);
    }

    #[test]
    fn test_corrupted_footer_chain_is_reported() {
        let system = SystemAllocator::new();
        let stack = StackedAllocator::new_in(&system, 256).unwrap();
        let origin = stack.marker();

        let ptr = stack.allocate(16, 8).unwrap().unwrap();
        unsafe {
            ptr.as_ptr().add(16).cast::<usize>().write_unaligned(usize::MAX);
            let err = stack.rewind(origin).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::InvalidState);
        }
        assert_eq!(stack.count(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not the top block")]
    fn test_out_of_order_pop_asserts_in_debug() {
        let system = SystemAllocator::new();
        let stack = StackedAllocator::new_in(&system, 256).unwrap();

        let a = stack.allocate(16, 8).unwrap().unwrap();
        stack.allocate(16, 8).unwrap().unwrap();
        unsafe { stack.deallocate(a, 16) };
    }
}
