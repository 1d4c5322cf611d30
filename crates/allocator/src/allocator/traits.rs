//! The allocator capability every strategy implements
//!
//! # Safety
//!
//! [`Allocator`] is an `unsafe trait`: implementors promise that
//! - every pointer handed out by `allocate` lies inside the allocator's
//!   extent, is aligned to the requested alignment and does not overlap any
//!   other live allocation
//! - `deallocate` and `clear` never touch memory outside the extent
//!
//! Callers in turn promise (via the `unsafe` methods) that they only release
//! memory they obtained from the same allocator and never use it afterwards.
//!
//! ## Boundary validation
//!
//! [`Allocator::allocate`] is the only entry point consumers call. It checks
//! the request once (alignment is a power of two no larger than
//! [`Allocator::max_align`], size is non-zero) and only then reaches the
//! strategy through [`Allocator::allocate_unchecked`]. Strategies therefore
//! never re-validate arguments on their hot path.
//!
//! ## Zero-size requests
//!
//! A request for zero bytes always yields `Ok(None)` after the alignment has
//! been validated. No strategy is ever asked for zero bytes.
//!
//! ## Exhaustion
//!
//! Running out of space is `Ok(None)`, never an error. The caller decides
//! whether absence of memory is fatal (see
//! [`AllocatorPolicy`](super::AllocatorPolicy)).

use core::ops::Range;
use core::ptr::{self, NonNull};

use super::{AllocError, AllocResult, AllocatorStats};

/// Largest alignment extent-based strategies accept by default
pub const DEFAULT_MAX_ALIGN: usize = 4096;

/// Validate an allocation request against an allocator's limits
///
/// Rejects alignments that are not powers of two or exceed `max_align`.
#[inline]
pub fn validate_request(align: usize, max_align: usize) -> AllocResult<()> {
    if !align.is_power_of_two() || align > max_align {
        return Err(AllocError::invalid_alignment(align, max_align));
    }
    Ok(())
}

/// Capability contract shared by every allocation strategy
///
/// All methods take `&self`; strategies keep their bookkeeping in cells and
/// are not `Sync`. An allocator whose [`is_shared`](Allocator::is_shared)
/// reports `true` may be handed to several logical owners, and those owners
/// serialize every mutating call themselves.
///
/// # Safety
///
/// Implementors must ensure that:
/// - Returned pointers lie in the allocator's extent
/// - Returned pointers satisfy the requested alignment
/// - Live allocations never overlap
/// - `count()` matches the number of live allocations the strategy tracks
pub unsafe trait Allocator {
    /// Strategy entry point for a request that already passed validation
    ///
    /// # Safety
    /// - `size` is non-zero
    /// - `align` is a power of two no larger than [`max_align`](Allocator::max_align)
    ///
    /// Callers outside a strategy go through [`allocate`](Allocator::allocate).
    unsafe fn allocate_unchecked(
        &self,
        size: usize,
        align: usize,
    ) -> AllocResult<Option<NonNull<u8>>>;

    /// Allocate `size` bytes aligned to `align`
    ///
    /// Returns `Ok(None)` when the allocator is exhausted or when `size` is
    /// zero.
    ///
    /// # Errors
    /// - [`InvalidAlignment`](crate::MemoryError::InvalidAlignment) if `align`
    ///   is not a power of two or exceeds [`max_align`](Allocator::max_align)
    /// - [`AllocationFailed`](crate::MemoryError::AllocationFailed) if a
    ///   backing facility (the OS for pages) refused the request
    #[inline]
    fn allocate(&self, size: usize, align: usize) -> AllocResult<Option<NonNull<u8>>> {
        validate_request(align, self.max_align())?;
        if size == 0 {
            return Ok(None);
        }
        // SAFETY: size is non-zero and align was validated above.
        unsafe { self.allocate_unchecked(size, align) }
    }

    /// Release a block previously returned by [`allocate`](Allocator::allocate)
    ///
    /// # Safety
    /// - `ptr` was returned by this allocator and has not been released yet
    /// - `size` is the size that was requested for it
    /// - The block is not accessed after this call
    /// - Strategies may add ordering requirements (stacked: strict LIFO)
    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize);

    /// Reset bookkeeping to empty without returning the extent
    ///
    /// # Safety
    /// Every pointer handed out by this allocator becomes dangling.
    unsafe fn clear(&self);

    /// Number of live allocations
    fn count(&self) -> usize;

    /// Total bytes managed by this allocator
    fn size(&self) -> usize;

    /// Largest request that could currently succeed (a hint, not a promise)
    fn max_size(&self) -> usize;

    /// Largest alignment this allocator accepts
    #[inline]
    fn max_align(&self) -> usize {
        DEFAULT_MAX_ALIGN
    }

    /// The allocator this one drew its extent from, `None` for roots
    fn owner(&self) -> Option<&dyn Allocator>;

    /// Whether the extent may be reached by more than one logical owner
    #[inline]
    fn is_shared(&self) -> bool {
        false
    }

    /// Address of the allocator instance behind `self`
    ///
    /// References report the identity of the allocator they point at, so an
    /// allocator and any chain of references to it share one identity.
    #[inline]
    fn identity(&self) -> *const () {
        ptr::from_ref(self).cast()
    }

    /// Whether `other` is this very allocator instance
    ///
    /// Memory obtained from one of two equal allocators may be released
    /// through the other. References on either side are looked through.
    #[inline]
    fn is_equal(&self, other: &dyn Allocator) -> bool {
        ptr::eq(self.identity(), other.identity())
    }

    /// Short strategy name used in diagnostics
    fn name(&self) -> &'static str;

    /// Address range `[begin, end)` of the extent, if the strategy has one
    #[inline]
    fn extent(&self) -> Option<Range<usize>> {
        None
    }

    /// Point-in-time snapshot of the allocator's counters
    #[inline]
    fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            name: self.name(),
            count: self.count(),
            size: self.size(),
            max_size: self.max_size(),
            shared: self.is_shared(),
        }
    }
}

// SAFETY: Blanket implementation for references.
// - Forwards every call to the referenced allocator
// - Safety contracts are preserved through delegation
unsafe impl<A: Allocator + ?Sized> Allocator for &A {
    #[inline]
    unsafe fn allocate_unchecked(
        &self,
        size: usize,
        align: usize,
    ) -> AllocResult<Option<NonNull<u8>>> {
        // SAFETY: forwarding the caller's guarantees unchanged.
        unsafe { (**self).allocate_unchecked(size, align) }
    }

    #[inline]
    fn allocate(&self, size: usize, align: usize) -> AllocResult<Option<NonNull<u8>>> {
        (**self).allocate(size, align)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        // SAFETY: forwarding the caller's guarantees unchanged.
        unsafe { (**self).deallocate(ptr, size) }
    }

    #[inline]
    unsafe fn clear(&self) {
        // SAFETY: forwarding the caller's guarantees unchanged.
        unsafe { (**self).clear() }
    }

    #[inline]
    fn count(&self) -> usize {
        (**self).count()
    }

    #[inline]
    fn size(&self) -> usize {
        (**self).size()
    }

    #[inline]
    fn max_size(&self) -> usize {
        (**self).max_size()
    }

    #[inline]
    fn max_align(&self) -> usize {
        (**self).max_align()
    }

    #[inline]
    fn owner(&self) -> Option<&dyn Allocator> {
        (**self).owner()
    }

    #[inline]
    fn is_shared(&self) -> bool {
        (**self).is_shared()
    }

    #[inline]
    fn identity(&self) -> *const () {
        (**self).identity()
    }

    #[inline]
    fn is_equal(&self, other: &dyn Allocator) -> bool {
        (**self).is_equal(other)
    }

    #[inline]
    fn name(&self) -> &'static str {
        (**self).name()
    }

    #[inline]
    fn extent(&self) -> Option<Range<usize>> {
        (**self).extent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::SystemAllocator;

    #[test]
    fn rejects_non_power_of_two_alignment() {
        let err = validate_request(3, DEFAULT_MAX_ALIGN).unwrap_err();
        assert!(err.is_invalid_alignment());
        assert!(validate_request(0, DEFAULT_MAX_ALIGN).is_err());
    }

    #[test]
    fn rejects_alignment_above_maximum() {
        assert!(validate_request(8192, DEFAULT_MAX_ALIGN).is_err());
        assert!(validate_request(4096, DEFAULT_MAX_ALIGN).is_ok());
        assert!(validate_request(1, DEFAULT_MAX_ALIGN).is_ok());
    }

    #[test]
    fn zero_size_is_none_after_alignment_check() {
        let system = SystemAllocator::new();
        assert_eq!(system.allocate(0, 8), Ok(None));
        assert!(system.allocate(0, 7).is_err());
        assert_eq!(system.count(), 0);
    }

    #[test]
    fn reference_forwards_identity() {
        let a = SystemAllocator::new();
        let b = SystemAllocator::new();
        let by_ref = &a;

        assert!(a.is_equal(&a));
        assert!(by_ref.is_equal(&a));
        assert!(a.is_equal(by_ref));
        assert!(a.is_equal(&by_ref));
        assert!(!(&by_ref).is_equal(&&b));
        assert!(!a.is_equal(&b));
    }
}
