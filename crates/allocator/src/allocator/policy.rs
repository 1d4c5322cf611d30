//! Typed adapter between containers and an [`Allocator`]
//!
//! [`AllocatorPolicy`] is what a generic container stores instead of a concrete
//! allocator: it scales element counts to bytes, carries the element type,
//! can be rebound to another element type, and compares equal to any policy
//! backed by the same allocator instance.
//!
//! The policy is a single borrowed reference. Copying it never copies allocator
//! state, and the borrow guarantees the allocator outlives every container
//! using it.
//!
//! Unlike the raw interface, the policy does not return `None` on exhaustion:
//! a container asking for memory has no useful fallback, so exhaustion becomes
//! an `AllocationFailed` error here.

use core::alloc::Layout;
use core::fmt;
use core::marker::PhantomData;
use core::ptr::NonNull;

use super::{AllocError, AllocResult, Allocator};

/// Typed view of an allocator for containers of `T`
pub struct AllocatorPolicy<'a, T> {
    allocator: &'a dyn Allocator,
    _element: PhantomData<fn() -> T>,
}

impl<'a, T> AllocatorPolicy<'a, T> {
    /// Creates a policy backed by `allocator`
    #[inline]
    pub const fn new(allocator: &'a dyn Allocator) -> Self {
        Self {
            allocator,
            _element: PhantomData,
        }
    }

    /// The backing allocator
    #[inline]
    pub fn allocator(&self) -> &'a dyn Allocator {
        self.allocator
    }

    /// Allocate uninitialized storage for `n` values of `T`
    ///
    /// Zero-sized requests (`n == 0` or a zero-sized `T`) return a dangling,
    /// well-aligned pointer without touching the allocator.
    ///
    /// # Errors
    /// - `SizeOverflow` if `n * size_of::<T>()` does not fit in `isize`
    /// - `InvalidAlignment` if the allocator cannot align `T`
    /// - `AllocationFailed` if the allocator is exhausted or fails
    pub fn allocate(&self, n: usize) -> AllocResult<NonNull<T>> {
        let layout = Self::layout(n)?;
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }

        self.allocator
            .allocate(layout.size(), layout.align())?
            .map(NonNull::cast)
            .ok_or_else(|| AllocError::out_of_memory(layout.size(), layout.align()))
    }

    /// Release storage for `n` values previously obtained from [`allocate`](Self::allocate)
    ///
    /// # Safety
    /// - `ptr` came from `allocate(n)` on a policy equal to this one
    /// - The storage is not used after this call
    pub unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize) {
        let size = size_of::<T>() * n;
        if size == 0 {
            return;
        }
        // SAFETY: the caller guarantees ptr/n match a prior allocate on an
        // equal policy, so the backing allocator handed out `size` bytes.
        unsafe { self.allocator.deallocate(ptr.cast(), size) };
    }

    /// The equivalent policy for a different element type
    #[inline]
    pub fn rebind<U>(&self) -> AllocatorPolicy<'a, U> {
        AllocatorPolicy::new(self.allocator)
    }

    /// Largest element count a single request could currently obtain
    pub fn max_size(&self) -> usize {
        match size_of::<T>() {
            0 => usize::MAX,
            size => self.allocator.max_size() / size,
        }
    }

    fn layout(n: usize) -> AllocResult<Layout> {
        Layout::array::<T>(n).map_err(|_| AllocError::size_overflow("AllocatorPolicy::allocate"))
    }
}

impl<T> Clone for AllocatorPolicy<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AllocatorPolicy<'_, T> {}

impl<'b, T, U> PartialEq<AllocatorPolicy<'b, U>> for AllocatorPolicy<'_, T> {
    fn eq(&self, other: &AllocatorPolicy<'b, U>) -> bool {
        self.allocator.is_equal(other.allocator)
    }
}

impl<T> Eq for AllocatorPolicy<'_, T> {}

impl<T> fmt::Debug for AllocatorPolicy<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocatorPolicy")
            .field("element", &core::any::type_name::<T>())
            .field("allocator", &self.allocator.name())
            .finish()
    }
}
