//! Backing ranges that strategies carve allocations from
//!
//! An [`Extent`] is the contiguous `[begin, end)` range a strategy manages,
//! together with the allocator it was drawn from. The owner is held as a plain
//! borrow, so an owner always outlives every allocator built on top of it and
//! the delegation graph cannot contain a cycle.
//!
//! # Safety
//!
//! - `begin..begin + len` is valid for reads and writes for `'a`
//! - A drawn extent is returned to its owner with exactly one `deallocate`
//!   call, in `Drop`
//! - Addresses handed to strategies are derived from `begin` so they keep its
//!   provenance

use core::fmt;
use core::marker::PhantomData;
use core::ops::Range;
use core::ptr::NonNull;

#[cfg(feature = "logging")]
use tracing::debug;

use super::{AllocError, AllocResult, Allocator};

/// Alignment requested from an owner when drawing an extent
pub const EXTENT_ALIGN: usize = 16;

/// A contiguous range of memory plus the allocator that supplied it
pub struct Extent<'a> {
    begin: NonNull<u8>,
    len: usize,
    owner: Option<&'a dyn Allocator>,
    _memory: PhantomData<&'a mut [u8]>,
}

impl<'a> Extent<'a> {
    /// Draw `len` bytes from `owner`
    ///
    /// # Errors
    /// - `InvalidArgument` if `len` is zero
    /// - `AllocationFailed` if the owner is exhausted or refuses the request
    pub fn draw(owner: &'a dyn Allocator, len: usize) -> AllocResult<Self> {
        Self::draw_aligned(owner, len, EXTENT_ALIGN)
    }

    /// Draw `len` bytes aligned to `align` from `owner`
    ///
    /// # Errors
    /// See [`draw`](Self::draw); additionally `InvalidAlignment` if the owner
    /// rejects `align`.
    pub fn draw_aligned(owner: &'a dyn Allocator, len: usize, align: usize) -> AllocResult<Self> {
        if len == 0 {
            return Err(AllocError::invalid_argument("extent length cannot be zero"));
        }

        let begin = owner
            .allocate(len, align)?
            .ok_or_else(|| AllocError::allocation_failed(len, align, "owner exhausted"))?;

        #[cfg(feature = "logging")]
        debug!(len, align, owner = owner.name(), "drew extent");

        Ok(Self {
            begin,
            len,
            owner: Some(owner),
            _memory: PhantomData,
        })
    }

    /// Adopt a caller-provided buffer as an extent with no owner
    ///
    /// Nothing is returned anywhere on drop; the buffer stays borrowed for
    /// as long as the extent lives.
    pub fn from_buffer(buffer: &'a mut [u8]) -> Self {
        let len = buffer.len();
        Self {
            begin: NonNull::from(buffer).cast::<u8>(),
            len,
            owner: None,
            _memory: PhantomData,
        }
    }

    /// Adopt a raw range as an extent with no owner
    ///
    /// # Safety
    /// `begin..begin + len` must be valid for reads and writes for `'a` and
    /// must not be accessed through any other path while the extent lives.
    pub const unsafe fn from_raw_parts(begin: NonNull<u8>, len: usize) -> Self {
        Self {
            begin,
            len,
            owner: None,
            _memory: PhantomData,
        }
    }

    /// First byte of the range
    #[inline]
    pub const fn begin(&self) -> NonNull<u8> {
        self.begin
    }

    /// Length in bytes
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the range is empty
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Address of the first byte
    #[inline]
    pub fn begin_addr(&self) -> usize {
        self.begin.as_ptr().addr()
    }

    /// Address one past the last byte
    #[inline]
    pub fn end_addr(&self) -> usize {
        self.begin_addr() + self.len
    }

    /// `[begin, end)` as addresses
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.begin_addr()..self.end_addr()
    }

    /// Whether `addr` lies in `[begin, end)`
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        self.range().contains(&addr)
    }

    /// The allocator this extent goes back to on drop
    #[inline]
    pub fn owner(&self) -> Option<&'a dyn Allocator> {
        self.owner
    }

    /// Pointer to `addr`, derived from `begin`
    ///
    /// `addr` must lie in `[begin, end]`.
    #[inline]
    pub(crate) fn ptr_at(&self, addr: usize) -> NonNull<u8> {
        debug_assert!(addr >= self.begin_addr() && addr <= self.end_addr());
        // SAFETY: addr - begin is within the range (plus one-past-the-end),
        // which is a single allocated object.
        unsafe { self.begin.add(addr - self.begin_addr()) }
    }
}

impl Drop for Extent<'_> {
    fn drop(&mut self) {
        if let Some(owner) = self.owner {
            #[cfg(feature = "logging")]
            debug!(len = self.len, owner = owner.name(), "returning extent");

            // SAFETY: begin/len came from owner.allocate in draw_aligned and
            // this is the only place they are released.
            unsafe { owner.deallocate(self.begin, self.len) };
        }
    }
}

impl fmt::Debug for Extent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extent")
            .field("begin", &format_args!("{:#x}", self.begin_addr()))
            .field("len", &self.len)
            .field("owner", &self.owner.map(|owner| owner.name()))
            .finish()
    }
}
