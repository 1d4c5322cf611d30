//! System allocator root
//!
//! Provides an allocator that wraps the platform allocator
//! (`std::alloc::System`). It is the usual root of a delegation tree: it has
//! no owner and draws from nothing but the process heap. It is never installed
//! as the global allocator; every instance is constructed explicitly.
//!
//! The [`Allocator`] interface releases memory by `(ptr, size)` only, while the
//! platform allocator needs the original alignment back. Each block is
//! therefore prefixed with one word recording how far the payload sits from
//! the start of the underlying platform allocation.

use core::alloc::{GlobalAlloc, Layout};
use core::mem;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::alloc::System;

#[cfg(feature = "logging")]
use tracing::trace;

use super::{AllocResult, Allocator};
use crate::utils::{atomic_max, saturating_decrement};

const PREFIX_WORD: usize = mem::size_of::<usize>();

/// Room kept below `isize::MAX` for the prefix and alignment padding
const PLATFORM_SLACK: usize = super::DEFAULT_MAX_ALIGN;

/// Root allocator over the platform allocator
///
/// # Thread Safety
/// Counters are atomic and the platform allocator is thread-safe, so a
/// `SystemAllocator` may be shared freely; [`is_shared`](Allocator::is_shared)
/// reports `true`.
#[derive(Debug, Default)]
pub struct SystemAllocator {
    live: AtomicUsize,
    bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
}

impl SystemAllocator {
    /// Creates a new `SystemAllocator` with zeroed counters
    #[inline]
    pub const fn new() -> Self {
        Self {
            live: AtomicUsize::new(0),
            bytes: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
        }
    }

    /// Highest number of requested bytes live at once
    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes.load(Ordering::Acquire)
    }

    /// Distance from the platform block start to the payload
    ///
    /// Also the alignment of the platform block, so the payload keeps `align`.
    #[inline]
    const fn prefix_for(align: usize) -> usize {
        if align > PREFIX_WORD {
            align
        } else {
            PREFIX_WORD
        }
    }
}

// SAFETY: SystemAllocator forwards to the platform allocator.
// - Payloads are aligned: the platform block is aligned to prefix >= align and
//   the payload sits `prefix` bytes in
// - The prefix word is written inside the platform block, before the payload
// - deallocate rebuilds the exact layout used at allocation time
unsafe impl Allocator for SystemAllocator {
    unsafe fn allocate_unchecked(
        &self,
        size: usize,
        align: usize,
    ) -> AllocResult<Option<NonNull<u8>>> {
        let prefix = Self::prefix_for(align);
        let Some(total) = size.checked_add(prefix) else {
            return Ok(None);
        };
        let Ok(layout) = Layout::from_size_align(total, prefix) else {
            return Ok(None);
        };

        // SAFETY: layout has non-zero size (prefix >= one word).
        let Some(base) = NonNull::new(unsafe { System.alloc(layout) }) else {
            return Ok(None);
        };

        // SAFETY: total = prefix + size, so both the payload and the prefix
        // word right before it lie inside the platform block. The word is
        // aligned because payload is aligned to prefix >= size_of::<usize>().
        let payload = unsafe {
            let payload = base.add(prefix);
            payload
                .cast::<usize>()
                .as_ptr()
                .sub(1)
                .write(prefix);
            payload
        };

        self.live.fetch_add(1, Ordering::Release);
        let bytes = self.bytes.fetch_add(size, Ordering::Release) + size;
        atomic_max(&self.peak_bytes, bytes);

        #[cfg(feature = "logging")]
        trace!(size, align, "system allocate");

        Ok(Some(payload))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        // SAFETY: ptr came from allocate_unchecked, which stored the prefix in
        // the word right before the payload.
        unsafe {
            let prefix = ptr.cast::<usize>().as_ptr().sub(1).read();
            let base = ptr.sub(prefix);
            let layout = Layout::from_size_align_unchecked(size + prefix, prefix);
            System.dealloc(base.as_ptr(), layout);
        }

        saturating_decrement(&self.live, 1);
        saturating_decrement(&self.bytes, size);

        #[cfg(feature = "logging")]
        trace!(size, "system deallocate");
    }

    unsafe fn clear(&self) {
        // Blocks are owned by the platform allocator and cannot be dropped
        // wholesale; live blocks stay live.
    }

    fn count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    fn size(&self) -> usize {
        self.bytes.load(Ordering::Acquire)
    }

    fn max_size(&self) -> usize {
        isize::MAX as usize - PLATFORM_SLACK
    }

    fn owner(&self) -> Option<&dyn Allocator> {
        None
    }

    fn is_shared(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "system"
    }
}
