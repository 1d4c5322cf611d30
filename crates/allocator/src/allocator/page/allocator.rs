//! OS-backed page allocator
//!
//! # Safety
//!
//! Each successful `allocate` maps fresh pages through
//! [`reserve_pages`](crate::syscalls::reserve_pages) and records the mapping
//! in a registry keyed by address. `deallocate` unmaps exactly the recorded
//! range, so a pointer can only be released with the length it was mapped
//! with, and a pointer that was never handed out is detected and ignored.
//!
//! ## Registry
//!
//! The registry is what makes `count`, `size`, `clear` and leak cleanup on
//! drop possible. It is the one piece of internal state behind a lock: the
//! OS reservation path is already serialized by the kernel, and the lock
//! keeps the registry consistent when the allocator is shared.
//!
//! Addresses are stored with exposed provenance so mappings can still be
//! released on `clear` and `drop` without the caller's pointer.

use core::fmt;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicUsize, Ordering};

use hashbrown::HashMap;
use parking_lot::Mutex;

#[cfg(feature = "logging")]
use tracing::{debug, trace, warn};

use crate::allocator::{AllocError, AllocResult, Allocator};
use crate::syscalls::{page_size, release_pages, reserve_pages};
use crate::utils::{align_down, checked_align_up, saturating_decrement};

/// Allocator handing out whole pages, one OS mapping per allocation
///
/// This is a root allocator: it has no owner and is the natural backing for
/// large extents further down a delegation tree.
pub struct PageAllocator {
    page_size: usize,
    /// Live mappings: address -> mapped length
    mappings: Mutex<HashMap<usize, usize>>,
    live: AtomicUsize,
    mapped_bytes: AtomicUsize,
}

impl PageAllocator {
    /// Creates a page allocator using the system page size
    pub fn new() -> Self {
        let page_size = page_size();

        #[cfg(feature = "logging")]
        debug!(page_size, "page allocator created");

        Self {
            page_size,
            mappings: Mutex::new(HashMap::new()),
            live: AtomicUsize::new(0),
            mapped_bytes: AtomicUsize::new(0),
        }
    }

    /// Page granularity of every mapping
    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Mapped length of `ptr` if it is a live allocation of this allocator
    pub fn mapping_len(&self, ptr: NonNull<u8>) -> Option<usize> {
        self.mappings.lock().get(&ptr.as_ptr().addr()).copied()
    }

    /// Release every recorded mapping
    fn release_all(&self) -> usize {
        let drained: Vec<(usize, usize)> = self.mappings.lock().drain().collect();
        let released = drained.len();

        for (addr, len) in drained {
            let Some(ptr) = NonNull::new(ptr::with_exposed_provenance_mut::<u8>(addr)) else {
                continue;
            };
            // SAFETY: (addr, len) was recorded when the mapping was created and
            // has just been removed from the registry, so it is released once.
            if let Err(err) = unsafe { release_pages(ptr, len) } {
                #[cfg(feature = "logging")]
                warn!(addr, len, error = %err, "failed to release pages");
                #[cfg(not(feature = "logging"))]
                let _ = err;
            }
            saturating_decrement(&self.mapped_bytes, len);
        }

        saturating_decrement(&self.live, released);

        #[cfg(feature = "logging")]
        trace!(released, "page mappings released");

        released
    }
}

impl Default for PageAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: PageAllocator returns fresh OS mappings.
// - Mappings are page aligned and align <= max_align() == page size
// - Distinct mappings never overlap
// - deallocate only unmaps ranges recorded in the registry
unsafe impl Allocator for PageAllocator {
    unsafe fn allocate_unchecked(
        &self,
        size: usize,
        align: usize,
    ) -> AllocResult<Option<NonNull<u8>>> {
        let Some(len) = checked_align_up(size, self.page_size) else {
            return Ok(None);
        };
        if len > self.max_size() {
            return Ok(None);
        }

        let ptr = reserve_pages(len).map_err(|err| AllocError::os_failure(size, align, &err))?;

        let addr = ptr.as_ptr().expose_provenance();
        self.mappings.lock().insert(addr, len);
        self.live.fetch_add(1, Ordering::Release);
        self.mapped_bytes.fetch_add(len, Ordering::Release);

        #[cfg(feature = "logging")]
        trace!(size, len, "pages reserved");

        Ok(Some(ptr))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        let addr = ptr.as_ptr().addr();
        let Some(len) = self.mappings.lock().remove(&addr) else {
            #[cfg(feature = "logging")]
            warn!(ptr = addr, size, "deallocation of an unknown page mapping ignored");
            return;
        };
        debug_assert!(
            size <= len,
            "page deallocation size {size} exceeds the mapping ({len} bytes)"
        );

        // SAFETY: the mapping was recorded by allocate_unchecked with this
        // length and has just been removed from the registry.
        if let Err(err) = unsafe { release_pages(ptr, len) } {
            #[cfg(feature = "logging")]
            warn!(ptr = addr, len, error = %err, "failed to release pages");
            #[cfg(not(feature = "logging"))]
            let _ = err;
        }

        saturating_decrement(&self.live, 1);
        saturating_decrement(&self.mapped_bytes, len);

        #[cfg(feature = "logging")]
        trace!(size, len, "pages released");
    }

    unsafe fn clear(&self) {
        self.release_all();
    }

    fn count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    fn size(&self) -> usize {
        self.mapped_bytes.load(Ordering::Acquire)
    }

    fn max_size(&self) -> usize {
        align_down(isize::MAX as usize, self.page_size)
    }

    fn max_align(&self) -> usize {
        self.page_size
    }

    fn owner(&self) -> Option<&dyn Allocator> {
        None
    }

    fn is_shared(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "page"
    }
}

impl Drop for PageAllocator {
    fn drop(&mut self) {
        let leaked = self.release_all();
        if leaked > 0 {
            #[cfg(feature = "logging")]
            warn!(leaked, "page allocator dropped with live mappings");
        }
    }
}

impl fmt::Debug for PageAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageAllocator")
            .field("page_size", &self.page_size)
            .field("count", &self.count())
            .field("mapped_bytes", &self.size())
            .finish()
    }
}
