//! Free-list heap allocator
//!
//! # Safety
//!
//! Free memory is tracked by an intrusive, address-ordered singly linked list
//! of [`FreeBlock`] nodes written into the free ranges themselves. Every live
//! allocation carries a [`Header`] right before its payload.
//!
//! ## Invariants
//!
//! - Free blocks never overlap, are sorted by address and are never adjacent
//!   (adjacent neighbours are merged when a block is released)
//! - Block starts and sizes are multiples of `BLOCK_ALIGN`, and every block is
//!   at least `MIN_BLOCK_SIZE` bytes
//! - `free_bytes` plus the `Header::size` of every live allocation equals
//!   [`size`](crate::Allocator::size)
//! - All node and header pointers are derived from the extent's base pointer

use core::cell::Cell;
use core::fmt;
use core::ops::Range;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, error, trace};

use super::block::{
    BLOCK_ALIGN, FreeBlock, FragmentationStats, HEADER_ALIGN, HEADER_SIZE, Header,
    MIN_BLOCK_SIZE, null_block,
};
use super::HeapConfig;
use crate::allocator::{AllocError, AllocResult, Allocator, Extent};
use crate::utils::{
    align_down, align_up, checked_align_up, fill_pattern, is_aligned, saturating_decrement,
};

/// Placement of a request inside a free block
#[derive(Debug, Clone, Copy)]
struct Fit {
    payload: usize,
    adjust: usize,
    needed: usize,
}

/// General-purpose first-fit allocator with splitting and coalescing
///
/// # Memory Layout
/// ```text
/// block start                header   payload
/// |<------ adjust ------>|<- HEADER ->|<---- size ---->|<- tail ->|
/// |<--------------------- Header::size ------------------------->|
/// ```
pub struct HeapAllocator<'a> {
    extent: Extent<'a>,
    /// First managed byte (extent begin rounded up to `BLOCK_ALIGN`)
    heap_begin: usize,
    /// Managed bytes (a multiple of `BLOCK_ALIGN`)
    heap_len: usize,
    head: Cell<*mut FreeBlock>,
    free_bytes: Cell<usize>,
    count: AtomicUsize,
    config: HeapConfig,
}

impl<'a> HeapAllocator<'a> {
    /// Creates a heap allocator over an existing extent
    ///
    /// # Errors
    /// - `InvalidConfig` if the configuration does not validate
    /// - `InvalidArgument` if the extent cannot hold a single free block
    pub fn with_extent(extent: Extent<'a>, config: HeapConfig) -> AllocResult<Self> {
        config.validate()?;

        let heap_begin = align_up(extent.begin_addr(), BLOCK_ALIGN);
        let heap_len = align_down(extent.end_addr().saturating_sub(heap_begin), BLOCK_ALIGN);
        if heap_len < MIN_BLOCK_SIZE {
            return Err(AllocError::invalid_argument(
                "extent is too small for a heap block",
            ));
        }

        #[cfg(feature = "logging")]
        debug!(
            len = heap_len,
            owner = extent.owner().map(|owner| owner.name()),
            "heap allocator created"
        );

        let heap = Self {
            extent,
            heap_begin,
            heap_len,
            head: Cell::new(null_block()),
            free_bytes: Cell::new(0),
            count: AtomicUsize::new(0),
            config,
        };
        heap.reset_free_list();
        Ok(heap)
    }

    /// Creates a heap allocator drawing `capacity` bytes from `owner`
    ///
    /// # Errors
    /// Fails if the owner cannot supply the extent or the extent is too small.
    pub fn new_in(owner: &'a dyn Allocator, capacity: usize) -> AllocResult<Self> {
        Self::with_config_in(owner, capacity, HeapConfig::default())
    }

    /// Creates a heap allocator with custom configuration drawing from `owner`
    ///
    /// # Errors
    /// Fails if the configuration is invalid, the owner cannot supply the
    /// extent or the extent is too small.
    pub fn with_config_in(
        owner: &'a dyn Allocator,
        capacity: usize,
        config: HeapConfig,
    ) -> AllocResult<Self> {
        config.validate()?;
        Self::with_extent(Extent::draw(owner, capacity)?, config)
    }

    /// Creates a root heap allocator over a caller-provided buffer
    ///
    /// # Errors
    /// Fails if the buffer cannot hold a single free block.
    pub fn from_buffer(buffer: &'a mut [u8]) -> AllocResult<Self> {
        Self::with_extent(Extent::from_buffer(buffer), HeapConfig::default())
    }

    /// Bytes currently on the free list
    pub fn free_bytes(&self) -> usize {
        self.free_bytes.get()
    }

    /// Bytes consumed by live allocations, headers and padding included
    pub fn used_bytes(&self) -> usize {
        self.heap_len - self.free_bytes.get()
    }

    /// Number of blocks on the free list
    pub fn fragment_count(&self) -> usize {
        self.free_blocks().count()
    }

    /// Free-space summary walked from the free list
    pub fn fragmentation(&self) -> FragmentationStats {
        let (total, largest, fragments) = self
            .free_blocks()
            .fold((0, 0, 0), |(total, largest, fragments), (_, size)| {
                (total + size, largest.max(size), fragments + 1)
            });
        FragmentationStats::calculate(total, largest, fragments)
    }

    /// Bytes of bookkeeping stored before every payload
    pub const fn header_size() -> usize {
        HEADER_SIZE
    }

    /// Returns the active configuration
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Iterate `(address, size)` of every free block in address order
    fn free_blocks(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let mut current = self.head.get();
        core::iter::from_fn(move || {
            if current.is_null() {
                return None;
            }
            // SAFETY: every non-null link points at a FreeBlock node written
            // inside the extent by this allocator.
            let (size, next) = unsafe { ((*current).size, (*current).next) };
            let addr = current.addr();
            current = next;
            Some((addr, size))
        })
    }

    /// Pointer to the managed byte at `addr`, typed as `T`
    #[inline]
    fn at<T>(&self, addr: usize) -> *mut T {
        self.extent.ptr_at(addr).cast::<T>().as_ptr()
    }

    /// Turn the whole managed range into a single free block
    fn reset_free_list(&self) {
        let block = self.at::<FreeBlock>(self.heap_begin);
        // SAFETY: [heap_begin, heap_begin + heap_len) lies in the extent, is
        // BLOCK_ALIGN aligned and holds at least one FreeBlock.
        unsafe {
            block.write(FreeBlock {
                size: self.heap_len,
                next: null_block(),
            });
        }
        self.head.set(block);
        self.free_bytes.set(self.heap_len);
    }

    /// Where a request would land in the free block `[start, start + size)`
    fn fit(block_start: usize, block_size: usize, size: usize, align: usize) -> Option<Fit> {
        let payload = checked_align_up(block_start.checked_add(HEADER_SIZE)?, align)?;
        let adjust = payload - HEADER_SIZE - block_start;
        let needed = checked_align_up(payload.checked_add(size)?, BLOCK_ALIGN)? - block_start;
        let needed = needed.max(MIN_BLOCK_SIZE);
        (needed <= block_size).then_some(Fit {
            payload,
            adjust,
            needed,
        })
    }
}

// SAFETY: HeapAllocator carves disjoint blocks out of its extent.
// - A block is taken off the free list before its payload is handed out
// - A released block goes back on the list, merged only with free neighbours
// - Every payload is aligned to max(align, HEADER_ALIGN) and ends inside its block
unsafe impl Allocator for HeapAllocator<'_> {
    unsafe fn allocate_unchecked(
        &self,
        size: usize,
        align: usize,
    ) -> AllocResult<Option<NonNull<u8>>> {
        let align = align.max(HEADER_ALIGN);
        let mut prev = null_block();
        let mut current = self.head.get();

        while !current.is_null() {
            let block_start = current.addr();
            // SAFETY: current is a live node of the free list.
            let (block_size, next) = unsafe { ((*current).size, (*current).next) };

            let Some(fit) = Self::fit(block_start, block_size, size, align) else {
                prev = current;
                current = next;
                continue;
            };

            debug_assert!(is_aligned(fit.payload, align));
            let remainder = block_size - fit.needed;
            let (taken, replacement) = if remainder >= self.config.min_split {
                let split = self.at::<FreeBlock>(block_start + fit.needed);
                // SAFETY: the remainder lies past the new payload inside the
                // same free block and is at least min_split >= MIN_BLOCK_SIZE.
                unsafe {
                    split.write(FreeBlock {
                        size: remainder,
                        next,
                    });
                }
                (fit.needed, split)
            } else {
                (block_size, next)
            };

            if prev.is_null() {
                self.head.set(replacement);
            } else {
                // SAFETY: prev is a live node preceding current.
                unsafe { (*prev).next = replacement };
            }

            // SAFETY: payload - HEADER_SIZE >= block_start and is
            // HEADER_ALIGN aligned; the node at current was read above.
            unsafe {
                self.at::<Header>(fit.payload - HEADER_SIZE)
                    .write(Header::new(taken, fit.adjust));
            }

            self.free_bytes.set(self.free_bytes.get() - taken);
            self.count.fetch_add(1, Ordering::Release);

            let ptr = self.extent.ptr_at(fit.payload);
            if let Some(pattern) = self.config.alloc_pattern {
                // SAFETY: the payload is inside the block just taken.
                unsafe { fill_pattern(ptr.as_ptr(), size, pattern) };
            }

            #[cfg(feature = "logging")]
            trace!(size, align, block = taken, adjust = fit.adjust, "heap allocate");

            return Ok(Some(ptr));
        }

        #[cfg(feature = "logging")]
        trace!(size, align, free = self.free_bytes.get(), "heap has no fitting block");

        Ok(None)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        let payload = ptr.as_ptr().addr();
        debug_assert!(
            payload >= self.heap_begin + HEADER_SIZE && payload < self.heap_begin + self.heap_len,
            "heap deallocation of {payload:#x} outside the extent"
        );

        // SAFETY: payload came from allocate_unchecked, which wrote the header
        // right before it.
        let header = unsafe { self.at::<Header>(payload - HEADER_SIZE).read() };
        if !header.is_intact() {
            #[cfg(feature = "logging")]
            error!(ptr = payload, size, "heap header guard corrupted, block leaked");
            return;
        }
        debug_assert!(
            header.adjust + HEADER_SIZE + size <= header.size,
            "heap deallocation size {size} does not match the block"
        );

        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: the caller gives up the payload.
            unsafe { fill_pattern(ptr.as_ptr(), size, pattern) };
        }

        let block_start = payload - HEADER_SIZE - header.adjust;
        let block_size = header.size;
        let block_end = block_start + block_size;

        let mut prev = null_block();
        let mut current = self.head.get();
        while !current.is_null() && current.addr() < block_start {
            prev = current;
            // SAFETY: current is a live node of the free list.
            current = unsafe { (*current).next };
        }

        // SAFETY: prev and current are null or live nodes; block_start is a
        // block boundary owned by the caller until this point.
        unsafe {
            debug_assert!(
                current.is_null() || block_end <= current.addr(),
                "heap double free or overlap at {block_start:#x}"
            );
            debug_assert!(
                prev.is_null() || prev.addr() + (*prev).size <= block_start,
                "heap double free or overlap at {block_start:#x}"
            );

            let (merged_size, next) = if !current.is_null() && block_end == current.addr() {
                (block_size + (*current).size, (*current).next)
            } else {
                (block_size, current)
            };

            if !prev.is_null() && prev.addr() + (*prev).size == block_start {
                (*prev).size += merged_size;
                (*prev).next = next;
            } else {
                let block = self.at::<FreeBlock>(block_start);
                block.write(FreeBlock {
                    size: merged_size,
                    next,
                });
                if prev.is_null() {
                    self.head.set(block);
                } else {
                    (*prev).next = block;
                }
            }
        }

        self.free_bytes.set(self.free_bytes.get() + block_size);
        saturating_decrement(&self.count, 1);

        #[cfg(feature = "logging")]
        trace!(size, block = block_size, "heap deallocate");
    }

    unsafe fn clear(&self) {
        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: the managed range lies in the extent and the caller
            // gives up every block in it.
            unsafe { fill_pattern(self.at::<u8>(self.heap_begin), self.heap_len, pattern) };
        }

        self.reset_free_list();
        self.count.store(0, Ordering::Release);

        #[cfg(feature = "logging")]
        trace!("heap allocator cleared");
    }

    fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn size(&self) -> usize {
        self.heap_len
    }

    fn max_size(&self) -> usize {
        self.free_blocks().map(|(_, size)| size).max().unwrap_or(0)
    }

    fn owner(&self) -> Option<&dyn Allocator> {
        self.extent.owner()
    }

    fn is_shared(&self) -> bool {
        self.config.shared
    }

    fn name(&self) -> &'static str {
        "heap"
    }

    fn extent(&self) -> Option<Range<usize>> {
        Some(self.heap_begin..self.heap_begin + self.heap_len)
    }
}

impl fmt::Debug for HeapAllocator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapAllocator")
            .field("extent", &self.extent)
            .field("free_bytes", &self.free_bytes.get())
            .field("fragments", &self.fragment_count())
            .field("count", &self.count())
            .field("config", &self.config)
            .finish()
    }
}
