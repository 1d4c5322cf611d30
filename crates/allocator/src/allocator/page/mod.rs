//! Page-granularity allocator backed directly by the operating system.
//!
//! Every allocation is one OS reservation; there is no internal free list.
pub mod allocator;
pub use allocator::PageAllocator;
