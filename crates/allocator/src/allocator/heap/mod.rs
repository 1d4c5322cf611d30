//! A general-purpose heap allocator over an intrusive free list.
//!
//! First-fit search, block splitting on allocation and address-ordered
//! coalescing on release.
//!
//! ## Modules
//! - `allocator` - Main `HeapAllocator` implementation
//! - `block` - In-band `Header` / `FreeBlock` records and fragmentation stats
//! - `config` - Configuration variants (production, debug)
pub mod allocator;
mod block;
pub mod config;
pub use allocator::HeapAllocator;
pub use block::{FragmentationStats, MIN_BLOCK_SIZE};
pub use config::{DEFAULT_MIN_SPLIT, HeapConfig};
