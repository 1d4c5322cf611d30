//! # nebula-allocator
//!
//! Pluggable low-level allocation strategies for the Nebula ecosystem.
//!
//! This crate provides a family of allocators unified behind one capability
//! interface, [`Allocator`]:
//! - [`LinearAllocator`]: bump-pointer arena with bulk reset only
//! - [`StackedAllocator`]: bump-pointer with LIFO pops and marker rollback
//! - [`HeapAllocator`]: first-fit free list with splitting and coalescing
//! - [`PageAllocator`]: one OS page mapping per allocation
//! - [`SystemAllocator`]: explicit root over the platform allocator
//!
//! plus [`AllocatorPolicy`], the typed adapter generic containers hold.
//!
//! ## Quick Start
//!
//! ```rust
//! use nebula_allocator::prelude::*;
//!
//! # fn main() -> nebula_allocator::Result<()> {
//! let system = SystemAllocator::new();
//! let heap = HeapAllocator::new_in(&system, 64 * 1024)?;
//! let frame_arena = StackedAllocator::new_in(&heap, 4096)?;
//!
//! let block = frame_arena.allocate(256, 16)?.expect("arena has room");
//! assert_eq!(block.as_ptr().addr() % 16, 0);
//!
//! let policy = AllocatorPolicy::<u32>::new(&heap);
//! let values = policy.allocate(8)?;
//! unsafe { policy.deallocate(values, 8) };
//! # Ok(())
//! # }
//! ```
//!
//! ## Delegation
//!
//! Every extent-based allocator borrows the allocator it drew its extent from
//! and returns the extent with one `deallocate` call when dropped. The borrow
//! checker keeps the owner alive for as long as its children, so the owner
//! graph is always a tree.
//!
//! ## Features
//!
//! - `logging` (default): structured logging through `tracing`
//!
//! ## Errors
//!
//! Exhaustion is reported as `Ok(None)`. [`MemoryError`] is reserved for
//! precondition violations caught at the boundary and for OS failures.

#![allow(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rust_2018_idioms)]
// Pointer casts between heap block records are checked against BLOCK_ALIGN
#![allow(clippy::cast_ptr_alignment)]

// Error types
pub mod error;

// Core modules
pub mod allocator;
pub mod syscalls;
pub mod utils;

pub use crate::allocator::{
    Allocator, AllocatorPolicy, AllocatorStats, Extent, HeapAllocator, LinearAllocator,
    PageAllocator, StackedAllocator, SystemAllocator,
};
pub use crate::error::{ErrorKind, MemoryError, MemoryResult, Result};

// Public API exports
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Error types
    pub use crate::error::{ErrorKind, MemoryError, MemoryResult, Result};

    // Allocator types
    pub use crate::allocator::{
        AllocError, AllocResult, Allocator, AllocatorPolicy, AllocatorStats, Extent,
        HeapAllocator, HeapConfig, LinearAllocator, LinearConfig, PageAllocator, StackFrame,
        StackMarker, StackedAllocator, StackedConfig, SystemAllocator,
    };
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
