//!
//! Allocation strategies behind one capability interface
//!
//! Every strategy implements [`Allocator`]. Extent-based strategies draw their
//! backing range from a parent allocator through an [`Extent`] and give it
//! back when dropped, so a set of allocators forms a delegation tree rooted at
//! a [`SystemAllocator`] or [`PageAllocator`] (or at a caller-owned buffer).

// Core allocator types
mod extent;
mod policy;
mod stats;
mod system;
mod traits;

// Allocator implementations
pub mod heap;
pub mod linear;
pub mod page;
pub mod stacked;

// Re-exports for convenience
pub use crate::error::{AllocError, AllocResult};
pub use extent::{EXTENT_ALIGN, Extent};
pub use heap::{FragmentationStats, HeapAllocator, HeapConfig};
pub use linear::{LinearAllocator, LinearConfig};
pub use page::PageAllocator;
pub use policy::AllocatorPolicy;
pub use stacked::{StackFrame, StackMarker, StackedAllocator, StackedConfig};
pub use stats::AllocatorStats;
pub use system::SystemAllocator;
pub use traits::{Allocator, DEFAULT_MAX_ALIGN, validate_request};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_chain_walks_to_the_root() {
        let system = SystemAllocator::new();
        let heap = HeapAllocator::new_in(&system, 4096).unwrap();
        let stack = StackedAllocator::new_in(&heap, 1024).unwrap();

        let depth = core::iter::successors(Some(&stack as &dyn Allocator), |&a| a.owner()).count();
        assert_eq!(depth, 3);
        assert!(stack.owner().unwrap().is_equal(&heap));
        assert!(heap.owner().unwrap().is_equal(&system));
    }
}
