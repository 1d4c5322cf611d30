//! Heap allocator configuration

use super::block::MIN_BLOCK_SIZE;
use crate::error::{MemoryError, MemoryResult};

/// Default split threshold: a remainder must fit a header plus a small payload
pub const DEFAULT_MIN_SPLIT: usize = 64;

/// Configuration for heap allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
    /// Fill patterns for debugging
    pub alloc_pattern: Option<u8>,
    pub dealloc_pattern: Option<u8>,

    /// Smallest remainder worth splitting off as a new free block
    ///
    /// Smaller remainders stay attached to the allocation they come from.
    pub min_split: usize,

    /// Whether the extent may be reached by more than one logical owner
    pub shared: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            alloc_pattern: if cfg!(debug_assertions) { Some(0xCC) } else { None },
            dealloc_pattern: if cfg!(debug_assertions) { Some(0xDD) } else { None },
            min_split: DEFAULT_MIN_SPLIT,
            shared: false,
        }
    }
}

impl HeapConfig {
    /// Production configuration - no fills
    #[must_use]
    pub const fn production() -> Self {
        Self {
            alloc_pattern: None,
            dealloc_pattern: None,
            min_split: DEFAULT_MIN_SPLIT,
            shared: false,
        }
    }

    /// Debug configuration - fill on allocate and on release
    #[must_use]
    pub const fn debug() -> Self {
        Self {
            alloc_pattern: Some(0xCC),
            dealloc_pattern: Some(0xDD),
            min_split: DEFAULT_MIN_SPLIT,
            shared: false,
        }
    }

    /// Set the split threshold
    #[must_use]
    pub const fn with_min_split(mut self, min_split: usize) -> Self {
        self.min_split = min_split;
        self
    }

    /// Mark the extent as shared
    #[must_use]
    pub const fn with_shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    /// Validate configuration
    ///
    /// # Errors
    /// `InvalidConfig` if `min_split` cannot hold a free-list node.
    pub fn validate(&self) -> MemoryResult<()> {
        if self.min_split < MIN_BLOCK_SIZE {
            return Err(MemoryError::invalid_config(&format!(
                "min_split {} is smaller than a free block ({MIN_BLOCK_SIZE} bytes)",
                self.min_split
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        assert!(HeapConfig::default().validate().is_ok());
        assert!(HeapConfig::production().validate().is_ok());
        assert!(HeapConfig::debug().validate().is_ok());
    }

    #[test]
    fn tiny_split_threshold_is_rejected() {
        let config = HeapConfig::production().with_min_split(1);
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "MEM:CONFIG:INVALID");
    }
}
