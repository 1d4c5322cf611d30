//! Stacked allocator configuration

/// Configuration for stacked allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackedConfig {
    /// Fill patterns for debugging
    pub alloc_pattern: Option<u8>,
    pub dealloc_pattern: Option<u8>,

    /// Whether the extent may be reached by more than one logical owner
    pub shared: bool,
}

impl Default for StackedConfig {
    fn default() -> Self {
        Self {
            alloc_pattern: if cfg!(debug_assertions) { Some(0xCC) } else { None },
            dealloc_pattern: if cfg!(debug_assertions) { Some(0xDD) } else { None },
            shared: false,
        }
    }
}

impl StackedConfig {
    /// Production configuration - optimized for performance
    #[must_use]
    pub const fn production() -> Self {
        Self {
            alloc_pattern: None,
            dealloc_pattern: None,
            shared: false,
        }
    }

    /// Debug configuration - optimized for debugging
    #[must_use]
    pub const fn debug() -> Self {
        Self {
            alloc_pattern: Some(0xCC),
            dealloc_pattern: Some(0xDD),
            shared: false,
        }
    }

    /// Mark the extent as shared
    #[must_use]
    pub const fn with_shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }
}
