//! Linear allocator configuration

/// Configuration for linear allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearConfig {
    /// Fill patterns for debugging
    pub alloc_pattern: Option<u8>,
    pub dealloc_pattern: Option<u8>,

    /// Whether the extent may be reached by more than one logical owner
    pub shared: bool,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            alloc_pattern: if cfg!(debug_assertions) { Some(0xCC) } else { None },
            dealloc_pattern: if cfg!(debug_assertions) { Some(0xDD) } else { None },
            shared: false,
        }
    }
}

impl LinearConfig {
    /// Production configuration - no fills
    #[must_use]
    pub const fn production() -> Self {
        Self {
            alloc_pattern: None,
            dealloc_pattern: None,
            shared: false,
        }
    }

    /// Debug configuration - fill on allocate and on reset
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
