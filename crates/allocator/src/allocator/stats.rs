//! Allocator statistics snapshots

use core::fmt;

/// Point-in-time view of an allocator's counters
///
/// Produced by [`Allocator::stats`](super::Allocator::stats). The snapshot is
/// plain data; it does not keep the allocator borrowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Strategy name
    pub name: &'static str,
    /// Live allocations
    pub count: usize,
    /// Total bytes managed
    pub size: usize,
    /// Largest request that could currently succeed
    pub max_size: usize,
    /// Whether the extent is shared between logical owners
    pub shared: bool,
}

impl AllocatorStats {
    /// Whether the allocator has no live allocations
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.count == 0
    }

    /// Percentage of `size` that a single request could still obtain
    #[must_use]
    pub fn headroom_percent(&self) -> f64 {
        if self.size == 0 {
            return 0.0;
        }
        (self.max_size.min(self.size) as f64 / self.size as f64) * 100.0
    }
}

impl fmt::Display for AllocatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} live, {} bytes, largest request {} bytes{}",
            self.name,
            self.count,
            self.size,
            self.max_size,
            if self.shared { " (shared)" } else { "" }
        )
    }
}
