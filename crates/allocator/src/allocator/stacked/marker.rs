//! Stack marker for position tracking

/// Marker representing a position in the stacked allocator
///
/// Can be used to rewind the allocator to this position, deallocating
/// all allocations made after the marker was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StackMarker {
    pub(super) position: usize,
    pub(super) count: usize,
}

impl StackMarker {
    /// Top-of-stack address captured by this marker
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Live allocations at the time the marker was taken
    #[inline]
    pub const fn count(&self) -> usize {
        self.count
    }
}
