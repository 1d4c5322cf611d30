//! RAII-based stack frame for automatic rewinding

use super::{StackMarker, StackedAllocator};

/// RAII helper for scoped stack allocation
///
/// Snapshots the top of the stack on creation and rewinds to it when it goes
/// out of scope, releasing every allocation made inside the frame at once.
/// Pointers obtained inside the frame must not outlive it.
pub struct StackFrame<'s, 'a> {
    allocator: &'s StackedAllocator<'a>,
    marker: StackMarker,
}

impl<'s, 'a> StackFrame<'s, 'a> {
    /// Creates a new stack frame that will rewind to the current position
    /// when dropped
    pub fn new(allocator: &'s StackedAllocator<'a>) -> Self {
        let marker = allocator.marker();
        Self { allocator, marker }
    }

    /// Gets the underlying allocator
    pub fn allocator(&self) -> &'s StackedAllocator<'a> {
        self.allocator
    }

    /// Marker this frame rewinds to
    pub fn marker(&self) -> StackMarker {
        self.marker
    }

    /// Manually rewind and consume this frame
    pub fn restore(self) {
        // Drop does the rewinding
        drop(self);
    }
}

impl Drop for StackFrame<'_, '_> {
    fn drop(&mut self) {
        // SAFETY: the frame contract says allocations made inside it are not
        // used past its end. A stale marker is reported by rewind and skipped.
        let _ = unsafe { self.allocator.rewind(self.marker) };
    }
}
