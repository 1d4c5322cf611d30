//! Utility functions and helpers for nebula-allocator
//!
//! Address arithmetic shared by every strategy:
//! - Alignment helpers (plain and overflow-checked)
//! - Fill helpers for debug byte patterns
//! - Atomic counter helpers

use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering, compiler_fence};

/// Aligns a value up to the nearest multiple of alignment
///
/// # Examples
/// ```
/// use nebula_allocator::utils::align_up;
///
/// assert_eq!(align_up(7, 8), 8);
/// assert_eq!(align_up(8, 8), 8);
/// assert_eq!(align_up(9, 8), 16);
/// ```
#[inline(always)]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Aligns a value up, returning `None` if the result does not fit in `usize`
///
/// # Examples
/// ```
/// use nebula_allocator::utils::checked_align_up;
///
/// assert_eq!(checked_align_up(9, 8), Some(16));
/// assert_eq!(checked_align_up(usize::MAX, 8), None);
/// ```
#[inline(always)]
pub const fn checked_align_up(value: usize, alignment: usize) -> Option<usize> {
    debug_assert!(alignment.is_power_of_two());
    match value.checked_add(alignment - 1) {
        Some(bumped) => Some(bumped & !(alignment - 1)),
        None => None,
    }
}

/// Aligns a value down to the nearest multiple of alignment
///
/// # Examples
/// ```
/// use nebula_allocator::utils::align_down;
///
/// assert_eq!(align_down(7, 8), 0);
/// assert_eq!(align_down(8, 8), 8);
/// assert_eq!(align_down(9, 8), 8);
/// ```
#[inline(always)]
pub const fn align_down(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    value & !(alignment - 1)
}

/// Checks if a value is aligned to the given alignment
#[inline(always)]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    debug_assert!(alignment.is_power_of_two());
    value & (alignment - 1) == 0
}

/// Fill `len` bytes at `ptr` with a debug pattern
///
/// # Safety
/// `ptr` must be valid for writes of `len` bytes.
#[inline]
pub(crate) unsafe fn fill_pattern(ptr: *mut u8, len: usize, pattern: u8) {
    if len == 0 {
        return;
    }
    // SAFETY: caller guarantees `ptr..ptr + len` is writable.
    unsafe {
        ptr::write_bytes(ptr, pattern, len);
    }
    compiler_fence(Ordering::SeqCst);
}

/// Atomically update maximum value
#[inline]
pub fn atomic_max(current: &AtomicUsize, value: usize) {
    let mut max = current.load(Ordering::Relaxed);
    while value > max {
        match current.compare_exchange_weak(max, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(x) => max = x,
        }
    }
}

/// Decrement a live-object counter without wrapping below zero
///
/// Release ordering pairs with the Acquire loads done by observers.
#[inline]
pub(crate) fn saturating_decrement(counter: &AtomicUsize, by: usize) {
    let _ = counter.fetch_update(Ordering::Release, Ordering::Relaxed, |value| {
        Some(value.saturating_sub(by))
    });
}
