//! Low-level system calls for the page allocator
//!
//! # Architecture
//!
//! - **direct.rs** - Direct syscall wrappers (mmap, VirtualAlloc, etc.)
//!
//! Only page-granularity reservation and release live here. Everything above
//! the page level is carved out of extents by the strategies themselves.
//!
//! # Safety
//!
//! Releasing memory through this module is `unsafe`: passing a range that was
//! not produced by [`reserve_pages`] corrupts the address space.

mod direct;
pub use direct::*;

use std::sync::OnceLock;

static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

/// Fallback used when the platform cannot report a page size
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// System page size, queried once and cached
pub fn page_size() -> usize {
    *PAGE_SIZE.get_or_init(|| {
        let size = query_page_size();
        if size.is_power_of_two() {
            size
        } else {
            DEFAULT_PAGE_SIZE
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_power_of_two() {
        let size = page_size();
        assert!(size.is_power_of_two());
        assert!(size >= 4096);
        assert_eq!(size, page_size());
    }
}
