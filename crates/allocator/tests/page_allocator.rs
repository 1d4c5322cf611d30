//! Integration tests for the page allocator

use nebula_allocator::allocator::{Allocator, LinearAllocator, PageAllocator};
use nebula_allocator::syscalls::page_size;
use pretty_assertions::assert_eq;

#[test]
fn test_one_mapping_per_allocation() {
    let pages = PageAllocator::new();
    let page = page_size();

    let a = pages.allocate(page + 1, 8).unwrap().unwrap();
    let b = pages.allocate(10, 8).unwrap().unwrap();

    assert_eq!(pages.count(), 2);
    assert_eq!(pages.size(), 3 * page);
    assert_eq!(pages.mapping_len(a), Some(2 * page));
    assert_eq!(pages.mapping_len(b), Some(page));

    unsafe {
        a.as_ptr().add(2 * page - 1).write(1);
        pages.deallocate(a, page + 1);
        pages.deallocate(b, 10);
    }
    assert_eq!(pages.count(), 0);
    assert_eq!(pages.size(), 0);
}

#[test]
fn test_unknown_pointer_is_ignored() {
    let pages = PageAllocator::new();
    let ptr = pages.allocate(64, 8).unwrap().unwrap();

    let mut local = 0u8;
    unsafe { pages.deallocate(std::ptr::NonNull::from(&mut local), 1) };
    assert_eq!(pages.count(), 1);

    unsafe { pages.deallocate(ptr, 64) };
    assert_eq!(pages.count(), 0);
}

#[test]
fn test_page_alignment_is_supported() {
    let pages = PageAllocator::new();
    assert_eq!(pages.max_align(), page_size());

    let ptr = pages.allocate(1, page_size()).unwrap().unwrap();
    assert_eq!(ptr.as_ptr().addr() % page_size(), 0);
}

#[test]
fn test_drop_releases_leaked_mappings() {
    let pages = PageAllocator::new();
    for _ in 0..3 {
        pages.allocate(1, 1).unwrap().unwrap();
    }
    assert_eq!(pages.count(), 3);
    drop(pages);
}

#[test]
fn test_backs_an_arena() {
    let pages = PageAllocator::new();
    {
        let arena = LinearAllocator::new_in(&pages, 64 * 1024).unwrap();
        assert_eq!(pages.count(), 1);
        assert_eq!(pages.size(), (64 * 1024_usize).next_multiple_of(page_size()));
        arena.allocate(1000, 8).unwrap().unwrap();
    }
    assert_eq!(pages.count(), 0);
}

#[test]
fn test_is_a_shared_root() {
    let pages = PageAllocator::new();
    assert!(pages.owner().is_none());
    assert!(pages.is_shared());
    assert_eq!(pages.stats().name, "page");
}
