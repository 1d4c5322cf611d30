//! Delegation trees: allocators drawing their extents from other allocators

use std::iter::successors;

use nebula_allocator::allocator::{
    Allocator, Extent, HeapAllocator, LinearAllocator, PageAllocator, StackedAllocator,
    SystemAllocator,
};
use pretty_assertions::assert_eq;

fn ancestry(allocator: &dyn Allocator) -> Vec<&'static str> {
    successors(Some(allocator), |&a| a.owner())
        .map(|a| a.name())
        .collect()
}

#[test]
fn test_three_level_tree() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let pages = PageAllocator::new();
    let heap = HeapAllocator::new_in(&pages, 256 * 1024).unwrap();
    let frame = StackedAllocator::new_in(&heap, 16 * 1024).unwrap();
    let scratch = LinearAllocator::new_in(&frame, 1024).unwrap();

    assert_eq!(ancestry(&scratch), ["linear", "stacked", "heap", "page"]);
    assert!(pages.owner().is_none());

    assert_eq!(pages.count(), 1);
    assert_eq!(heap.count(), 1);
    assert_eq!(frame.count(), 1);
}

#[test]
fn test_extents_lie_inside_their_owner() {
    let system = SystemAllocator::new();
    let heap = HeapAllocator::new_in(&system, 8192).unwrap();
    let stack = StackedAllocator::new_in(&heap, 2048).unwrap();

    let outer = heap.extent().unwrap();
    let inner = stack.extent().unwrap();
    assert!(outer.start <= inner.start && inner.end <= outer.end);

    let ptr = stack.allocate(100, 16).unwrap().unwrap();
    assert!(inner.contains(&ptr.as_ptr().addr()));
}

#[test]
fn test_dropping_a_child_returns_its_extent() {
    let system = SystemAllocator::new();
    let heap = HeapAllocator::new_in(&system, 8192).unwrap();
    let free_before = heap.free_bytes();

    {
        let arena = LinearAllocator::new_in(&heap, 1024).unwrap();
        arena.allocate(512, 8).unwrap().unwrap();
        assert_eq!(heap.count(), 1);
        assert!(heap.free_bytes() < free_before);
    }

    assert_eq!(heap.count(), 0);
    assert_eq!(heap.free_bytes(), free_before);
    assert_eq!(heap.fragment_count(), 1);
}

#[test]
fn test_children_come_back_in_any_order() {
    let system = SystemAllocator::new();
    let heap = HeapAllocator::new_in(&system, 16 * 1024).unwrap();

    let a = LinearAllocator::new_in(&heap, 1000).unwrap();
    let b = StackedAllocator::new_in(&heap, 2000).unwrap();
    let c = LinearAllocator::new_in(&heap, 3000).unwrap();
    assert_eq!(heap.count(), 3);

    drop(b);
    drop(a);
    drop(c);
    assert_eq!(heap.count(), 0);
    assert_eq!(heap.max_size(), heap.size());
}

#[test]
fn test_exhausted_owner_refuses_the_child() {
    let system = SystemAllocator::new();
    let small = LinearAllocator::new_in(&system, 128).unwrap();

    let err = HeapAllocator::new_in(&small, 4096).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(small.count(), 0);
}

#[test]
fn test_raw_extent_draw() {
    let system = SystemAllocator::new();
    {
        let extent = Extent::draw_aligned(&system, 300, 64).unwrap();
        assert_eq!(extent.begin_addr() % 64, 0);
        assert_eq!(extent.len(), 300);
        assert!(extent.owner().unwrap().is_equal(&system));
        assert_eq!(system.count(), 1);
    }
    assert_eq!(system.count(), 0);
}

#[test]
fn test_stats_of_every_strategy() {
    let system = SystemAllocator::new();
    let heap = HeapAllocator::new_in(&system, 4096).unwrap();
    let stack = StackedAllocator::new_in(&heap, 1024).unwrap();
    let arena = LinearAllocator::new_in(&heap, 1024).unwrap();

    arena.allocate(10, 1).unwrap().unwrap();
    let names: Vec<_> = [&system as &dyn Allocator, &heap, &stack, &arena]
        .iter()
        .map(|a| a.stats())
        .map(|stats| (stats.name, stats.count))
        .collect();

    assert_eq!(
        names,
        [("system", 1), ("heap", 2), ("stacked", 0), ("linear", 1)]
    );
}
