//! Allocator benchmarks
//!
//! Compares the strategies on single round trips, batches and heap churn

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use nebula_allocator::allocator::{
    Allocator, HeapAllocator, HeapConfig, LinearAllocator, LinearConfig, PageAllocator,
    StackedAllocator, StackedConfig, SystemAllocator,
};
use std::hint::black_box;

const ARENA: usize = 1024 * 1024;

/// Benchmark single allocation/deallocation cycle
fn bench_single_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_allocation");
    let system = SystemAllocator::new();

    group.bench_function("linear_64b", |b| {
        let allocator = LinearAllocator::with_config_in(&system, ARENA, LinearConfig::production()).unwrap();

        b.iter(|| unsafe {
            let ptr = allocator.allocate(64, 8).unwrap().unwrap();
            black_box(ptr);
            allocator.clear();
        });
    });

    group.bench_function("stacked_64b", |b| {
        let allocator = StackedAllocator::with_config_in(&system, ARENA, StackedConfig::production()).unwrap();

        b.iter(|| unsafe {
            let ptr = allocator.allocate(64, 8).unwrap().unwrap();
            allocator.deallocate(ptr, 64);
            black_box(ptr);
        });
    });

    group.bench_function("heap_64b", |b| {
        let allocator = HeapAllocator::with_config_in(&system, ARENA, HeapConfig::production()).unwrap();

        b.iter(|| unsafe {
            let ptr = allocator.allocate(64, 8).unwrap().unwrap();
            allocator.deallocate(ptr, 64);
            black_box(ptr);
        });
    });

    // Baseline
    group.bench_function("system_64b", |b| {
        b.iter(|| unsafe {
            let ptr = system.allocate(64, 8).unwrap().unwrap();
            system.deallocate(ptr, 64);
            black_box(ptr);
        });
    });

    group.finish();
}

/// Benchmark batch allocations released in LIFO order
fn bench_batch_allocations(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_allocations");
    group.throughput(Throughput::Elements(100));
    let system = SystemAllocator::new();

    group.bench_function("stacked_100x64b", |b| {
        let allocator = StackedAllocator::with_config_in(&system, ARENA, StackedConfig::production()).unwrap();

        b.iter(|| unsafe {
            let mut ptrs = Vec::with_capacity(100);
            for _ in 0..100 {
                ptrs.push(allocator.allocate(64, 8).unwrap().unwrap());
            }
            while let Some(ptr) = ptrs.pop() {
                allocator.deallocate(ptr, 64);
            }
        });
    });

    group.bench_function("heap_100x64b", |b| {
        let allocator = HeapAllocator::with_config_in(&system, ARENA, HeapConfig::production()).unwrap();

        b.iter(|| unsafe {
            let mut ptrs = Vec::with_capacity(100);
            for _ in 0..100 {
                ptrs.push(allocator.allocate(64, 8).unwrap().unwrap());
            }
            while let Some(ptr) = ptrs.pop() {
                allocator.deallocate(ptr, 64);
            }
        });
    });

    group.bench_function("stacked_frame_100x64b", |b| {
        let allocator = StackedAllocator::with_config_in(&system, ARENA, StackedConfig::production()).unwrap();

        b.iter(|| {
            let frame = allocator.frame();
            for _ in 0..100 {
                black_box(frame.allocator().allocate(64, 8).unwrap());
            }
        });
    });

    group.finish();
}

/// Benchmark the heap free list under interleaved frees of varying sizes
fn bench_heap_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("heap_churn");
    let system = SystemAllocator::new();

    for live in [16usize, 64, 256] {
        group.throughput(Throughput::Elements(live as u64));
        group.bench_with_input(BenchmarkId::from_parameter(live), &live, |b, &live| {
            let allocator = HeapAllocator::with_config_in(&system, ARENA, HeapConfig::production()).unwrap();

            b.iter(|| unsafe {
                let blocks: Vec<_> = (0..live)
                    .map(|i| {
                        let size = 16 + (i * 53) % 480;
                        (allocator.allocate(size, 8).unwrap().unwrap(), size)
                    })
                    .collect();
                for (ptr, size) in blocks.iter().step_by(2).chain(blocks.iter().skip(1).step_by(2)) {
                    allocator.deallocate(*ptr, *size);
                }
            });
        });
    }

    group.finish();
}

/// Benchmark whole-page mappings
fn bench_page_mapping(c: &mut Criterion) {
    let mut group = c.benchmark_group("page_mapping");
    let pages = PageAllocator::new();

    for size in [4096usize, 64 * 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| unsafe {
                let ptr = pages.allocate(size, 8).unwrap().unwrap();
                pages.deallocate(ptr, size);
                black_box(ptr);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_allocation,
    bench_batch_allocations,
    bench_heap_churn,
    bench_page_mapping
);
criterion_main!(benches);
