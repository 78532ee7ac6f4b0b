//! Dispatch benchmarks
//!
//! - Typed array loads at each chunk width against a plain copy
//! - Runtime planning of one request on every tier

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use kernmem::movement::{AlignedSize, DataMover, LoadRequest, SimulatedEmitter, plan_load};
use kernmem::policy::*;
use kernmem::provenance::{self, MemorySpace};
use kernmem::tier::{HardwareTier, Sm80};

#[repr(C, align(16))]
struct Aligned16<T>(T);

fn benchmark_load_array(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_array");
    let data = Aligned16(std::array::from_fn::<f32, 64, _>(|i| i as f32));
    let _reg = provenance::global()
        .register_slice(&data.0, MemorySpace::Device)
        .expect("benchmark buffer should register");
    let ptr = data.0.as_ptr();
    let mover = DataMover::with_tier(SimulatedEmitter::new(), Sm80);

    group.bench_function("plain_copy", |b| {
        b.iter(|| black_box(data.0));
    });

    group.bench_function(BenchmarkId::new("qualified", 4), |b| {
        b.iter(|| {
            let out: [f32; 64] =
                unsafe { mover.load_array(black_box(ptr), AlignedSize::<4>, ReadOnly, EvictLast, Prefetch256B) };
            mover.emitter().take_emitted();
            black_box(out)
        });
    });

    group.bench_function(BenchmarkId::new("qualified", 16), |b| {
        b.iter(|| {
            let out: [f32; 64] =
                unsafe { mover.load_array(black_box(ptr), AlignedSize::<16>, ReadOnly, EvictLast, Prefetch256B) };
            mover.emitter().take_emitted();
            black_box(out)
        });
    });

    group.bench_function(BenchmarkId::new("plain", 16), |b| {
        b.iter(|| {
            let out: [f32; 64] =
                unsafe { mover.load_array(black_box(ptr), AlignedSize::<16>, ReadWrite, EvictNone, PrefetchNone) };
            black_box(out)
        });
    });

    group.finish();
}

fn benchmark_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_load");
    let req = LoadRequest::of::<f32>()
        .count(64)
        .aligned(16)
        .access(AccessMode::ReadOnly)
        .eviction(EvictionPolicy::Last)
        .prefetch(PrefetchDistance::B256);

    for tier in HardwareTier::DESCENDING {
        group.bench_with_input(BenchmarkId::from_parameter(tier), &tier, |b, &tier| {
            b.iter(|| plan_load(black_box(tier.features()), black_box(&req)));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_load_array, benchmark_plan);
criterion_main!(benches);
