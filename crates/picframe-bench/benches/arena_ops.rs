//! Criterion micro-benchmarks for frame allocation and gap filling.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use picframe_arena::SlabAllocator;
use picframe_core::{Coord3, SuperCellId};
use picframe_particles::{ParticleBox, ParticleBuffer};
use picframe_test_utils::{nbody_buffer, scatter_uniform};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// 32x32x16 cells in 8x8x4 supercells, 64-slot frames, 16K particles.
fn scattered_buffer() -> ParticleBuffer {
    let (buffer, keys) = nbody_buffer(Coord3::new(32, 32, 16), Coord3::new(8, 8, 4), 4096, 64);
    scatter_uniform(buffer.particle_box(), keys, 16_384, Coord3::ZERO, 7).unwrap();
    buffer.particle_box().fill_all_gaps().unwrap();
    buffer
}

/// Kill roughly `fraction` of the live particles.
fn punch_holes(pbox: ParticleBox<'_>, fraction: f64, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for i in 0..pbox.mapping().supercell_count() as u32 {
        for frame in pbox.frames(SuperCellId(i)) {
            for slot in (0..frame.slots()).filter(|&s| frame.is_live(s)) {
                if rng.random_bool(fraction) {
                    pbox.remove(frame, slot);
                }
            }
        }
    }
}

/// Benchmark: allocate every frame of a 4096-frame slab, then free them.
fn bench_slab_cycle(c: &mut Criterion) {
    let slab = SlabAllocator::new(4096);
    c.bench_function("slab_alloc_free_4096", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..4096).filter_map(|_| slab.allocate()).collect();
            for h in handles {
                slab.free(black_box(h)).unwrap();
            }
        });
    });
}

/// Benchmark: gap fill after removing 10% of 16K particles.
fn bench_gap_fill_sparse(c: &mut Criterion) {
    c.bench_function("gap_fill_16k_10pct", |b| {
        b.iter_batched(
            || {
                let buffer = scattered_buffer();
                punch_holes(buffer.particle_box(), 0.1, 11);
                buffer
            },
            |buffer| black_box(buffer.particle_box().fill_all_gaps().unwrap()),
            BatchSize::LargeInput,
        );
    });
}

/// Benchmark: gap fill after removing half of 16K particles.
fn bench_gap_fill_dense(c: &mut Criterion) {
    c.bench_function("gap_fill_16k_50pct", |b| {
        b.iter_batched(
            || {
                let buffer = scattered_buffer();
                punch_holes(buffer.particle_box(), 0.5, 13);
                buffer
            },
            |buffer| black_box(buffer.particle_box().fill_all_gaps().unwrap()),
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_slab_cycle,
    bench_gap_fill_sparse,
    bench_gap_fill_dense
);
criterion_main!(benches);
