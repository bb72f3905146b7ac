//! Criterion benchmarks for universe stepping.
//!
//! Run with:
//!   cargo bench -p life3d
//!   cargo bench -p life3d --features parallel
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use life3d::prelude::*;

fn seeded(size: usize) -> Universe3D {
    let mut u = Universe3D::new(Size3::cube(size), Rule::B6_S567).unwrap();
    // A few gliders spread along the main diagonal keep the lattice busy.
    let glider = patterns::by_name("glider").unwrap();
    let mut at = 1;
    while at + 4 < size as i64 {
        glider.load_into(&mut u, at, at, at);
        at += 6;
    }
    u
}

fn bench_step_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_size");

    for size in [10usize, 16, 32, 64].iter() {
        group.throughput(Throughput::Elements(size.pow(3) as u64));
        group.bench_with_input(BenchmarkId::new("step", size), size, |b, &size| {
            let mut u = seeded(size);
            b.iter(|| {
                u.step();
                black_box(u.population())
            });
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    for size in [16usize, 32, 64].iter() {
        group.bench_with_input(BenchmarkId::new("living_cells", size), size, |b, &size| {
            let u = seeded(size);
            b.iter(|| black_box(u.living_cells().len()));
        });
        group.bench_with_input(BenchmarkId::new("bridge_json", size), size, |b, &size| {
            let mut bridge = Bridge::new();
            bridge.init_universe(size as i64, size as i64, size as i64);
            bridge.load_pattern("glider", 1, 1, 1);
            b.iter(|| black_box(bridge.living_cells()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_step_sizes, bench_snapshot);
criterion_main!(benches);
