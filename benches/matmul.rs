//! GEMM implementation comparison.
//!
//! Compares the four built-in implementations and ndarray's `dot` across
//! square sizes.
//!
//! # Usage:
//! ```bash
//! cargo bench --bench matmul
//!
//! # One size only
//! cargo bench --bench matmul -- gemm_256x256x256
//! ```

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::Array2;
use rand::prelude::*;

use tilegemm::bench::AlignedMatrix;
use tilegemm::{run, BlockConfig};

fn create_ndarray_matrix(rows: usize, cols: usize, rng: &mut StdRng) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |_| rng.random_range(-1.0..1.0))
}

fn bench_gemm_by_size(c: &mut Criterion) {
    let sizes = [128, 256, 512];
    let block = BlockConfig::default();

    for n in sizes {
        let mut group = c.benchmark_group(format!("gemm_{n}x{n}x{n}"));
        group.sample_size(20);
        group.throughput(Throughput::Elements((2 * n * n * n) as u64));

        let mut rng = StdRng::seed_from_u64(42);
        let a = AlignedMatrix::random(n, n, &mut rng).unwrap();
        let b = AlignedMatrix::random(n, n, &mut rng).unwrap();
        let mut out = AlignedMatrix::zeros(n, n).unwrap();

        for name in ["naive", "blocked", "packed", "vectorized"] {
            group.bench_function(BenchmarkId::new(name, n), |bencher| {
                bencher.iter(|| {
                    out.fill_zero();
                    run(name, n, n, n, &a.view(), &b.view(), &mut out.view_mut(), &block).unwrap();
                    black_box(out.as_slice()[0])
                })
            });
        }

        let mut rng = StdRng::seed_from_u64(42);
        let a_nd = create_ndarray_matrix(n, n, &mut rng);
        let b_nd = create_ndarray_matrix(n, n, &mut rng);
        group.bench_function(BenchmarkId::new("ndarray", n), |bencher| {
            bencher.iter(|| black_box(a_nd.dot(&b_nd)))
        });

        group.finish();
    }
}

fn bench_block_sizes(c: &mut Criterion) {
    let n = 512;
    let mut group = c.benchmark_group("vectorized_block_sizes");
    group.sample_size(10);

    let mut rng = StdRng::seed_from_u64(7);
    let a = AlignedMatrix::random(n, n, &mut rng).unwrap();
    let b = AlignedMatrix::random(n, n, &mut rng).unwrap();
    let mut out = AlignedMatrix::zeros(n, n).unwrap();

    for tile in [64, 128, 256] {
        let block = BlockConfig::square(tile).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(tile), &block, |bencher, block| {
            bencher.iter(|| {
                out.fill_zero();
                run("vectorized", n, n, n, &a.view(), &b.view(), &mut out.view_mut(), block).unwrap();
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_gemm_by_size, bench_block_sizes);
criterion_main!(benches);
