//! Insert / flush / search throughput
//!
//! Run with: `cargo bench --bench index_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use motevec::{IndexConfig, Quantization, VectorDB};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DIM: usize = 128;

fn dataset(n: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..DIM).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
        .collect()
}

fn ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("vec_{}", i)).collect()
}

fn build(config: IndexConfig, data: &[Vec<f32>]) -> VectorDB {
    let db = VectorDB::new(config.with_buffer_size(data.len() + 1)).unwrap();
    db.insert_batch(ids(data.len()), data.to_vec(), Vec::new())
        .unwrap();
    db.flush().unwrap();
    db
}

/// Buffered single inserts, automatic flushes included
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    group.sample_size(10);

    for size in [1_000usize, 5_000] {
        let data = dataset(size, 1);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| {
                let db = VectorDB::new(IndexConfig::default().with_buffer_size(1_000)).unwrap();
                for (i, v) in data.iter().enumerate() {
                    db.insert(format!("vec_{}", i), v.clone(), Vec::new())
                        .unwrap();
                }
                black_box(db.count())
            });
        });
    }

    group.finish();
}

/// Batch build of an empty graph
fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush");
    group.sample_size(10);

    for quantization in [Quantization::None, Quantization::Scalar, Quantization::Binary] {
        let data = dataset(2_000, 2);
        let config = IndexConfig::default().with_quantization(quantization);
        group.throughput(Throughput::Elements(data.len() as u64));
        group.bench_function(format!("{:?}", quantization), |b| {
            b.iter(|| black_box(build(config.clone(), &data).count()));
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    let data = dataset(10_000, 3);
    let queries = dataset(100, 4);

    for quantization in [Quantization::None, Quantization::Scalar, Quantization::Binary] {
        let db = build(IndexConfig::default().with_quantization(quantization), &data);
        for k in [1usize, 10] {
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", quantization), k),
                &k,
                |b, &k| {
                    let mut next = 0;
                    b.iter(|| {
                        let query = &queries[next % queries.len()];
                        next += 1;
                        black_box(db.search(query, k, None).unwrap())
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_flush, bench_search);
criterion_main!(benches);
