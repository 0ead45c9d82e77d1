//! Every inserted vector finds itself as the top hit

use motevec::{IndexConfig, Metric, Quantization, VectorDB};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DIM: usize = 32;
const COUNT: usize = 300;

fn dataset(seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..COUNT)
        .map(|_| (0..DIM).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
        .collect()
}

fn build(config: IndexConfig, data: &[Vec<f32>]) -> VectorDB {
    let db = VectorDB::new(config).unwrap();
    let ids = (0..data.len()).map(|i| format!("vec-{}", i)).collect();
    let flags = db.insert_batch(ids, data.to_vec(), Vec::new()).unwrap();
    assert!(flags.iter().all(|&ok| ok));
    db.flush().unwrap();
    db
}

/// Fraction of vectors returned as their own top-1 with similarity >= min_score
fn self_hit_rate(db: &VectorDB, data: &[Vec<f32>], min_score: f32) -> f64 {
    let mut hits = 0;
    for (i, v) in data.iter().enumerate() {
        let results = db.search(v, 1, Some(64)).unwrap();
        if results[0].id == format!("vec-{}", i) && results[0].score >= min_score {
            hits += 1;
        }
    }
    hits as f64 / data.len() as f64
}

#[test]
fn test_self_retrieval_full_precision() {
    let data = dataset(1);
    let db = build(IndexConfig::for_testing(), &data);
    db.check_connectivity().unwrap();
    assert_eq!(self_hit_rate(&db, &data, 0.999), 1.0);
}

#[test]
fn test_self_retrieval_scalar() {
    let data = dataset(2);
    let config = IndexConfig::for_testing().with_quantization(Quantization::Scalar);
    let db = build(config, &data);
    // Re-ranking restores exact scores
    assert_eq!(self_hit_rate(&db, &data, 0.999), 1.0);
}

#[test]
fn test_self_retrieval_binary() {
    let data = dataset(3);
    let config = IndexConfig::for_testing().with_quantization(Quantization::Binary);
    let db = build(config, &data);
    assert!(self_hit_rate(&db, &data, 0.999) >= 0.95);
}

#[test]
fn test_self_retrieval_euclidean() {
    let data = dataset(4);
    let config = IndexConfig::for_testing().with_metric(Metric::Euclidean);
    let db = build(config, &data);
    // Distance zero maps to score 1.0
    assert_eq!(self_hit_rate(&db, &data, 0.999), 1.0);
}

#[test]
fn test_self_retrieval_across_many_flushes() {
    let data = dataset(5);
    let db = VectorDB::new(IndexConfig::for_testing()).unwrap();
    for (i, v) in data.iter().enumerate() {
        db.insert(format!("vec-{}", i), v.clone(), Vec::new()).unwrap();
    }
    // 300 single inserts with buffer_size 64: four automatic flushes
    let stats = db.stats();
    assert_eq!(stats.flush_count, 4);
    assert_eq!(stats.vector_count, COUNT);
    db.check_connectivity().unwrap();
    assert_eq!(self_hit_rate(&db, &data, 0.999), 1.0);
}
