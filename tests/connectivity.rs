//! Graph stays navigable through inserts, deletes and merges

use motevec::{IndexConfig, VectorDB};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
        .collect()
}

#[test]
fn test_connected_after_incremental_batches() {
    let data = random_vectors(500, 16, 31);
    let db = VectorDB::new(IndexConfig::for_testing()).unwrap();
    for (round, chunk) in data.chunks(50).enumerate() {
        let ids = (0..chunk.len())
            .map(|i| format!("r{}-{}", round, i))
            .collect();
        db.insert_batch(ids, chunk.to_vec(), Vec::new()).unwrap();
        db.flush().unwrap();
        db.check_connectivity().unwrap();
    }
    let health = db.health();
    assert!(health.healthy);
    assert_eq!(health.vector_count, 500);
    assert_eq!(health.unreachable_nodes, 0);
}

#[test]
fn test_connected_after_heavy_deletes() {
    let data = random_vectors(400, 16, 32);
    let db = VectorDB::new(IndexConfig::for_testing()).unwrap();
    let ids: Vec<String> = (0..data.len()).map(|i| format!("v{}", i)).collect();
    db.insert_batch(ids.clone(), data.clone(), Vec::new()).unwrap();
    db.flush().unwrap();

    // Delete 70% in random order, merging along the way
    let mut order: Vec<usize> = (0..data.len()).collect();
    order.shuffle(&mut StdRng::seed_from_u64(33));
    let (deleted, kept) = order.split_at(280);
    for (n, &i) in deleted.iter().enumerate() {
        assert!(db.delete(&ids[i]).unwrap());
        if n % 70 == 69 {
            db.merge_segments().unwrap();
            db.check_connectivity().unwrap();
        }
    }

    assert_eq!(db.count(), 120);
    assert_eq!(db.stats().graph_count, 120);
    db.check_connectivity().unwrap();

    // Survivors are still found
    let mut found = 0;
    for &i in kept {
        let hits = db.search(&data[i], 1, Some(64)).unwrap();
        if hits[0].id == ids[i] {
            found += 1;
        }
    }
    assert_eq!(found, kept.len());

    // Deleted ids are never returned
    for &i in deleted.iter().take(50) {
        let hits = db.search(&data[i], 10, None).unwrap();
        assert!(hits.iter().all(|h| h.id != ids[i]));
    }
}

#[test]
fn test_delete_everything_then_reinsert() {
    let data = random_vectors(100, 8, 34);
    let db = VectorDB::new(IndexConfig::for_testing()).unwrap();
    let ids: Vec<String> = (0..data.len()).map(|i| format!("v{}", i)).collect();
    db.insert_batch(ids.clone(), data.clone(), Vec::new()).unwrap();
    db.flush().unwrap();

    let refs: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
    assert!(db.delete_batch(&refs).unwrap().iter().all(|&ok| ok));
    assert_eq!(db.merge_segments().unwrap(), 100);
    assert_eq!(db.count(), 0);
    assert_eq!(db.stats().graph_count, 0);
    assert!(db.search(&data[0], 5, None).unwrap().is_empty());

    db.insert_batch(ids, data.clone(), Vec::new()).unwrap();
    db.flush().unwrap();
    db.check_connectivity().unwrap();
    assert_eq!(db.search(&data[17], 1, None).unwrap()[0].id, "v17");
}
