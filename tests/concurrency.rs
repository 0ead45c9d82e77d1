//! Readers run alongside a writer that inserts, flushes and merges

use motevec::{IndexConfig, VectorDB};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

const DIM: usize = 12;

fn random_vector(rng: &mut StdRng) -> Vec<f32> {
    (0..DIM).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

#[test]
fn test_concurrent_search_during_writes() {
    let db = Arc::new(VectorDB::new(IndexConfig::for_testing()).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let db = Arc::clone(&db);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(41);
            for i in 0..500 {
                db.insert(format!("w{}", i), random_vector(&mut rng), Vec::new())
                    .unwrap();
                if i % 7 == 0 && i > 0 {
                    db.delete(&format!("w{}", i - 1)).unwrap();
                }
                if i % 150 == 149 {
                    db.merge_segments().unwrap();
                }
            }
            db.flush().unwrap();
            done.store(true, Ordering::SeqCst);
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|r| {
            let db = Arc::clone(&db);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(100 + r);
                let mut searches = 0usize;
                while !done.load(Ordering::SeqCst) || searches < 10 {
                    let query = random_vector(&mut rng);
                    // Before the first insert this is an empty result
                    let hits = db.search(&query, 5, None).unwrap();
                    assert!(hits.len() <= 5);
                    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
                    searches += 1;
                }
                searches
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        assert!(reader.join().unwrap() >= 10);
    }

    // 500 inserts, one delete for every multiple of 7 in 7..=497
    assert_eq!(db.count(), 500 - 71);
    db.check_connectivity().unwrap();
    assert!(db.health().healthy);
}

#[test]
fn test_concurrent_reads_of_stable_index() {
    let mut rng = StdRng::seed_from_u64(42);
    let data: Vec<Vec<f32>> = (0..200).map(|_| random_vector(&mut rng)).collect();
    let db = VectorDB::new(IndexConfig::for_testing()).unwrap();
    let ids = (0..data.len()).map(|i| format!("s{}", i)).collect();
    db.insert_batch(ids, data.clone(), Vec::new()).unwrap();
    db.flush().unwrap();

    let db = Arc::new(db);
    let data = Arc::new(data);
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let db = Arc::clone(&db);
            let data = Arc::clone(&data);
            thread::spawn(move || {
                for i in (t..data.len()).step_by(4) {
                    let hits = db.search(&data[i], 1, Some(64)).unwrap();
                    assert_eq!(hits[0].id, format!("s{}", i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
