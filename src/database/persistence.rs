//! Persistence Operations (Flush, Merge, Checkpoint, Recover)
//!
//! # Flush
//! 1. Drain the buffer as one batch
//! 2. Allocate store slots for every record
//! 3. `batch_build` (empty graph) or `batch_insert` (existing graph)
//! 4. Register the batch as a new segment; superseded slots become tombstones
//! 5. Merge when more than `max_segments` segments exist
//!
//! Core and buffer stay write-locked for the whole flush, so readers see
//! either the old state or the new one. Any failure releases the allocated
//! slots and puts the drained records back.
//!
//! # Checkpoint
//! Flushes, then writes vectors / graph / id-map regions and commits them
//! through the manifest (see `crate::manifest`).

use crate::database::core::{Core, VectorDB};
use crate::index::vamana::VamanaGraph;
use crate::index::{PendingRecord, SegmentManager, SegmentManagerState};
use crate::manifest::{CheckpointSummary, RegionKind};
use crate::storage::{CheckpointPayloads, PersistenceManager, VectorStore};
use crate::types::Slot;
use crate::{IndexError, Result};
use ahash::AHashSet;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{info, warn};

impl VectorDB {
    /// Move every pending record into the graph; returns the count moved
    pub fn flush(&self) -> Result<usize> {
        let _writer = self.writer.lock();
        self.flush_locked()
    }

    /// Caller holds `writer`
    pub(crate) fn flush_locked(&self) -> Result<usize> {
        let config = self.config.read().clone();
        let mut core = self.core.write();
        let mut buffer = self.buffer.write();
        if buffer.is_empty() {
            return Ok(0);
        }

        let start = Instant::now();
        let records = buffer.take();
        let count = records.len();
        if let Err(e) = flush_records(&mut core, &records) {
            warn!(error = %e, records = count, "flush failed, buffer restored");
            buffer.restore(records);
            return Err(e);
        }
        drop(buffer);

        core.flush_count += 1;
        if core.segments.segment_count() > config.max_segments {
            merge_core(&mut core);
        }
        repair_if_needed(&mut core);

        info!(
            records = count,
            graph_nodes = core.graph.node_count(),
            segments = core.segments.segment_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "flush done"
        );
        Ok(count)
    }

    /// Fold all segments into one and reclaim tombstoned slots.
    /// Returns the number of reclaimed slots.
    pub fn merge_segments(&self) -> Result<usize> {
        let _writer = self.writer.lock();
        let mut core = self.core.write();
        let reclaimed = merge_core(&mut core);
        repair_if_needed(&mut core);
        Ok(reclaimed)
    }

    /// Flush, then persist the whole index to `path`
    pub fn checkpoint(&self, path: impl AsRef<Path>) -> Result<()> {
        let _writer = self.writer.lock();
        self.checkpoint_locked(path.as_ref())
    }

    /// Caller holds `writer`
    pub(crate) fn checkpoint_locked(&self, path: &Path) -> Result<()> {
        let start = Instant::now();
        self.flush_locked()?;

        let config = self.config.read().clone();
        let (payloads, summary) = {
            let core = self.core.read();
            let idmap = bincode::serialize(&core.segments.to_state())?;
            let payloads = CheckpointPayloads {
                vectors: core.store.to_bytes(),
                graph: core.graph.to_bytes(),
                idmap,
            };
            let summary = CheckpointSummary {
                dimension: core.dimension,
                vector_count: core.segments.count(),
                quantization: config.quantization,
                metric: config.metric,
                vamana: core.graph.config().clone(),
            };
            (payloads, summary)
        };

        let vector_count = summary.vector_count;
        let manifest = PersistenceManager::new(path).write(payloads, summary)?;
        self.inserts_since_checkpoint.store(0, Ordering::Relaxed);

        info!(
            dir = %path.display(),
            version = manifest.version,
            vectors = vector_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "checkpoint committed"
        );
        Ok(())
    }

    /// Replace the index contents with the checkpoint at `path`.
    ///
    /// Everything is parsed and cross-checked before the running state is
    /// touched; on error the index is unchanged. Returns the recovered count.
    pub fn recover(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let _writer = self.writer.lock();
        let start = Instant::now();

        let mapped = PersistenceManager::new(path).read()?;
        let summary = mapped.manifest.summary.clone();
        let mut config = self.config.read().clone();

        let store = VectorStore::from_bytes(mapped.payload(RegionKind::Vectors))?;
        let graph = VamanaGraph::from_bytes(
            mapped.payload(RegionKind::Graph),
            config.vamana.clone(),
            config.seed,
        )?;
        let state: SegmentManagerState = bincode::deserialize(mapped.payload(RegionKind::IdMap))
            .map_err(|e| IndexError::CorruptPersistence(format!("idmap region: {}", e)))?;
        let segments = SegmentManager::from_state(state)?;

        validate_recovered(&store, &graph, &segments, &summary)?;

        // The checkpoint defines the codec and metric of its data
        if config.quantization != store.quantization() || config.metric != store.metric() {
            warn!(
                quantization = ?store.quantization(),
                metric = ?store.metric(),
                "configuration replaced by checkpoint settings"
            );
        }
        config.quantization = store.quantization();
        config.metric = store.metric();
        config.vamana.max_degree = graph.config().max_degree;

        let count = segments.count();
        {
            let mut core = self.core.write();
            let mut buffer = self.buffer.write();
            *core = Core {
                dimension: summary.dimension,
                store,
                graph,
                segments,
                flush_count: 0,
            };
            buffer.clear();
            buffer.set_capacity(config.buffer_size);
            *self.config.write() = config;
        }
        self.inserts_since_checkpoint.store(0, Ordering::Relaxed);

        info!(
            dir = %path.display(),
            version = mapped.manifest.version,
            vectors = count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "recovered from checkpoint"
        );
        Ok(count)
    }
}

fn flush_records(core: &mut Core, records: &[PendingRecord]) -> Result<()> {
    if core.store.remaining_capacity() < records.len() {
        return Err(IndexError::CapacityExceeded(format!(
            "{} records do not fit in {} free slots",
            records.len(),
            core.store.remaining_capacity()
        )));
    }

    let mut slots: Vec<Slot> = Vec::with_capacity(records.len());
    for record in records {
        match core
            .store
            .allocate(record.id.clone(), &record.vector, record.metadata.clone())
        {
            Ok(slot) => slots.push(slot),
            Err(e) => {
                release_all(&mut core.store, &slots);
                return Err(e);
            }
        }
    }

    let Core { store, graph, .. } = &mut *core;
    let built = if graph.is_empty() {
        graph.batch_build(&slots, &*store)
    } else {
        graph.batch_insert(&slots, &*store)
    };
    if let Err(e) = built {
        release_all(store, &slots);
        return Err(e);
    }

    let entries = records
        .iter()
        .map(|r| r.id.clone())
        .zip(slots.iter().copied())
        .collect();
    core.segments.register(entries);
    Ok(())
}

fn release_all(store: &mut VectorStore, slots: &[Slot]) {
    for &slot in slots {
        store.release(slot);
    }
}

/// Fold segments, drop reclaimed slots from the graph and free them
fn merge_core(core: &mut Core) -> usize {
    let start = Instant::now();
    let outcome = core.segments.merge();
    if outcome.reclaimed.is_empty() {
        return 0;
    }

    let removed: AHashSet<Slot> = outcome.reclaimed.iter().copied().collect();
    let rewired = if core.store.quantization().is_quantized() {
        core.graph.consolidate(&removed, &core.store.code_distances())
    } else {
        core.graph.consolidate(&removed, &core.store)
    };
    for &slot in &outcome.reclaimed {
        core.store.release(slot);
    }

    info!(
        merged = outcome.merged,
        reclaimed = removed.len(),
        rewired,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "segments merged"
    );
    removed.len()
}

fn repair_if_needed(core: &mut Core) {
    let unreachable = core.graph.unreachable_nodes().len();
    if unreachable == 0 {
        return;
    }
    let Core { store, graph, .. } = &mut *core;
    let added = graph.repair_connectivity(&*store);
    warn!(unreachable, added, "graph connectivity repaired");
}

/// Cross-region consistency: every id maps to its own slot, every segment
/// slot is stored and present in the graph
fn validate_recovered(
    store: &VectorStore,
    graph: &VamanaGraph,
    segments: &SegmentManager,
    summary: &CheckpointSummary,
) -> Result<()> {
    let corrupt = |msg: String| Err(IndexError::CorruptPersistence(msg));

    if let Some(dim) = summary.dimension {
        if dim != store.dimension() {
            return corrupt(format!(
                "manifest dimension {} but vectors region has {}",
                dim,
                store.dimension()
            ));
        }
    }
    if summary.vector_count != segments.count() {
        return corrupt(format!(
            "manifest lists {} vectors but id map has {}",
            summary.vector_count,
            segments.count()
        ));
    }

    let all_slots = segments.all_slots();
    if all_slots.len() as usize != store.len() || store.len() != graph.node_count() {
        return corrupt(format!(
            "region sizes disagree: {} segment slots, {} stored, {} graph nodes",
            all_slots.len(),
            store.len(),
            graph.node_count()
        ));
    }
    for slot in all_slots.iter() {
        if !store.is_occupied(slot) || !graph.contains(slot) {
            return corrupt(format!("slot {} missing from vectors or graph", slot));
        }
    }
    for id in segments.ids() {
        let slot = segments.resolve(id).unwrap_or(Slot::MAX);
        if store.id(slot) != Some(id.as_str()) {
            return corrupt(format!("id '{}' does not match its stored record", id));
        }
    }
    if !graph.is_empty() && graph.entry_points().is_empty() {
        return corrupt("graph has nodes but no entry point".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::codec::Quantization;
    use crate::config::IndexConfig;
    use crate::database::VectorDB;
    use crate::IndexError;
    use tempfile::TempDir;

    fn vector(i: usize) -> Vec<f32> {
        vec![(i as f32).sin() + 1.5, (i as f32 * 0.7).cos(), i as f32 * 0.01]
    }

    #[test]
    fn test_flush_moves_buffer_into_graph() {
        let db = VectorDB::new(IndexConfig::for_testing()).unwrap();
        for i in 0..20 {
            db.insert(format!("v{}", i), vector(i), Vec::new()).unwrap();
        }
        assert_eq!(db.flush().unwrap(), 20);
        assert_eq!(db.flush().unwrap(), 0);

        let stats = db.stats();
        assert_eq!(stats.buffer_count, 0);
        assert_eq!(stats.graph_count, 20);
        assert_eq!(stats.flush_count, 1);
        db.check_connectivity().unwrap();
    }

    #[test]
    fn test_merge_reclaims_tombstones() {
        let db = VectorDB::new(IndexConfig::for_testing()).unwrap();
        for i in 0..30 {
            db.insert(format!("v{}", i), vector(i), Vec::new()).unwrap();
        }
        db.flush().unwrap();
        for i in 0..10 {
            db.delete(&format!("v{}", i)).unwrap();
        }
        assert_eq!(db.stats().tombstone_count, 10);

        assert_eq!(db.merge_segments().unwrap(), 10);
        let stats = db.stats();
        assert_eq!(stats.tombstone_count, 0);
        assert_eq!(stats.graph_count, 20);
        assert_eq!(db.count(), 20);
        db.check_connectivity().unwrap();

        // Freed slots are reused
        for i in 30..35 {
            db.insert(format!("v{}", i), vector(i), Vec::new()).unwrap();
        }
        db.flush().unwrap();
        assert_eq!(db.count(), 25);
        db.check_connectivity().unwrap();
    }

    #[test]
    fn test_merge_under_quantization_keeps_graph_usable() {
        for quantization in [Quantization::Scalar, Quantization::Binary] {
            let config = IndexConfig::for_testing().with_quantization(quantization);
            let db = VectorDB::new(config).unwrap();
            for i in 0..40 {
                db.insert(format!("v{}", i), vector(i), Vec::new()).unwrap();
            }
            db.flush().unwrap();
            for i in (0..40).step_by(3) {
                db.delete(&format!("v{}", i)).unwrap();
            }

            assert_eq!(db.merge_segments().unwrap(), 14);
            assert_eq!(db.count(), 26);
            db.check_connectivity().unwrap();
            let hits = db.search(&vector(1), 5, None).unwrap();
            assert_eq!(hits.len(), 5);
            if quantization == Quantization::Scalar {
                assert_eq!(hits[0].id, "v1");
            }
        }
    }

    #[test]
    fn test_checkpoint_and_recover() {
        let temp = TempDir::new().unwrap();
        let db = VectorDB::new(IndexConfig::for_testing()).unwrap();
        for i in 0..40 {
            db.insert(format!("v{}", i), vector(i), vec![i as u8]).unwrap();
        }
        db.delete("v3").unwrap();
        db.checkpoint(temp.path()).unwrap();

        let restored = VectorDB::new(IndexConfig::for_testing()).unwrap();
        assert_eq!(restored.recover(temp.path()).unwrap(), 39);
        assert_eq!(restored.count(), 39);
        assert_eq!(restored.get("v7").unwrap(), (vector(7), vec![7]));
        assert!(restored.get("v3").is_none());
        restored.check_connectivity().unwrap();
    }

    #[test]
    fn test_recover_missing_checkpoint() {
        let temp = TempDir::new().unwrap();
        let db = VectorDB::new(IndexConfig::for_testing()).unwrap();
        assert!(matches!(
            db.recover(temp.path()),
            Err(IndexError::NotFound(_))
        ));
    }

    #[test]
    fn test_auto_checkpoint() {
        let temp = TempDir::new().unwrap();
        let mut config = IndexConfig::for_testing().with_data_dir(temp.path());
        config.auto_checkpoint_every = Some(10);
        let db = VectorDB::open(config.clone()).unwrap();
        for i in 0..10 {
            db.insert(format!("v{}", i), vector(i), Vec::new()).unwrap();
        }
        drop(db);

        let reopened = VectorDB::open(config).unwrap();
        assert_eq!(reopened.count(), 10);
    }
}
