//! CRUD operations (insert / upsert / get / delete / count / list)
//!
//! Every write goes to the pending buffer first. The write that pushes the
//! buffer past `buffer_size` flushes it synchronously before returning.

use crate::config::Metric;
use crate::database::core::VectorDB;
use crate::distance::l2_norm;
use crate::index::PendingRecord;
use crate::types::VectorId;
use crate::{IndexError, Result};
use std::sync::atomic::Ordering;
use tracing::{debug, warn};

impl VectorDB {
    /// Insert or overwrite one vector.
    ///
    /// Re-inserting an existing id is an upsert: the old record becomes a
    /// tombstone at the next flush and is no longer returned.
    pub fn insert(
        &self,
        id: impl Into<VectorId>,
        vector: Vec<f32>,
        metadata: Vec<u8>,
    ) -> Result<()> {
        let _writer = self.writer.lock();
        self.admit(PendingRecord {
            id: id.into(),
            vector,
            metadata,
        })?;
        self.after_write(1)
    }

    /// Bulk insert from parallel arrays.
    ///
    /// Returns one flag per record. Malformed records are rejected without
    /// aborting the batch; a duplicate id inside the batch keeps the last
    /// occurrence. `metadata` may be empty (no metadata for any record).
    pub fn insert_batch(
        &self,
        ids: Vec<VectorId>,
        vectors: Vec<Vec<f32>>,
        metadata: Vec<Vec<u8>>,
    ) -> Result<Vec<bool>> {
        if ids.len() != vectors.len() || (!metadata.is_empty() && metadata.len() != ids.len()) {
            return Err(IndexError::InvalidArgument(format!(
                "batch arrays differ in length: {} ids, {} vectors, {} metadata",
                ids.len(),
                vectors.len(),
                metadata.len()
            )));
        }

        let _writer = self.writer.lock();
        let mut metadata = metadata.into_iter();
        let mut accepted = Vec::with_capacity(ids.len());
        for (id, vector) in ids.into_iter().zip(vectors) {
            let record = PendingRecord {
                id,
                vector,
                metadata: metadata.next().unwrap_or_default(),
            };
            match self.admit(record) {
                Ok(()) => accepted.push(true),
                Err(e) if e.is_per_record() => accepted.push(false),
                Err(e) => return Err(e),
            }
        }

        let admitted = accepted.iter().filter(|&&ok| ok).count();
        self.after_write(admitted)?;
        Ok(accepted)
    }

    /// Alias of `insert`
    pub fn upsert(
        &self,
        id: impl Into<VectorId>,
        vector: Vec<f32>,
        metadata: Vec<u8>,
    ) -> Result<()> {
        self.insert(id, vector, metadata)
    }

    /// Alias of `insert_batch`
    pub fn upsert_batch(
        &self,
        ids: Vec<VectorId>,
        vectors: Vec<Vec<f32>>,
        metadata: Vec<Vec<u8>>,
    ) -> Result<Vec<bool>> {
        self.insert_batch(ids, vectors, metadata)
    }

    /// Validate one record and stage it in the buffer. Caller holds `writer`.
    fn admit(&self, record: PendingRecord) -> Result<()> {
        if let Err(e) = self.validate_record(&record) {
            debug!(id = %record.id, error = %e, "record rejected");
            return Err(e);
        }
        self.buffer.write().push(record);
        Ok(())
    }

    fn validate_record(&self, record: &PendingRecord) -> Result<()> {
        if record.id.is_empty() {
            return Err(IndexError::InvalidVector("id must not be empty".into()));
        }
        if record.vector.is_empty() {
            return Err(IndexError::InvalidVector("vector must not be empty".into()));
        }
        if let Some(pos) = record.vector.iter().position(|v| !v.is_finite()) {
            return Err(IndexError::InvalidVector(format!(
                "component {} of '{}' is not finite",
                pos, record.id
            )));
        }
        // Finite components can still overflow the norm (e.g. [1e20; 4]);
        // the store would refuse such a record at flush time
        let norm = l2_norm(&record.vector);
        if !norm.is_finite() {
            return Err(IndexError::InvalidVector(format!(
                "norm of '{}' overflows f32",
                record.id
            )));
        }
        let config = self.config.read();
        if config.metric == Metric::Cosine && norm == 0.0 {
            return Err(IndexError::InvalidVector(format!(
                "'{}' is a zero vector, which has no cosine direction",
                record.id
            )));
        }

        let dimension = self.core.read().dimension;
        match dimension {
            Some(expected) if expected != record.vector.len() => {
                Err(IndexError::DimensionMismatch {
                    expected,
                    actual: record.vector.len(),
                })
            }
            Some(_) => Ok(()),
            None => {
                self.core.write().establish(record.vector.len(), &config);
                Ok(())
            }
        }
    }

    /// Flush on overflow, then count toward the auto-checkpoint. Caller holds `writer`.
    fn after_write(&self, admitted: usize) -> Result<()> {
        if self.buffer.read().should_flush() {
            self.flush_locked()?;
        }

        let every = self.config.read().auto_checkpoint_every;
        let Some(every) = every else {
            return Ok(());
        };
        let pending = self
            .inserts_since_checkpoint
            .fetch_add(admitted, Ordering::Relaxed)
            + admitted;
        if pending >= every {
            let dir = self.config.read().data_dir.clone();
            if let Some(dir) = dir {
                // A failed auto checkpoint leaves the in-memory write in place
                if let Err(e) = self.checkpoint_locked(&dir) {
                    warn!(dir = %dir.display(), error = %e, "auto checkpoint failed");
                }
            }
        }
        Ok(())
    }

    /// Original (non-normalized) vector and metadata of a live id
    pub fn get(&self, id: &str) -> Option<(Vec<f32>, Vec<u8>)> {
        let core = self.core.read();
        let buffer = self.buffer.read();
        if let Some(record) = buffer.get(id) {
            return Some((record.vector.clone(), record.metadata.clone()));
        }
        let slot = core.segments.resolve(id)?;
        Some((
            core.store.raw(slot).to_vec(),
            core.store.metadata(slot).to_vec(),
        ))
    }

    pub fn exists(&self, id: &str) -> bool {
        let core = self.core.read();
        let buffer = self.buffer.read();
        buffer.contains(id) || core.segments.contains(id)
    }

    /// Tombstone an id; returns whether it was live
    pub fn delete(&self, id: &str) -> Result<bool> {
        let _writer = self.writer.lock();
        Ok(self.delete_locked(id))
    }

    pub fn delete_batch(&self, ids: &[&str]) -> Result<Vec<bool>> {
        let _writer = self.writer.lock();
        Ok(ids.iter().map(|id| self.delete_locked(id)).collect())
    }

    fn delete_locked(&self, id: &str) -> bool {
        let mut core = self.core.write();
        let mut buffer = self.buffer.write();
        let pending = buffer.remove(id).is_some();
        let flushed = core.segments.tombstone(id).is_some();
        pending || flushed
    }

    /// Distinct live ids, pending buffer included
    pub fn count(&self) -> usize {
        let core = self.core.read();
        let buffer = self.buffer.read();
        core.segments.count()
            + buffer
                .ids()
                .filter(|id| !core.segments.contains(id))
                .count()
    }

    /// Live ids in sorted order, paged
    pub fn list_ids(&self, limit: usize, offset: usize) -> Vec<VectorId> {
        let core = self.core.read();
        let buffer = self.buffer.read();
        let mut ids: Vec<&VectorId> = core.segments.ids().collect();
        ids.extend(buffer.ids().filter(|id| !core.segments.contains(id)));
        ids.sort_unstable();
        ids.into_iter().skip(offset).take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::IndexConfig;
    use crate::database::VectorDB;
    use crate::IndexError;

    fn db() -> VectorDB {
        VectorDB::new(IndexConfig::for_testing()).unwrap()
    }

    #[test]
    fn test_insert_and_get_returns_original_vector() {
        let db = db();
        db.insert("a", vec![3.0, 4.0], b"meta".to_vec()).unwrap();
        let (vector, metadata) = db.get("a").unwrap();
        assert_eq!(vector, vec![3.0, 4.0]);
        assert_eq!(metadata, b"meta");
        assert!(db.get("missing").is_none());
    }

    #[test]
    fn test_insert_rejects_malformed() {
        let db = db();
        assert!(matches!(
            db.insert("", vec![1.0], Vec::new()),
            Err(IndexError::InvalidVector(_))
        ));
        assert!(matches!(
            db.insert("nan", vec![f32::NAN, 1.0], Vec::new()),
            Err(IndexError::InvalidVector(_))
        ));
        assert!(matches!(
            db.insert("zero", vec![0.0, 0.0], Vec::new()),
            Err(IndexError::InvalidVector(_))
        ));
        // Rejected records do not fix the dimension
        assert_eq!(db.dimension(), None);

        db.insert("ok", vec![1.0, 0.0], Vec::new()).unwrap();
        assert!(matches!(
            db.insert("short", vec![1.0], Vec::new()),
            Err(IndexError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_batch_reports_per_record() {
        let db = db();
        let flags = db
            .insert_batch(
                vec!["a".into(), "b".into(), "c".into(), "a".into()],
                vec![
                    vec![1.0, 0.0],
                    vec![1.0, 0.0, 0.0],
                    vec![f32::INFINITY, 0.0],
                    vec![0.0, 1.0],
                ],
                Vec::new(),
            )
            .unwrap();
        assert_eq!(flags, vec![true, false, false, true]);
        assert_eq!(db.count(), 1);
        // Last occurrence wins
        assert_eq!(db.get("a").unwrap().0, vec![0.0, 1.0]);
    }

    #[test]
    fn test_overflowing_norm_rejected_at_insert() {
        let db = db();
        assert!(matches!(
            db.insert("huge", vec![1e20; 4], Vec::new()),
            Err(IndexError::InvalidVector(_))
        ));
        assert_eq!(db.dimension(), None);

        db.insert("ok", vec![1.0, 0.0, 0.0, 0.0], Vec::new()).unwrap();
        let flags = db
            .insert_batch(
                vec!["huge".into(), "fine".into()],
                vec![vec![1e20; 4], vec![0.0, 1.0, 0.0, 0.0]],
                Vec::new(),
            )
            .unwrap();
        assert_eq!(flags, vec![false, true]);

        // Nothing bad is left behind to block later flushes
        assert_eq!(db.flush().unwrap(), 2);
        assert_eq!(db.count(), 2);
        assert!(!db.exists("huge"));
        assert_eq!(db.stats().buffer_count, 0);
    }

    #[test]
    fn test_batch_length_mismatch() {
        let db = db();
        assert!(matches!(
            db.insert_batch(vec!["a".into()], Vec::new(), Vec::new()),
            Err(IndexError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_upsert_across_flush() {
        let db = db();
        db.insert("a", vec![1.0, 0.0], b"v1".to_vec()).unwrap();
        db.flush().unwrap();
        db.upsert("a", vec![0.0, 1.0], b"v2".to_vec()).unwrap();

        assert_eq!(db.count(), 1);
        assert_eq!(db.get("a").unwrap(), (vec![0.0, 1.0], b"v2".to_vec()));
        db.flush().unwrap();
        assert_eq!(db.count(), 1);
        assert_eq!(db.get("a").unwrap().1, b"v2");
    }

    #[test]
    fn test_delete_pending_and_flushed() {
        let db = db();
        db.insert("flushed", vec![1.0, 0.0], Vec::new()).unwrap();
        db.flush().unwrap();
        db.insert("pending", vec![0.0, 1.0], Vec::new()).unwrap();

        assert!(db.delete("flushed").unwrap());
        assert!(db.delete("pending").unwrap());
        assert!(!db.delete("flushed").unwrap());
        assert_eq!(db.count(), 0);
        assert!(!db.exists("flushed"));
        assert_eq!(
            db.delete_batch(&["pending", "nope"]).unwrap(),
            vec![false, false]
        );
    }

    #[test]
    fn test_list_ids_sorted_and_paged() {
        let db = db();
        for id in ["d", "b", "a", "c"] {
            db.insert(id, vec![1.0, 1.0], Vec::new()).unwrap();
        }
        db.flush().unwrap();
        db.insert("e", vec![1.0, 2.0], Vec::new()).unwrap();

        assert_eq!(db.list_ids(10, 0), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(db.list_ids(2, 1), vec!["b", "c"]);
        assert!(db.list_ids(5, 10).is_empty());
    }
}
