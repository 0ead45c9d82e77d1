//! Write buffer - pending records not yet in the graph
//!
//! Inserts land here first and are linearly scanned at query time.
//! When the buffer grows past its capacity the index flushes it into
//! the graph as one batch.
//!
//! - Insertion order is kept (flush order is deterministic for a seed)
//! - Re-inserting an id overwrites the pending record in place
//! - Removal is O(1) via swap_remove + position map

use crate::config::Metric;
use crate::distance::{dot_product, euclidean_distance_squared, l2_norm};
use crate::index::vamana::pruner::{sort_by_distance, Candidate};
use crate::types::VectorId;
use ahash::AHashMap;

/// A record waiting for the next flush
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRecord {
    pub id: VectorId,
    pub vector: Vec<f32>,
    pub metadata: Vec<u8>,
}

#[derive(Debug)]
pub struct Buffer {
    records: Vec<PendingRecord>,
    positions: AHashMap<VectorId, usize>,
    capacity: usize,
}

impl Buffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            positions: AHashMap::new(),
            capacity,
        }
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Buffer holds more than `capacity` records
    pub fn should_flush(&self) -> bool {
        self.records.len() > self.capacity
    }

    /// Add or overwrite; returns true when an existing pending record was replaced
    pub fn push(&mut self, record: PendingRecord) -> bool {
        match self.positions.get(&record.id) {
            Some(&pos) => {
                self.records[pos] = record;
                true
            }
            None => {
                self.positions.insert(record.id.clone(), self.records.len());
                self.records.push(record);
                false
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<PendingRecord> {
        let pos = self.positions.remove(id)?;
        let record = self.records.swap_remove(pos);
        if let Some(moved) = self.records.get(pos) {
            self.positions.insert(moved.id.clone(), pos);
        }
        Some(record)
    }

    pub fn get(&self, id: &str) -> Option<&PendingRecord> {
        self.positions.get(id).map(|&pos| &self.records[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &VectorId> {
        self.records.iter().map(|r| &r.id)
    }

    /// Drain all records in insertion order
    pub fn take(&mut self) -> Vec<PendingRecord> {
        self.positions.clear();
        std::mem::take(&mut self.records)
    }

    /// Put back records drained by a failed flush.
    ///
    /// Records written to the buffer after the drain win over the restored ones.
    pub fn restore(&mut self, records: Vec<PendingRecord>) {
        let newer = std::mem::take(&mut self.records);
        self.positions.clear();
        for record in records.into_iter().chain(newer) {
            self.push(record);
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.positions.clear();
    }

    /// Approximate heap bytes held by pending records
    pub fn memory_usage(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.vector.len() * 4 + r.metadata.len() + r.id.len() * 2)
            .sum::<usize>()
            + self.records.capacity() * std::mem::size_of::<PendingRecord>()
    }

    /// Exact linear scan for the `k` closest records.
    ///
    /// `query` must be metric-prepared (unit length under cosine).
    /// Returns (record index, distance) closest first; resolve ids with `record`.
    pub fn scan(&self, query: &[f32], metric: Metric, k: usize) -> Vec<(usize, f32)> {
        if k == 0 || self.records.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<Candidate> = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let distance = match metric {
                    Metric::Cosine => {
                        let norm = l2_norm(&r.vector);
                        1.0 - dot_product(query, &r.vector) / norm
                    }
                    Metric::Euclidean => euclidean_distance_squared(query, &r.vector),
                };
                Candidate::new(i as u32, distance)
            })
            .collect();
        sort_by_distance(&mut scored);
        scored.truncate(k);
        scored
            .into_iter()
            .map(|c| (c.id as usize, c.distance))
            .collect()
    }

    pub fn record(&self, index: usize) -> &PendingRecord {
        &self.records[index]
    }
}
