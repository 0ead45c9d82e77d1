//! Core value types shared across the index

use crate::codec::Quantization;
use serde::{Deserialize, Serialize};

/// Caller-supplied unique key of a vector
pub type VectorId = String;

/// Arena index of a stored record. Graph nodes refer to records only by slot.
pub type Slot = u32;

/// One ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: VectorId,
    /// Similarity, higher is closer (cosine similarity or 1/(1+L2))
    pub score: f32,
}

impl SearchResult {
    pub fn new(id: impl Into<VectorId>, score: f32) -> Self {
        Self { id: id.into(), score }
    }
}

/// Memory and count statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    /// Distinct live ids, pending buffer included
    pub vector_count: usize,
    pub buffer_count: usize,
    /// Nodes currently present in the graph (tombstoned routers included)
    pub graph_count: usize,
    pub vectors_mb: f64,
    pub graph_mb: f64,
    pub metadata_mb: f64,
    pub segment_count: usize,
    pub flush_count: u64,
    pub tombstone_count: usize,
    pub dimension: Option<usize>,
    pub quantization: Quantization,
}

impl IndexStats {
    pub fn total_mb(&self) -> f64 {
        self.vectors_mb + self.graph_mb + self.metadata_mb
    }
}

/// Health report used by monitoring callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub vector_count: usize,
    pub segment_count: usize,
    /// Graph nodes not reachable from any entry point (0 when healthy)
    pub unreachable_nodes: usize,
}

pub(crate) const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub(crate) fn bytes_to_mb(bytes: usize) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_total() {
        let stats = IndexStats {
            vectors_mb: 1.5,
            graph_mb: 0.25,
            metadata_mb: 0.25,
            ..Default::default()
        };
        assert!((stats.total_mb() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_bytes_to_mb() {
        assert!((bytes_to_mb(1024 * 1024) - 1.0).abs() < 1e-12);
        assert_eq!(bytes_to_mb(0), 0.0);
    }
}
