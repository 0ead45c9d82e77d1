//! Statistics and health checks

use crate::database::core::VectorDB;
use crate::types::{bytes_to_mb, HealthStatus, IndexStats};
use crate::Result;

impl VectorDB {
    pub fn stats(&self) -> IndexStats {
        let quantization = self.config.read().quantization;
        let core = self.core.read();
        let buffer = self.buffer.read();

        let (store_vectors, store_metadata) = core.store.memory_usage();
        let vector_count = core.segments.count()
            + buffer
                .ids()
                .filter(|id| !core.segments.contains(id))
                .count();

        IndexStats {
            vector_count,
            buffer_count: buffer.len(),
            graph_count: core.graph.node_count(),
            vectors_mb: bytes_to_mb(store_vectors + buffer.memory_usage()),
            graph_mb: bytes_to_mb(core.graph.memory_usage()),
            metadata_mb: bytes_to_mb(store_metadata + core.segments.memory_usage()),
            segment_count: core.segments.segment_count(),
            flush_count: core.flush_count,
            tombstone_count: core.segments.tombstone_count(),
            dimension: core.dimension,
            quantization,
        }
    }

    /// Internal consistency check: degree bound, no self-loops, every graph
    /// node reachable from an entry point
    pub fn check_connectivity(&self) -> Result<()> {
        self.core.read().graph.check_connectivity()
    }

    pub fn health(&self) -> HealthStatus {
        let core = self.core.read();
        let unreachable_nodes = core.graph.unreachable_nodes().len();
        let healthy = core.graph.check_connectivity().is_ok();
        let vector_count = core.segments.count()
            + self
                .buffer
                .read()
                .ids()
                .filter(|id| !core.segments.contains(id))
                .count();
        HealthStatus {
            healthy,
            vector_count,
            segment_count: core.segments.segment_count(),
            unreachable_nodes,
        }
    }
}
