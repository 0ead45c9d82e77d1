//! Top-k similarity search over graph + pending buffer
//!
//! # Process
//! 1. Beam search in the graph (codec distances when quantized)
//! 2. Drop tombstoned slots and ids shadowed by a newer pending record
//! 3. Quantized: re-rank the best `k * rerank_factor` with exact distances
//! 4. Linear scan of the buffer
//! 5. Merge both lists by distance, convert to scores

use crate::config::MAX_SEARCH_K;
use crate::database::core::VectorDB;
use crate::index::vamana::pruner::{sort_by_distance, Candidate};
use crate::types::SearchResult;
use crate::{IndexError, Result};

impl VectorDB {
    /// Approximate top-k search, ordered by descending similarity.
    ///
    /// `beam_width` overrides the automatic beam (`VamanaConfig::auto_beam_width`).
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        beam_width: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        if k == 0 || k > MAX_SEARCH_K {
            return Err(IndexError::InvalidArgument(format!(
                "k must be in 1..={}, got {}",
                MAX_SEARCH_K, k
            )));
        }
        if beam_width == Some(0) {
            return Err(IndexError::InvalidArgument(
                "beam_width must be positive".into(),
            ));
        }
        if query.iter().any(|v| !v.is_finite()) {
            return Err(IndexError::InvalidVector(
                "query has non-finite components".into(),
            ));
        }

        let (rerank_factor, vamana) = {
            let config = self.config.read();
            (config.rerank_factor, config.vamana.clone())
        };

        let core = self.core.read();
        let buffer = self.buffer.read();
        let Some(dimension) = core.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let store = &core.store;
        let segments = &core.segments;
        let metric = store.metric();
        let prepared = store.prepare_query(query)?;

        // (id, distance), closest first
        let mut hits: Vec<(&str, f32)> = Vec::with_capacity(k * 2);

        if !core.graph.is_empty() {
            let quantized = store.quantization().is_quantized();
            let depth = if quantized { k * rerank_factor } else { k };
            let beam = beam_width
                .unwrap_or_else(|| vamana.auto_beam_width(k, core.graph.node_count()))
                .max(depth);

            let is_live = |slot| {
                !segments.is_tombstoned(slot)
                    && store.id(slot).is_some_and(|id| !buffer.contains(id))
            };
            let mut candidates =
                core.graph
                    .search(|slot| store.query_distance(&prepared, slot), beam, is_live);
            candidates.truncate(depth);

            if quantized {
                for c in candidates.iter_mut() {
                    *c = Candidate::new(c.id, store.exact_query_distance(&prepared, c.id));
                }
                sort_by_distance(&mut candidates);
            }

            hits.extend(
                candidates
                    .into_iter()
                    .take(k)
                    .filter_map(|c| store.id(c.id).map(|id| (id, c.distance))),
            );
        }

        for (index, distance) in buffer.scan(&prepared.vector, metric, k) {
            hits.push((buffer.record(index).id.as_str(), distance));
        }

        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits.truncate(k);
        Ok(hits
            .into_iter()
            .map(|(id, distance)| SearchResult::new(id, metric.score(distance)))
            .collect())
    }
}
