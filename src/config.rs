//! Index configuration
//!
//! Serde-serializable so a checkpoint manifest can record the settings a
//! snapshot was built with.

use crate::codec::Quantization;
use crate::index::vamana::VamanaConfig;
use crate::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upper bound accepted for `k` in a single search
pub const MAX_SEARCH_K: usize = 10_000;

/// Distance metric
///
/// - Cosine: normalized on insert; search uses the unit copy, `get` returns the original
/// - Euclidean: L2 on the original vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// Cosine similarity (default). Zero vectors are rejected.
    Cosine,
    /// L2 distance; score reported as `1 / (1 + distance)`
    Euclidean,
}

impl Default for Metric {
    fn default() -> Self {
        Metric::Cosine
    }
}

impl Metric {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Metric::Cosine => 0,
            Metric::Euclidean => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Metric::Cosine),
            1 => Some(Metric::Euclidean),
            _ => None,
        }
    }

    /// Convert an internal distance (cosine: `1 - dot`, euclidean: squared L2)
    /// into the caller-facing similarity score.
    #[inline]
    pub fn score(self, distance: f32) -> f32 {
        match self {
            Metric::Cosine => (1.0 - distance).clamp(-1.0, 1.0),
            Metric::Euclidean => 1.0 / (1.0 + distance.max(0.0).sqrt()),
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Pending records tolerated before a synchronous flush (default: 10,000)
    ///
    /// The insert that pushes the buffer past this size pays for the flush.
    pub buffer_size: usize,

    /// Search-side encoding, fixed once the index holds vectors
    pub quantization: Quantization,

    pub metric: Metric,

    /// Graph construction and search parameters
    pub vamana: VamanaConfig,

    /// Segments kept before older generations are merged (default: 4)
    pub max_segments: usize,

    /// Checkpoint directory. `VectorDB::open` recovers from it when a
    /// manifest is present.
    pub data_dir: Option<PathBuf>,

    /// Inserts between automatic checkpoints into `data_dir` (None = manual only)
    pub auto_checkpoint_every: Option<usize>,

    /// Quantized search re-ranks `k * rerank_factor` candidates with exact distances
    pub rerank_factor: usize,

    /// Seed for graph initialization and build order
    pub seed: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            buffer_size: 10_000,
            quantization: Quantization::None,
            metric: Metric::Cosine,
            vamana: VamanaConfig::default(),
            max_segments: 4,
            data_dir: None,
            auto_checkpoint_every: None,
            rerank_factor: 4,
            seed: 0x6d6f_7465,
        }
    }
}

impl IndexConfig {
    /// Small-footprint preset for constrained devices
    pub fn embedded(dimension: usize) -> Self {
        Self {
            buffer_size: 5_000,
            vamana: VamanaConfig::embedded(dimension),
            ..Self::default()
        }
    }

    /// Tiny buffer and degree so tests exercise flush and merge paths quickly
    pub fn for_testing() -> Self {
        Self {
            buffer_size: 64,
            vamana: VamanaConfig {
                max_degree: 16,
                search_list_size: 48,
                alpha: 1.2,
                beam_width: 32,
                build_chunk_size: 64,
            },
            max_segments: 3,
            ..Self::default()
        }
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_quantization(mut self, quantization: Quantization) -> Self {
        self.quantization = quantization;
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(IndexError::InvalidArgument(
                "buffer_size must be positive".into(),
            ));
        }
        if self.max_segments == 0 {
            return Err(IndexError::InvalidArgument(
                "max_segments must be positive".into(),
            ));
        }
        if self.rerank_factor == 0 {
            return Err(IndexError::InvalidArgument(
                "rerank_factor must be positive".into(),
            ));
        }
        if self.auto_checkpoint_every == Some(0) {
            return Err(IndexError::InvalidArgument(
                "auto_checkpoint_every must be positive when set".into(),
            ));
        }
        if self.quantization == Quantization::Binary && self.metric != Metric::Cosine {
            return Err(IndexError::InvalidArgument(
                "binary quantization requires the cosine metric".into(),
            ));
        }
        self.vamana.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = IndexConfig::default();
        assert_eq!(config.buffer_size, 10_000);
        assert_eq!(config.metric, Metric::Cosine);
        assert_eq!(config.quantization, Quantization::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        assert!(IndexConfig::for_testing().validate().is_ok());
        let embedded = IndexConfig::embedded(128);
        assert_eq!(embedded.vamana.max_degree, 32);
        assert!(embedded.validate().is_ok());
    }

    #[test]
    fn test_binary_requires_cosine() {
        let config = IndexConfig::default()
            .with_quantization(Quantization::Binary)
            .with_metric(Metric::Euclidean);
        assert!(matches!(
            config.validate(),
            Err(IndexError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let config = IndexConfig::default().with_buffer_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = IndexConfig::for_testing().with_data_dir("/tmp/motevec");
        let json = serde_json::to_string(&config).unwrap();
        let back: IndexConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn test_metric_score() {
        assert!((Metric::Cosine.score(0.0) - 1.0).abs() < 1e-6);
        assert!((Metric::Cosine.score(1.0)).abs() < 1e-6);
        assert!((Metric::Euclidean.score(0.0) - 1.0).abs() < 1e-6);
        // squared distance 9 → L2 3 → 1/4
        assert!((Metric::Euclidean.score(9.0) - 0.25).abs() < 1e-6);
        assert_eq!(Metric::from_tag(Metric::Euclidean.tag()), Some(Metric::Euclidean));
        assert_eq!(Metric::from_tag(7), None);
    }
}
