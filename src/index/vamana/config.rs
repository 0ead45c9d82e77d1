//! Vamana configuration parameters

use serde::{Deserialize, Serialize};

/// Vamana graph configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VamanaConfig {
    /// Maximum degree (R parameter) - max neighbors per node
    pub max_degree: usize,

    /// Search list size during construction (L parameter)
    pub search_list_size: usize,

    /// Alpha parameter for pruning (typically 1.2)
    pub alpha: f32,

    /// Minimum beam width for queries when the caller gives none
    pub beam_width: usize,

    /// Nodes processed per parallel construction round
    pub build_chunk_size: usize,
}

impl Default for VamanaConfig {
    fn default() -> Self {
        Self {
            max_degree: 64,
            search_list_size: 128,
            alpha: 1.2,
            beam_width: 64,
            build_chunk_size: 1024,
        }
    }
}

impl VamanaConfig {
    /// Create a new configuration
    pub fn new(max_degree: usize, search_list_size: usize, alpha: f32) -> Self {
        Self {
            max_degree,
            search_list_size,
            alpha,
            beam_width: max_degree,
            ..Self::default()
        }
    }

    /// Create configuration optimized for embedded environments
    pub fn embedded(dimension: usize) -> Self {
        // Lower parameters for memory efficiency
        let max_degree = if dimension <= 128 {
            32
        } else if dimension <= 384 {
            48
        } else {
            64
        };

        Self {
            max_degree,
            search_list_size: max_degree * 2,
            alpha: 1.2,
            beam_width: max_degree,
            build_chunk_size: 512,
        }
    }

    /// Create configuration optimized for recall
    pub fn performance(dimension: usize) -> Self {
        let max_degree = if dimension <= 128 {
            64
        } else if dimension <= 384 {
            96
        } else {
            128
        };

        Self {
            max_degree,
            search_list_size: max_degree * 3,
            alpha: 1.2,
            beam_width: max_degree * 2,
            build_chunk_size: 2048,
        }
    }

    /// Beam width used when the caller does not supply one.
    ///
    /// Grows with the number of indexed nodes so larger corpora keep recall.
    pub fn auto_beam_width(&self, k: usize, node_count: usize) -> usize {
        let by_size = match node_count {
            0..=1_000 => 32,
            1_001..=10_000 => 64,
            10_001..=100_000 => 128,
            _ => 200,
        };

        let by_k = if k <= 10 {
            k * 4
        } else if k <= 100 {
            k * 2
        } else {
            k + k / 2
        };

        by_size.max(self.beam_width).max(by_k).max(k)
    }

    pub(crate) fn validate(&self) -> crate::Result<()> {
        if self.max_degree < 2 || self.max_degree > u16::MAX as usize - 1 {
            return Err(crate::IndexError::InvalidArgument(format!(
                "max_degree must be in 2..{}, got {}",
                u16::MAX,
                self.max_degree
            )));
        }
        if self.search_list_size == 0 || self.beam_width == 0 || self.build_chunk_size == 0 {
            return Err(crate::IndexError::InvalidArgument(
                "search_list_size, beam_width and build_chunk_size must be positive".into(),
            ));
        }
        if self.alpha.is_nan() || self.alpha < 1.0 {
            return Err(crate::IndexError::InvalidArgument(format!(
                "alpha must be >= 1.0, got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}
