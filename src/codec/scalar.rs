//! Scalar Quantization (SQ8) - 8-bit integer quantization
//!
//! Each vector is scaled by its own min/max into u8 codes:
//! - Compression: ~4x (4 bytes → 1 byte per dimension, plus 8 bytes of min/max)
//! - Training: zero (only per-vector min/max statistics)
//!
//! Formula:
//!   code = round((value - min) / (max - min) * 255)
//!   value ≈ min + code * scale,  scale = (max - min) / 255
//!
//! Distances are computed on the codes without decompressing. For two
//! encoded vectors the inner product expands into an integer dot plus
//! correction terms:
//!
//! ```text
//! Σ (ma + sa·ca)(mb + sb·cb)
//!   = sa·sb·Σ ca·cb + sa·mb·Σ ca + ma·sb·Σ cb + d·ma·mb
//! ```

use super::VectorCodec;
use crate::config::Metric;
use crate::{IndexError, Result};

/// Header bytes in front of the codes: min (f32) + max (f32)
const HEADER_LEN: usize = 8;

/// SQ8 codec (per-vector min/max scaling)
#[derive(Debug, Clone)]
pub struct ScalarCodec {
    dimension: usize,
}

/// Borrowed view of one encoded vector
#[derive(Debug, Clone, Copy)]
pub struct ScalarCode<'a> {
    pub min: f32,
    pub scale: f32,
    pub codes: &'a [u8],
}

impl<'a> ScalarCode<'a> {
    /// Parse `[min][max][codes]`; the caller guarantees the length.
    #[inline]
    pub fn parse(bytes: &'a [u8]) -> Self {
        let min = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let max = f32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Self {
            min,
            scale: (max - min) / 255.0,
            codes: &bytes[HEADER_LEN..],
        }
    }

    #[inline]
    fn code_sum(&self) -> u32 {
        self.codes.iter().map(|&c| c as u32).sum()
    }

    /// Squared norm of the reconstructed vector
    fn norm_squared(&self) -> f32 {
        let d = self.codes.len() as f32;
        let sum = self.code_sum() as f32;
        let sum_sq: u32 = self.codes.iter().map(|&c| c as u32 * c as u32).sum();
        d * self.min * self.min
            + 2.0 * self.min * self.scale * sum
            + self.scale * self.scale * sum_sq as f32
    }
}

impl ScalarCodec {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Reconstruct an approximate f32 vector
    #[cfg(test)]
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        self.check_len(bytes)?;
        let code = ScalarCode::parse(bytes);
        Ok(code
            .codes
            .iter()
            .map(|&c| code.min + c as f32 * code.scale)
            .collect())
    }

    /// Asymmetric distance: f32 query against an encoded vector.
    ///
    /// `query_sum` is Σq, precomputed once per query.
    #[inline]
    pub fn query_distance(&self, query: &[f32], query_sum: f32, bytes: &[u8], metric: Metric) -> f32 {
        let code = ScalarCode::parse(bytes);
        match metric {
            Metric::Cosine => {
                let mut weighted = 0.0f32;
                for (q, &c) in query.iter().zip(code.codes.iter()) {
                    weighted += q * c as f32;
                }
                1.0 - (code.min * query_sum + code.scale * weighted)
            }
            Metric::Euclidean => {
                let mut sum = 0.0f32;
                for (q, &c) in query.iter().zip(code.codes.iter()) {
                    let diff = q - (code.min + c as f32 * code.scale);
                    sum += diff * diff;
                }
                sum
            }
        }
    }

    #[cfg(test)]
    fn check_len(&self, bytes: &[u8]) -> Result<()> {
        if bytes.len() != self.code_len() {
            return Err(IndexError::InvalidArgument(format!(
                "Invalid quantized vector size: expected {}, got {}",
                self.code_len(),
                bytes.len()
            )));
        }
        Ok(())
    }

    /// Inner product of two encoded vectors via the correction terms
    fn encoded_dot(&self, a: &ScalarCode<'_>, b: &ScalarCode<'_>) -> f32 {
        let d = self.dimension as f32;
        let cross: u32 = a
            .codes
            .iter()
            .zip(b.codes.iter())
            .map(|(&x, &y)| x as u32 * y as u32)
            .sum();
        a.scale * b.scale * cross as f32
            + a.scale * b.min * a.code_sum() as f32
            + a.min * b.scale * b.code_sum() as f32
            + d * a.min * b.min
    }
}

impl VectorCodec for ScalarCodec {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn code_len(&self) -> usize {
        self.dimension + HEADER_LEN
    }

    fn encode_into(&self, vector: &[f32], out: &mut Vec<u8>) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &val in vector {
            min = min.min(val);
            max = max.max(val);
        }

        out.extend_from_slice(&min.to_le_bytes());
        out.extend_from_slice(&max.to_le_bytes());

        let range = max - min;
        if range < 1e-8 {
            // Constant vector: every value equals min
            out.extend(std::iter::repeat(0u8).take(self.dimension));
        } else {
            let scale = 255.0 / range;
            out.extend(
                vector
                    .iter()
                    .map(|&val| ((val - min) * scale).round().clamp(0.0, 255.0) as u8),
            );
        }
        Ok(())
    }

    fn distance(&self, a: &[u8], b: &[u8], metric: Metric) -> f32 {
        let a = ScalarCode::parse(a);
        let b = ScalarCode::parse(b);
        let dot = self.encoded_dot(&a, &b);
        match metric {
            Metric::Cosine => 1.0 - dot,
            Metric::Euclidean => (a.norm_squared() + b.norm_squared() - 2.0 * dot).max(0.0),
        }
    }
}
