//! Binary (1-bit) quantization
//!
//! One sign bit per dimension, packed into little-endian u64 words (~32x
//! smaller than f32). For sign-random-projection codes the Hamming distance
//! estimates the angle between the original vectors:
//!
//! ```text
//! θ ≈ π · hamming / d      distance = 1 - cos(θ)
//! ```
//!
//! The estimate is monotonic in Hamming distance, so ranking is preserved
//! up to ties; recall is lower than SQ8 and callers opt in knowingly.

use super::VectorCodec;
use crate::config::Metric;
use crate::{IndexError, Result};
use std::f32::consts::PI;

#[derive(Debug, Clone)]
pub struct BinaryCodec {
    dimension: usize,
    words: usize,
}

impl BinaryCodec {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            words: dimension.div_ceil(64),
        }
    }

    /// Pack sign bits of `vector` into words (bit set for values > 0)
    pub fn pack(&self, vector: &[f32]) -> Vec<u64> {
        let mut words = vec![0u64; self.words];
        for (i, &v) in vector.iter().enumerate() {
            if v > 0.0 {
                words[i / 64] |= 1u64 << (i % 64);
            }
        }
        words
    }

    /// Hamming distance between packed query words and an encoded vector
    #[inline]
    pub fn hamming(&self, query_words: &[u64], bytes: &[u8]) -> u32 {
        query_words
            .iter()
            .zip(bytes.chunks_exact(8))
            .map(|(&q, chunk)| (q ^ read_word(chunk)).count_ones())
            .sum()
    }

    /// Angular distance estimate from a Hamming distance
    #[inline]
    pub fn hamming_to_distance(&self, hamming: u32) -> f32 {
        if self.dimension == 0 {
            return 0.0;
        }
        1.0 - (PI * hamming as f32 / self.dimension as f32).cos()
    }

    #[inline]
    pub fn query_distance(&self, query_words: &[u64], bytes: &[u8]) -> f32 {
        self.hamming_to_distance(self.hamming(query_words, bytes))
    }
}

#[inline]
fn read_word(chunk: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(chunk);
    u64::from_le_bytes(word)
}

impl VectorCodec for BinaryCodec {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn code_len(&self) -> usize {
        self.words * 8
    }

    fn encode_into(&self, vector: &[f32], out: &mut Vec<u8>) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        for word in self.pack(vector) {
            out.extend_from_slice(&word.to_le_bytes());
        }
        Ok(())
    }

    /// Binary codes only carry direction, so the metric is always angular.
    fn distance(&self, a: &[u8], b: &[u8], _metric: Metric) -> f32 {
        let hamming: u32 = a
            .chunks_exact(8)
            .zip(b.chunks_exact(8))
            .map(|(x, y)| (read_word(x) ^ read_word(y)).count_ones())
            .sum();
        self.hamming_to_distance(hamming)
    }
}
