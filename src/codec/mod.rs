//! Quantization codecs
//!
//! A codec replaces the full-precision search copy of each vector with a
//! reduced-precision code and computes approximate distances directly on
//! it. The raw f32 vector is always kept separately for `get` and for the
//! exact re-ranking pass.
//!
//! | Mode | Code size (d dims) | Distance |
//! |------|--------------------|----------|
//! | `None` | 4·d (unit f32 copy) | exact |
//! | `Scalar` | d + 8 | int8 dot + correction terms |
//! | `Binary` | ⌈d/64⌉·8 | Hamming → angle |

pub mod binary;
pub mod scalar;

pub use binary::BinaryCodec;
pub use scalar::ScalarCodec;

use crate::config::Metric;
use crate::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Quantization mode, fixed per index once vectors exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantization {
    /// Full precision
    None,
    /// int8 per-vector min/max (~4x smaller)
    Scalar,
    /// 1 bit per dimension (~32x smaller)
    Binary,
}

impl Default for Quantization {
    fn default() -> Self {
        Quantization::None
    }
}

impl Quantization {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Quantization::None => 0,
            Quantization::Scalar => 1,
            Quantization::Binary => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Quantization::None),
            1 => Some(Quantization::Scalar),
            2 => Some(Quantization::Binary),
            _ => None,
        }
    }

    pub fn is_quantized(self) -> bool {
        self != Quantization::None
    }
}

impl FromStr for Quantization {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "f32" | "float" => Ok(Quantization::None),
            "scalar" | "int8" | "sq8" => Ok(Quantization::Scalar),
            "binary" | "1bit" | "bit" => Ok(Quantization::Binary),
            other => Err(IndexError::InvalidArgument(format!(
                "unknown quantization mode '{}'",
                other
            ))),
        }
    }
}

/// Encode/compare contract shared by the reduced-precision codecs
pub trait VectorCodec: Send + Sync {
    fn dimension(&self) -> usize;

    /// Bytes produced per vector
    fn code_len(&self) -> usize;

    /// Append the code of `vector` to `out`
    fn encode_into(&self, vector: &[f32], out: &mut Vec<u8>) -> Result<()>;

    fn encode(&self, vector: &[f32]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.code_len());
        self.encode_into(vector, &mut out)?;
        Ok(out)
    }

    /// Distance between two codes; monotonic with, not equal to, the true metric
    fn distance(&self, a: &[u8], b: &[u8], metric: Metric) -> f32;
}

/// Active codec of an index
#[derive(Debug, Clone)]
pub enum Codec {
    None,
    Scalar(ScalarCodec),
    Binary(BinaryCodec),
}

/// Query prepared once per search for repeated code distances
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    /// Metric-prepared query (unit length under cosine)
    pub vector: Vec<f32>,
    sum: f32,
    words: Vec<u64>,
}

impl Codec {
    pub fn new(quantization: Quantization, dimension: usize) -> Self {
        match quantization {
            Quantization::None => Codec::None,
            Quantization::Scalar => Codec::Scalar(ScalarCodec::new(dimension)),
            Quantization::Binary => Codec::Binary(BinaryCodec::new(dimension)),
        }
    }

    pub fn quantization(&self) -> Quantization {
        match self {
            Codec::None => Quantization::None,
            Codec::Scalar(_) => Quantization::Scalar,
            Codec::Binary(_) => Quantization::Binary,
        }
    }

    /// Code bytes per vector (0 when unquantized)
    pub fn code_len(&self) -> usize {
        match self {
            Codec::None => 0,
            Codec::Scalar(c) => c.code_len(),
            Codec::Binary(c) => c.code_len(),
        }
    }

    pub fn encode_into(&self, vector: &[f32], out: &mut Vec<u8>) -> Result<()> {
        match self {
            Codec::None => Ok(()),
            Codec::Scalar(c) => c.encode_into(vector, out),
            Codec::Binary(c) => c.encode_into(vector, out),
        }
    }

    pub fn prepare(&self, vector: Vec<f32>) -> PreparedQuery {
        let sum = match self {
            Codec::Scalar(_) => vector.iter().sum(),
            _ => 0.0,
        };
        let words = match self {
            Codec::Binary(c) => c.pack(&vector),
            _ => Vec::new(),
        };
        PreparedQuery { vector, sum, words }
    }

    /// Approximate query-to-code distance. Only meaningful for quantized modes.
    #[inline]
    pub fn query_distance(&self, query: &PreparedQuery, code: &[u8], metric: Metric) -> f32 {
        match self {
            Codec::None => f32::MAX,
            Codec::Scalar(c) => c.query_distance(&query.vector, query.sum, code, metric),
            Codec::Binary(c) => c.query_distance(&query.words, code),
        }
    }

    /// Approximate code-to-code distance. Only meaningful for quantized modes.
    #[inline]
    pub fn code_distance(&self, a: &[u8], b: &[u8], metric: Metric) -> f32 {
        match self {
            Codec::None => f32::MAX,
            Codec::Scalar(c) => c.distance(a, b, metric),
            Codec::Binary(c) => c.distance(a, b, metric),
        }
    }
}
