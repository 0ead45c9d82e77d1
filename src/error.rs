//! Error types for the MoteVec index core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Vector length differs from the dimension fixed by the first insert
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// NaN/Inf components, zero vector under cosine, or an empty id
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Checksum, magic, version or length mismatch while recovering
    #[error("Corrupt persistence: {0}")]
    CorruptPersistence(String),

    /// Internal invariant violation: nodes not reachable from any entry point
    #[error("Graph disconnected: {unreachable} of {total} nodes unreachable from entry points")]
    GraphDisconnected { unreachable: usize, total: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Quantization mode cannot change once vectors exist")]
    QuantizationLocked,

    #[error("Not found: {0}")]
    NotFound(String),
}

impl IndexError {
    /// Per-record errors reject one record of a batch; the rest proceeds.
    pub fn is_per_record(&self) -> bool {
        matches!(
            self,
            IndexError::DimensionMismatch { .. } | IndexError::InvalidVector(_)
        )
    }
}

impl From<bincode::Error> for IndexError {
    fn from(err: bincode::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_record_classification() {
        assert!(IndexError::DimensionMismatch { expected: 4, actual: 3 }.is_per_record());
        assert!(IndexError::InvalidVector("nan".into()).is_per_record());
        assert!(!IndexError::CorruptPersistence("crc".into()).is_per_record());
        assert!(!IndexError::QuantizationLocked.is_per_record());
    }

    #[test]
    fn test_display() {
        let err = IndexError::GraphDisconnected { unreachable: 3, total: 10 };
        assert_eq!(
            err.to_string(),
            "Graph disconnected: 3 of 10 nodes unreachable from entry points"
        );
    }
}
