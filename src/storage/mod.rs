//! Storage layer
//!
//! - `vector_store`: slot-addressed columnar vector storage
//! - `checksum`: CRC32 footers for checkpoint regions
//! - `checkpoint`: region files + manifest commit / mmap recovery

pub(crate) mod bytes;
pub mod checkpoint;
pub mod checksum;
pub mod vector_store;

pub use checkpoint::{CheckpointPayloads, MappedCheckpoint, PersistenceManager};
pub use checksum::{Checksum, ChecksumError};
pub use vector_store::VectorStore;
