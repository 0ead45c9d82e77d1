//! Index layer
//!
//! - `buffer`: pending records, linear scan at query time
//! - `segment`: flush generations, id map, tombstones
//! - `vamana`: the navigable graph

pub mod buffer;
pub mod segment;
pub mod vamana;

pub use buffer::{Buffer, PendingRecord};
pub use segment::{Location, MergeOutcome, SegmentManager, SegmentManagerState};
pub use vamana::{Candidate, NodeDistance, VamanaConfig, VamanaGraph};
