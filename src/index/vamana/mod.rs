//! Vamana graph index
//!
//! - `config`: graph parameters (R, L, alpha, beam)
//! - `pruner`: RobustPrune
//! - `graph`: adjacency arena, build / insert / consolidate / search

pub mod config;
pub mod graph;
pub mod pruner;

pub use config::VamanaConfig;
pub use graph::{NodeDistance, VamanaGraph};
pub use pruner::{robust_prune, Candidate};
