//! Database Module - the `VectorDB` facade
//!
//! # Module Structure
//! - `core`: VectorDB struct, new/open, configure, clear
//! - `crud`: insert / upsert / get / delete / count / list
//! - `search`: top-k search over graph + buffer
//! - `persistence`: flush, merge, checkpoint, recover
//! - `stats`: statistics and health checks

pub mod core;
pub mod crud;
pub mod persistence;
pub mod search;
pub mod stats;

pub use core::VectorDB;
