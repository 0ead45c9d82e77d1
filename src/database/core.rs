//! VectorDB core - struct, construction, configuration
//!
//! Lock layout:
//! - `writer`: serializes every mutation (insert, delete, flush, merge,
//!   checkpoint, recover, configure)
//! - `core`: store + graph + segments, written only by flush / merge /
//!   delete / recover
//! - `buffer`: pending records
//!
//! Lock order is always `core` before `buffer`. Search takes both read
//! locks together, so it never sees a half-published flush.

use crate::codec::Quantization;
use crate::config::IndexConfig;
use crate::index::{Buffer, SegmentManager, VamanaGraph};
use crate::storage::VectorStore;
use crate::{IndexError, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::AtomicUsize;
use tracing::info;

/// Flushed state: everything except the pending buffer
pub(crate) struct Core {
    /// Fixed by the first accepted insert
    pub dimension: Option<usize>,
    pub store: VectorStore,
    pub graph: VamanaGraph,
    pub segments: SegmentManager,
    pub flush_count: u64,
}

impl Core {
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            dimension: None,
            store: VectorStore::new(0, config.metric, config.quantization),
            graph: VamanaGraph::new(config.vamana.clone(), config.seed),
            segments: SegmentManager::new(),
            flush_count: 0,
        }
    }

    /// Fix the index dimension and size the store for it
    pub fn establish(&mut self, dimension: usize, config: &IndexConfig) {
        self.dimension = Some(dimension);
        self.store = VectorStore::new(dimension, config.metric, config.quantization);
    }
}

/// Embedded ANN vector index
///
/// # Example
/// ```ignore
/// let db = VectorDB::new(IndexConfig::default())?;
/// db.insert("a", vec![1.0, 0.0, 0.0, 0.0], Vec::new())?;
/// let hits = db.search(&[1.0, 0.0, 0.0, 0.0], 1, None)?;
/// assert_eq!(hits[0].id, "a");
/// ```
pub struct VectorDB {
    pub(crate) config: RwLock<IndexConfig>,
    pub(crate) core: RwLock<Core>,
    pub(crate) buffer: RwLock<Buffer>,
    pub(crate) writer: Mutex<()>,
    pub(crate) inserts_since_checkpoint: AtomicUsize,
}

impl VectorDB {
    /// Create an empty in-memory index
    pub fn new(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            core: RwLock::new(Core::new(&config)),
            buffer: RwLock::new(Buffer::new(config.buffer_size)),
            config: RwLock::new(config),
            writer: Mutex::new(()),
            inserts_since_checkpoint: AtomicUsize::new(0),
        })
    }

    /// Create an index, recovering from `config.data_dir` when it holds a
    /// committed checkpoint
    pub fn open(config: IndexConfig) -> Result<Self> {
        let data_dir = config.data_dir.clone();
        let db = Self::new(config)?;
        if let Some(dir) = data_dir {
            if crate::manifest::CheckpointManifest::exists(&dir) {
                let count = db.recover(&dir)?;
                info!(dir = %dir.display(), count, "opened index from checkpoint");
            }
        }
        Ok(db)
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> IndexConfig {
        self.config.read().clone()
    }

    /// Dimension fixed by the first insert, if any
    pub fn dimension(&self) -> Option<usize> {
        self.core.read().dimension
    }

    /// Change the flush threshold and, while the index is empty, the
    /// quantization mode.
    ///
    /// A buffer already above the new threshold is flushed before returning.
    pub fn configure(&self, buffer_size: usize, quantization: Quantization) -> Result<()> {
        if buffer_size == 0 {
            return Err(IndexError::InvalidArgument(
                "buffer_size must be positive".into(),
            ));
        }
        let _writer = self.writer.lock();

        let current = self.config.read().clone();
        if quantization != current.quantization {
            let mut candidate = current.clone();
            candidate.quantization = quantization;
            candidate.validate()?;

            let mut core = self.core.write();
            let buffer = self.buffer.read();
            if !core.store.is_empty() || !buffer.is_empty() {
                return Err(IndexError::QuantizationLocked);
            }
            // Nothing stored: rebuild the empty state under the new codec
            let dimension = core.dimension;
            *core = Core::new(&candidate);
            if let Some(dim) = dimension {
                core.establish(dim, &candidate);
            }
            *self.config.write() = candidate;
        }

        self.config.write().buffer_size = buffer_size;
        let overfull = {
            let mut buffer = self.buffer.write();
            buffer.set_capacity(buffer_size);
            buffer.should_flush()
        };
        if overfull {
            self.flush_locked()?;
        }
        Ok(())
    }

    /// Drop every vector; configuration is kept
    pub fn clear(&self) {
        let _writer = self.writer.lock();
        let config = self.config.read().clone();
        let mut core = self.core.write();
        let mut buffer = self.buffer.write();
        *core = Core::new(&config);
        buffer.clear();
        self.inserts_since_checkpoint
            .store(0, std::sync::atomic::Ordering::Relaxed);
    }
}
