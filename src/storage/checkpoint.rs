//! Checkpoint region files
//!
//! `PersistenceManager` owns a checkpoint directory. Writing produces one
//! versioned file per region (payload + CRC32 footer, fsynced) and commits
//! them through the manifest. Reading memory-maps the regions named by
//! MANIFEST-CURRENT and verifies them before handing out payload slices.

use crate::manifest::{
    CheckpointManifest, CheckpointSummary, RegionEntry, RegionKind, CHECKPOINT_FORMAT,
};
use crate::storage::checksum::{Checksum, FOOTER_LEN};
use crate::{IndexError, Result};
use memmap2::{Mmap, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::debug;

/// Serialized region payloads of one checkpoint (footers not yet added)
pub struct CheckpointPayloads {
    pub vectors: Vec<u8>,
    pub graph: Vec<u8>,
    pub idmap: Vec<u8>,
}

/// Verified, memory-mapped regions of the current checkpoint
pub struct MappedCheckpoint {
    pub manifest: CheckpointManifest,
    vectors: Mmap,
    graph: Mmap,
    idmap: Mmap,
}

impl MappedCheckpoint {
    fn mapped(&self, kind: RegionKind) -> &Mmap {
        match kind {
            RegionKind::Vectors => &self.vectors,
            RegionKind::Graph => &self.graph,
            RegionKind::IdMap => &self.idmap,
        }
    }

    /// Region payload without its footer
    pub fn payload(&self, kind: RegionKind) -> &[u8] {
        let bytes = &self.mapped(kind)[..];
        &bytes[..bytes.len() - FOOTER_LEN]
    }
}

pub struct PersistenceManager {
    dir: PathBuf,
}

impl PersistenceManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn has_checkpoint(&self) -> bool {
        CheckpointManifest::exists(&self.dir)
    }

    /// Write all regions and commit them as the next version.
    ///
    /// The previous version's files are kept; anything older is removed
    /// after the commit.
    pub fn write(
        &self,
        payloads: CheckpointPayloads,
        summary: CheckpointSummary,
    ) -> Result<CheckpointManifest> {
        std::fs::create_dir_all(&self.dir)?;

        let previous = CheckpointManifest::read_current(&self.dir)
            .ok()
            .flatten()
            .map(|m| m.version);
        let version = previous.map_or(1, |v| v + 1);

        let vectors = self.write_region(RegionKind::Vectors, version, payloads.vectors)?;
        let graph = self.write_region(RegionKind::Graph, version, payloads.graph)?;
        let idmap = self.write_region(RegionKind::IdMap, version, payloads.idmap)?;

        let manifest = CheckpointManifest::new(version, vectors, graph, idmap, summary);
        manifest.write_atomic(&self.dir)?;

        let keep: Vec<u64> = previous.into_iter().chain(Some(version)).collect();
        let removed = CheckpointManifest::cleanup(&self.dir, &keep)?;
        debug!(version, removed, "checkpoint committed");
        Ok(manifest)
    }

    fn write_region(&self, kind: RegionKind, version: u64, mut payload: Vec<u8>) -> Result<RegionEntry> {
        let file_name = kind.file_name(version);
        let checksum = Checksum::append_footer(&mut payload);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.dir.join(&file_name))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&payload)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        Ok(RegionEntry {
            file: file_name,
            checksum,
            len: payload.len() as u64,
        })
    }

    /// Map and verify the regions of MANIFEST-CURRENT
    pub fn read(&self) -> Result<MappedCheckpoint> {
        let manifest = CheckpointManifest::read_current(&self.dir)?.ok_or_else(|| {
            IndexError::NotFound(format!("no checkpoint manifest in {}", self.dir.display()))
        })?;
        if manifest.format != CHECKPOINT_FORMAT {
            return Err(IndexError::CorruptPersistence(format!(
                "checkpoint format {} is not supported (expected {})",
                manifest.format, CHECKPOINT_FORMAT
            )));
        }

        let vectors = self.map_region(manifest.region(RegionKind::Vectors))?;
        let graph = self.map_region(manifest.region(RegionKind::Graph))?;
        let idmap = self.map_region(manifest.region(RegionKind::IdMap))?;

        Ok(MappedCheckpoint {
            manifest,
            vectors,
            graph,
            idmap,
        })
    }

    fn map_region(&self, entry: &RegionEntry) -> Result<Mmap> {
        let path = self.dir.join(&entry.file);
        let file = File::open(&path).map_err(|e| {
            IndexError::CorruptPersistence(format!("region {} unavailable: {}", entry.file, e))
        })?;

        let len = file.metadata()?.len();
        if len != entry.len || len < FOOTER_LEN as u64 {
            return Err(IndexError::CorruptPersistence(format!(
                "region {} is {} bytes, manifest says {}",
                entry.file, len, entry.len
            )));
        }

        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Checksum::strip_footer(&mmap)?;
        let footer = &mmap[mmap.len() - FOOTER_LEN..];
        let stored = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
        if stored != entry.checksum {
            return Err(IndexError::CorruptPersistence(format!(
                "region {} checksum {:#010x} does not match manifest {:#010x}",
                entry.file, stored, entry.checksum
            )));
        }
        Ok(mmap)
    }
}
