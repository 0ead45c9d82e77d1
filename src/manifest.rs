//! # Manifest: Atomic Checkpoint Commit
//!
//! A checkpoint writes three region files. Without a single commit point a
//! crash could leave a vectors region from one checkpoint next to a graph
//! region from another. The manifest is that commit point:
//!
//! ```text
//! Checkpoint Process:
//! 1. Write region files (versioned names)
//!    - vectors-000007.vec
//!    - graph-000007.graph
//!    - idmap-000007.map
//! 2. fsync() all region files
//! 3. Write MANIFEST-000007.tmp
//! 4. fsync() MANIFEST
//! 5. rename(MANIFEST-000007.tmp → MANIFEST-CURRENT)  ← ATOMIC COMMIT POINT
//! 6. fsync() parent directory
//! ```
//!
//! Before the rename the previous MANIFEST-CURRENT is still authoritative and
//! the new region files are orphans; after it the new version is. A crash at
//! any step leaves one of the two complete states.

use crate::codec::Quantization;
use crate::config::Metric;
use crate::index::vamana::VamanaConfig;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const CURRENT_MANIFEST: &str = "MANIFEST-CURRENT";

/// On-disk layout version of the checkpoint as a whole
pub const CHECKPOINT_FORMAT: u32 = 1;

/// Region kinds and their file name pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Vectors,
    Graph,
    IdMap,
}

impl RegionKind {
    pub const ALL: [RegionKind; 3] = [RegionKind::Vectors, RegionKind::Graph, RegionKind::IdMap];

    fn prefix(self) -> &'static str {
        match self {
            RegionKind::Vectors => "vectors-",
            RegionKind::Graph => "graph-",
            RegionKind::IdMap => "idmap-",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            RegionKind::Vectors => ".vec",
            RegionKind::Graph => ".graph",
            RegionKind::IdMap => ".map",
        }
    }

    pub fn file_name(self, version: u64) -> String {
        format!("{}{:06}{}", self.prefix(), version, self.extension())
    }

    /// Version encoded in a region file name, if it is one
    fn parse_version(self, name: &str) -> Option<u64> {
        name.strip_prefix(self.prefix())?
            .strip_suffix(self.extension())?
            .parse()
            .ok()
    }
}

/// One region file as recorded in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionEntry {
    pub file: String,
    /// CRC32 of the payload (equal to the file footer)
    pub checksum: u32,
    /// File length including the footer
    pub len: u64,
}

/// Index shape at checkpoint time, for inspection and sanity checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub dimension: Option<usize>,
    pub vector_count: usize,
    pub quantization: Quantization,
    pub metric: Metric,
    pub vamana: VamanaConfig,
}

/// Manifest: the set of region files making up one checkpoint version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointManifest {
    pub format: u32,

    /// Monotonically increasing checkpoint version
    pub version: u64,

    pub vectors: RegionEntry,
    pub graph: RegionEntry,
    pub idmap: RegionEntry,

    pub summary: CheckpointSummary,

    /// Creation timestamp (unix seconds)
    pub timestamp: u64,
}

impl CheckpointManifest {
    pub fn new(
        version: u64,
        vectors: RegionEntry,
        graph: RegionEntry,
        idmap: RegionEntry,
        summary: CheckpointSummary,
    ) -> Self {
        Self {
            format: CHECKPOINT_FORMAT,
            version,
            vectors,
            graph,
            idmap,
            summary,
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    pub fn region(&self, kind: RegionKind) -> &RegionEntry {
        match kind {
            RegionKind::Vectors => &self.vectors,
            RegionKind::Graph => &self.graph,
            RegionKind::IdMap => &self.idmap,
        }
    }

    /// Write manifest to a temporary file (not yet committed)
    ///
    /// The file is fully written and fsynced, but not yet visible.
    pub fn write_temp(&self, dir: &Path) -> Result<PathBuf> {
        let temp_path = dir.join(format!("MANIFEST-{:06}.tmp", self.version));

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;
        let mut writer = BufWriter::new(file);

        // JSON: human-readable for debugging
        let json = serde_json::to_string_pretty(self)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        Ok(temp_path)
    }

    /// Atomic commit: rename temp manifest to MANIFEST-CURRENT
    pub fn commit_atomic(temp_path: &Path, dir: &Path) -> Result<()> {
        let current_path = dir.join(CURRENT_MANIFEST);
        std::fs::rename(temp_path, &current_path)?;

        // The rename lives in the directory entry until the directory is fsynced
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            let dir_file = File::open(dir)?;
            let rc = unsafe { libc::fsync(dir_file.as_raw_fd()) };
            if rc != 0 {
                return Err(std::io::Error::last_os_error().into());
            }
        }

        #[cfg(not(unix))]
        {
            File::open(&current_path)?.sync_all()?;
        }

        Ok(())
    }

    /// Full atomic write: temp write + commit
    pub fn write_atomic(&self, dir: &Path) -> Result<()> {
        let temp_path = self.write_temp(dir)?;
        Self::commit_atomic(&temp_path, dir)
    }

    pub fn exists(dir: &Path) -> bool {
        dir.join(CURRENT_MANIFEST).is_file()
    }

    /// Read MANIFEST-CURRENT; `None` when no checkpoint was ever committed
    pub fn read_current(dir: &Path) -> Result<Option<Self>> {
        let current_path = dir.join(CURRENT_MANIFEST);
        if !current_path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(&current_path)?);
        let manifest: CheckpointManifest = serde_json::from_reader(reader).map_err(|e| {
            crate::IndexError::CorruptPersistence(format!("unreadable manifest: {}", e))
        })?;
        Ok(Some(manifest))
    }

    /// Versions that have at least one region file in `dir`, ascending
    pub fn list_all_versions(dir: &Path) -> Result<Vec<u64>> {
        let mut versions = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(v) = RegionKind::ALL.iter().find_map(|k| k.parse_version(name)) {
                versions.push(v);
            }
        }
        versions.sort_unstable();
        versions.dedup();
        Ok(versions)
    }

    /// Remove region files of versions other than `keep`, plus stale
    /// temp manifests. Returns the number of files deleted.
    pub fn cleanup(dir: &Path, keep: &[u64]) -> Result<usize> {
        let mut deleted = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let stale = match RegionKind::ALL.iter().find_map(|k| k.parse_version(name)) {
                Some(v) => !keep.contains(&v),
                None => name.starts_with("MANIFEST-") && name.ends_with(".tmp"),
            };
            if stale {
                std::fs::remove_file(&path)?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
