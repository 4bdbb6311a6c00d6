//! Snapshot store
//!
//! Each snapshot is a directory under the snapshot root holding copies of
//! the config files plus a `metadata.json` record with per-file SHA-256
//! checksums. Snapshots are created with owner-only permissions, written
//! atomically, and validated (existence, checksum, parse) before any
//! restore touches the active directory.

use crate::fsutil::{atomic_write, check_disk_space, copy_file_atomic, unique_id};
use chrono::{DateTime, Utc};
use netforge_core::codec::parse;
use netforge_core::errors::{corrupt, io_error, not_found, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata file name inside each snapshot directory
pub const METADATA_FILE: &str = "metadata.json";

/// Default free-space floor required before creating a snapshot (1 GiB)
pub const DEFAULT_MIN_FREE_BYTES: u64 = 1024 * 1024 * 1024;

/// Snapshot count above which creation triggers an automatic prune
const AUTO_PRUNE_KEEP: usize = 100;

/// Metadata record persisted alongside each snapshot's config files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Snapshot identifier (timestamp-based, see `fsutil::unique_id`)
    pub id: String,
    /// Creation time (RFC3339)
    pub timestamp: DateTime<Utc>,
    /// Operator-supplied message
    pub message: String,
    /// Config files included in the snapshot
    pub configs: Vec<String>,
    /// Crate version that created this snapshot
    pub version: String,
    /// Config file name -> lowercase hex SHA-256 of the file bytes
    pub checksums: BTreeMap<String, String>,
}

/// A configuration snapshot on disk
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Snapshot identifier
    pub id: String,
    /// Parsed metadata record
    pub metadata: SnapshotMetadata,
    /// Snapshot directory
    pub path: PathBuf,
}

/// Manages configuration snapshots on a dedicated directory
///
/// `list`/`load` are safe to call concurrently; `create`/`delete` are
/// serialized by the caller (the transaction engine is the only caller
/// during a transaction).
pub struct SnapshotStore {
    snapshot_root: PathBuf,
    active_dir: PathBuf,
    min_free_bytes: u64,
}

impl SnapshotStore {
    /// Create a snapshot store
    pub fn new(snapshot_root: impl Into<PathBuf>, active_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_root: snapshot_root.into(),
            active_dir: active_dir.into(),
            min_free_bytes: DEFAULT_MIN_FREE_BYTES,
        }
    }

    /// Override the free-space floor (used by tests and constrained hosts)
    pub fn with_min_free_bytes(mut self, min_free_bytes: u64) -> Self {
        self.min_free_bytes = min_free_bytes;
        self
    }

    /// Create a new snapshot of the current configuration
    ///
    /// Missing source files are silently skipped and omitted from the
    /// metadata `configs` list. On any failure the partial snapshot
    /// directory is removed before returning.
    pub fn create(&self, message: &str, configs: &[String]) -> Result<Snapshot> {
        self.ensure_root()?;
        check_disk_space(&self.snapshot_root, self.min_free_bytes)?;

        let id = unique_id();
        let snapshot_path = self.snapshot_root.join(&id);
        create_private_dir(&snapshot_path)?;

        let metadata = match self.populate(&snapshot_path, &id, message, configs) {
            Ok(metadata) => metadata,
            Err(e) => {
                let _ = fs::remove_dir_all(&snapshot_path);
                return Err(e);
            }
        };

        tracing::info!(
            snapshot_id = %id,
            configs = metadata.configs.len(),
            version = %metadata.version,
            "snapshot created"
        );

        self.auto_prune();

        Ok(Snapshot {
            id,
            metadata,
            path: snapshot_path,
        })
    }

    /// List all snapshots, newest first by metadata timestamp
    ///
    /// Entries without a loadable metadata record are skipped. Sorting is
    /// by the recorded timestamp, never by id string: a backwards clock
    /// jump can produce an id that sorts out of order.
    pub fn list(&self) -> Result<Vec<Snapshot>> {
        self.ensure_root()?;

        let entries = fs::read_dir(&self.snapshot_root).map_err(|e| io_error(&self.snapshot_root, e))?;

        let mut snapshots = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            if !entry.path().is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            match self.load(&id) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(_) => continue,
            }
        }

        snapshots.sort_by(|a, b| b.metadata.timestamp.cmp(&a.metadata.timestamp));
        Ok(snapshots)
    }

    /// Load a snapshot by id
    pub fn load(&self, id: &str) -> Result<Snapshot> {
        let snapshot_path = self.snapshot_root.join(id);
        if !snapshot_path.is_dir() {
            return Err(not_found(format!("snapshot '{id}'")));
        }

        let metadata_path = snapshot_path.join(METADATA_FILE);
        let bytes = match fs::read(&metadata_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(not_found(format!("snapshot '{id}' metadata")));
            }
            Err(e) => return Err(io_error(&metadata_path, e)),
        };
        let metadata: SnapshotMetadata = serde_json::from_slice(&bytes)?;

        Ok(Snapshot {
            id: id.to_string(),
            metadata,
            path: snapshot_path,
        })
    }

    /// Validate snapshot integrity
    ///
    /// Every file listed in the metadata must exist, match its recorded
    /// checksum (when present), and parse as a configuration document.
    pub fn validate(&self, snapshot: &Snapshot) -> Result<()> {
        for name in &snapshot.metadata.configs {
            let path = snapshot.path.join(name);

            let data = match fs::read(&path) {
                Ok(data) => data,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(corrupt(&snapshot.id, format!("{name} missing")));
                }
                Err(e) => return Err(io_error(&path, e)),
            };

            if let Some(expected) = snapshot.metadata.checksums.get(name) {
                let actual = hex::encode(Sha256::digest(&data));
                if &actual != expected {
                    return Err(corrupt(
                        &snapshot.id,
                        format!("checksum mismatch for {name}: expected {expected}, got {actual}"),
                    ));
                }
            }

            let text = String::from_utf8(data)
                .map_err(|_| corrupt(&snapshot.id, format!("{name} is not valid UTF-8")))?;
            parse(&text).map_err(|e| corrupt(&snapshot.id, format!("invalid config {name}: {e}")))?;
        }

        Ok(())
    }

    /// Restore a snapshot into the active directory
    ///
    /// Validates first, then copies each config file atomically over the
    /// active copy. A per-file failure fails the whole restore; earlier
    /// copies remain in place, which the transaction engine surfaces as a
    /// fatal rollback failure.
    pub fn restore(&self, id: &str) -> Result<()> {
        let snapshot = self.load(id)?;
        self.validate(&snapshot)?;

        for name in &snapshot.metadata.configs {
            copy_file_atomic(&snapshot.path.join(name), &self.active_dir.join(name))?;
        }

        tracing::info!(snapshot_id = %id, "snapshot restored");
        Ok(())
    }

    /// Delete a snapshot
    pub fn delete(&self, id: &str) -> Result<()> {
        let snapshot_path = self.snapshot_root.join(id);
        if snapshot_path.exists() {
            fs::remove_dir_all(&snapshot_path).map_err(|e| io_error(&snapshot_path, e))?;
        }
        Ok(())
    }

    /// Remove old snapshots beyond `keep`, returning the deleted ids
    pub fn prune(&self, keep: usize) -> Result<Vec<String>> {
        let snapshots = self.list()?;
        if snapshots.len() <= keep {
            return Ok(Vec::new());
        }

        let mut deleted = Vec::new();
        for snapshot in &snapshots[keep..] {
            self.delete(&snapshot.id)?;
            deleted.push(snapshot.id.clone());
        }
        Ok(deleted)
    }

    /// The most recent snapshot, if any
    pub fn latest(&self) -> Result<Option<Snapshot>> {
        Ok(self.list()?.into_iter().next())
    }

    fn ensure_root(&self) -> Result<()> {
        create_private_dir(&self.snapshot_root)
    }

    fn populate(
        &self,
        snapshot_path: &Path,
        id: &str,
        message: &str,
        configs: &[String],
    ) -> Result<SnapshotMetadata> {
        let mut copied = Vec::new();
        for name in configs {
            let src = self.active_dir.join(name);
            match fs::metadata(&src) {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(io_error(&src, e)),
            }
            copy_file_atomic(&src, &snapshot_path.join(name))?;
            copied.push(name.clone());
        }

        // Checksums are computed over the copied bytes, so validation
        // later checks exactly what was persisted.
        let mut checksums = BTreeMap::new();
        for name in &copied {
            let path = snapshot_path.join(name);
            let data = fs::read(&path).map_err(|e| io_error(&path, e))?;
            checksums.insert(name.clone(), hex::encode(Sha256::digest(&data)));
        }

        let metadata = SnapshotMetadata {
            id: id.to_string(),
            timestamp: Utc::now(),
            message: message.to_string(),
            configs: copied,
            version: env!("CARGO_PKG_VERSION").to_string(),
            checksums,
        };

        let json = serde_json::to_vec_pretty(&metadata)?;
        atomic_write(&snapshot_path.join(METADATA_FILE), &json)?;

        Ok(metadata)
    }

    fn auto_prune(&self) {
        match self.list() {
            Ok(snapshots) if snapshots.len() > AUTO_PRUNE_KEEP => {
                match self.prune(AUTO_PRUNE_KEEP) {
                    Ok(deleted) => {
                        tracing::info!(count = deleted.len(), "auto-pruned old snapshots");
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to prune old snapshots"),
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to list snapshots for auto-prune"),
        }
    }
}

fn create_private_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| io_error(path, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))
            .map_err(|e| io_error(path, e))?;
    }
    Ok(())
}
