//! Staged configuration store
//!
//! Loads named configuration documents from an active directory and holds
//! an in-memory staging overlay of modified documents. The overlay shadows
//! the on-disk copy until `commit` writes every staged document atomically
//! or `revert` drops the overlay.

use crate::fsutil::atomic_write;
use netforge_core::codec::{emit, parse};
use netforge_core::errors::{io_error, not_found, Error, Result};
use netforge_core::model::{ConfigDocument, Section};
use netforge_core::path::ConfigPath;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Config store with an active directory and a staging overlay
///
/// Mutators serialize on the overlay lock; readers observe a consistent
/// view of the overlay. Documents handed out are clones, so callers never
/// alias staged state.
pub struct ConfigStore {
    active_dir: PathBuf,
    staged: RwLock<HashMap<String, ConfigDocument>>,
}

impl ConfigStore {
    /// Create a config store over the given active directory
    pub fn new(active_dir: impl Into<PathBuf>) -> Self {
        Self {
            active_dir: active_dir.into(),
            staged: RwLock::new(HashMap::new()),
        }
    }

    /// The directory holding the currently-in-effect configuration files
    pub fn active_dir(&self) -> &Path {
        &self.active_dir
    }

    /// Load a configuration document
    ///
    /// Returns the staged overlay if present, otherwise reads and parses
    /// the on-disk copy. A missing file yields an empty document.
    pub fn load(&self, name: &str) -> Result<ConfigDocument> {
        if let Some(doc) = self.staged.read().expect("overlay lock poisoned").get(name) {
            return Ok(doc.clone());
        }
        self.load_from_disk(name)
    }

    /// Stage a document, replacing any prior staged version
    pub fn stage(&self, name: impl Into<String>, doc: ConfigDocument) {
        self.staged
            .write()
            .expect("overlay lock poisoned")
            .insert(name.into(), doc);
    }

    /// Resolve a dotted path to an option value
    pub fn get(&self, path: &str) -> Result<String> {
        let parsed = ConfigPath::parse(path)?;
        let option = parsed
            .option
            .ok_or_else(|| not_found(format!("path '{path}': option name required")))?;

        let doc = self.load(&parsed.config)?;
        let section = doc
            .section_for_path(&parsed.section)
            .ok_or_else(|| not_found(format!("section '{}'", parsed.section)))?;

        section
            .option(&option)
            .map(str::to_string)
            .ok_or_else(|| not_found(format!("option '{option}'")))
    }

    /// Set an option via a dotted path and stage the modified document
    ///
    /// A missing section is created as a named section whose name equals
    /// the path segment.
    pub fn set(&self, path: &str, value: &str) -> Result<()> {
        let parsed = ConfigPath::parse(path)?;
        let option = parsed
            .option
            .ok_or_else(|| not_found(format!("path '{path}': option name required")))?;

        // Hold the write lock across read-modify-stage so concurrent sets
        // cannot lose updates.
        let mut staged = self.staged.write().expect("overlay lock poisoned");
        let mut doc = match staged.get(&parsed.config) {
            Some(doc) => doc.clone(),
            None => self.load_from_disk(&parsed.config)?,
        };

        match doc.section_for_path_mut(&parsed.section) {
            Some(section) => section.set_option(option, value),
            None => {
                let mut section = Section::new(parsed.section.clone(), parsed.section.clone());
                section.set_option(option, value);
                doc.push_section(section);
            }
        }

        staged.insert(parsed.config, doc);
        Ok(())
    }

    /// True if the overlay holds any staged documents
    pub fn has_changes(&self) -> bool {
        !self.staged.read().expect("overlay lock poisoned").is_empty()
    }

    /// Names of configs with staged changes, sorted
    pub fn staged_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .staged
            .read()
            .expect("overlay lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Drop the staging overlay
    pub fn revert(&self) {
        self.staged.write().expect("overlay lock poisoned").clear();
    }

    /// Commit all staged documents to the active directory
    ///
    /// Each document is written atomically (temp file, fsync, rename).
    /// The overlay is cleared only after every write succeeds; on failure
    /// the overlay stays intact and already-written files are left as-is
    /// (the transaction engine restores via snapshot).
    pub fn commit(&self) -> Result<()> {
        let mut staged = self.staged.write().expect("overlay lock poisoned");
        if staged.is_empty() {
            return Err(Error::NoChanges);
        }

        fs::create_dir_all(&self.active_dir).map_err(|e| io_error(&self.active_dir, e))?;

        let mut names: Vec<&String> = staged.keys().collect();
        names.sort();
        for name in names {
            let doc = &staged[name.as_str()];
            let path = self.active_dir.join(name);
            atomic_write(&path, emit(doc).as_bytes())?;
            tracing::debug!(config = %name, "wrote staged config");
        }

        staged.clear();
        Ok(())
    }

    /// Emitted text form of a document (staged or on-disk)
    pub fn show(&self, name: &str) -> Result<String> {
        Ok(emit(&self.load(name)?))
    }

    fn load_from_disk(&self, name: &str) -> Result<ConfigDocument> {
        let path = self.active_dir.join(name);
        match fs::read_to_string(&path) {
            Ok(text) => parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigDocument::new()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded_store() -> (ConfigStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("network"),
            "config interface 'wan'\n\toption 'proto' 'static'\n\toption 'ipaddr' '192.168.1.1'\n",
        )
        .unwrap();
        (ConfigStore::new(temp_dir.path()), temp_dir)
    }

    #[test]
    fn test_load_missing_config_yields_empty_document() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path());

        let doc = store.load("dhcp").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_get_and_set_dotted_paths() {
        let (store, _dir) = seeded_store();

        assert_eq!(store.get("network.wan.ipaddr").unwrap(), "192.168.1.1");

        store.set("network.wan.ipaddr", "192.168.1.100").unwrap();
        assert_eq!(store.get("network.wan.ipaddr").unwrap(), "192.168.1.100");
        assert!(store.has_changes());
        assert_eq!(store.staged_names(), vec!["network".to_string()]);
    }

    #[test]
    fn test_get_missing_section_and_option() {
        let (store, _dir) = seeded_store();

        assert_eq!(
            store.get("network.lan.ipaddr").unwrap_err().code(),
            "ERR_NOT_FOUND"
        );
        assert_eq!(
            store.get("network.wan.gateway").unwrap_err().code(),
            "ERR_NOT_FOUND"
        );
        assert_eq!(store.get("network.wan").unwrap_err().code(), "ERR_NOT_FOUND");
    }

    #[test]
    fn test_set_creates_named_section() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path());

        store.set("network.lan.proto", "dhcp").unwrap();

        let doc = store.load("network").unwrap();
        let lan = doc.section("lan", "lan").unwrap();
        assert_eq!(lan.option("proto"), Some("dhcp"));
    }

    #[test]
    fn test_revert_drops_overlay() {
        let (store, _dir) = seeded_store();

        store.set("network.wan.ipaddr", "10.0.0.1").unwrap();
        store.revert();

        assert!(!store.has_changes());
        assert_eq!(store.get("network.wan.ipaddr").unwrap(), "192.168.1.1");
    }

    #[test]
    fn test_commit_writes_emitted_document_byte_for_byte() {
        let (store, dir) = seeded_store();

        store.set("network.wan.ipaddr", "10.0.0.1").unwrap();
        let staged = store.load("network").unwrap();
        store.commit().unwrap();

        assert!(!store.has_changes());
        let on_disk = fs::read_to_string(dir.path().join("network")).unwrap();
        assert_eq!(on_disk, emit(&staged));
    }

    #[test]
    fn test_commit_without_changes_fails() {
        let (store, _dir) = seeded_store();
        assert_eq!(store.commit().unwrap_err(), Error::NoChanges);
    }

    #[test]
    fn test_commit_creates_active_dir() {
        let temp_dir = TempDir::new().unwrap();
        let active = temp_dir.path().join("etc").join("config");
        let store = ConfigStore::new(&active);

        store.set("system.main.hostname", "router").unwrap();
        store.commit().unwrap();

        assert!(active.join("system").exists());
    }
}
