//! Flat domain → rendered-analysis store.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::StoreError;

/// Last analysis result for each domain.
///
/// One flat namespace: `put` overwrites, nothing expires, nothing is evicted.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// Use [`open`](Self::open) for in-memory and [`open_persistent`](Self::open_persistent)
/// for a JSON file that survives across runs. The file is rewritten through a
/// temporary sibling on every mutation, so a crash never leaves it half-written.
pub struct DomainStore {
    entries: RwLock<BTreeMap<String, String>>,
    path: Option<PathBuf>,
}

impl DomainStore {
    /// Open an empty in-memory store.
    pub fn open() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            path: None,
        }
    }

    /// Open or create a persistent store at the given path.
    ///
    /// A missing or empty file is an empty store; the file itself is only
    /// created on the first write.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let entries = match std::fs::read_to_string(path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        info!(path = %path.display(), count = entries.len(), "opened domain cache");
        Ok(Self {
            entries: RwLock::new(entries),
            path: Some(path.to_path_buf()),
        })
    }

    /// Backing file, if persistent.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Stored analysis for `domain`.
    pub fn get(&self, domain: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read()?.get(domain).cloned())
    }

    /// Store `text` for `domain`, replacing any previous entry.
    pub fn put(&self, domain: &str, text: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(domain.to_string(), text.to_string());
        })?;
        debug!(domain, bytes = text.len(), "cached analysis");
        Ok(())
    }

    /// Drop the entry for `domain`. Returns whether one existed.
    pub fn remove(&self, domain: &str) -> Result<bool, StoreError> {
        if !self.read()?.contains_key(domain) {
            return Ok(false);
        }
        self.update(|entries| entries.remove(domain).is_some())
    }

    /// All cached domains, sorted.
    pub fn domains(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read()?.keys().cloned().collect())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.read()?.is_empty())
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.update(BTreeMap::clear)
    }

    // ── Internals ──

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, String>>, StoreError> {
        self.entries
            .read()
            .map_err(|_| StoreError::Other("domain cache lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, String>>, StoreError> {
        self.entries
            .write()
            .map_err(|_| StoreError::Other("domain cache lock poisoned".into()))
    }

    /// Apply `change` to a copy of the map; the copy replaces the live map
    /// only once it is on disk.
    fn update<R>(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, String>) -> R,
    ) -> Result<R, StoreError> {
        let mut entries = self.write()?;
        let mut next = entries.clone();
        let out = change(&mut next);
        self.flush(&next)?;
        *entries = next;
        Ok(out)
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        serde_json::to_writer_pretty(&mut tmp, entries)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.persist(path)?;
        Ok(())
    }
}

impl Default for DomainStore {
    fn default() -> Self {
        Self::open()
    }
}
