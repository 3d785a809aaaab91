//! Local ephemeral draft stores
//!
//! Drafts are recovery copies of unsaved work, keyed by record identity.
//! They are never a durable save.

use crate::StoreError;
use keel_domain::DraftStore;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

const DRAFT_EXTENSION: &str = "json";

/// Drafts as one file per key in a directory
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash mid-write leaves the previous draft intact.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    dir: PathBuf,
}

impl FileDraftStore {
    /// Use `dir` for drafts, creating it if needed
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the drafts
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keys of every stored draft, sorted
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DRAFT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Remove every draft, returning how many were removed
    pub fn clear(&mut self) -> Result<usize, StoreError> {
        let keys = self.keys()?;
        for key in &keys {
            self.remove(key)?;
        }
        Ok(keys.len())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.{}", name, DRAFT_EXTENSION))
    }
}

impl DraftStore for FileDraftStore {
    type Error = StoreError;

    fn put(&mut self, key: &str, payload: &str) -> Result<(), Self::Error> {
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&mut self, key: &str) -> Result<(), Self::Error> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory drafts
///
/// Clones share the same entries, so a caller can keep a handle to inspect
/// drafts written by a session that owns another clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryDraftStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryDraftStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored drafts
    pub fn len(&self) -> usize {
        self.entries().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether no draft is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.entries.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl DraftStore for MemoryDraftStore {
    type Error = StoreError;

    fn put(&mut self, key: &str, payload: &str) -> Result<(), Self::Error> {
        self.entries()?.insert(key.to_string(), payload.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn remove(&mut self, key: &str) -> Result<(), Self::Error> {
        self.entries()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_clones_share_entries() {
        let mut store = MemoryDraftStore::new();
        let observer = store.clone();

        store.put("draft:a", "{}").unwrap();
        assert_eq!(observer.get("draft:a").unwrap().as_deref(), Some("{}"));
        assert_eq!(observer.len(), 1);

        store.remove("draft:a").unwrap();
        assert!(observer.is_empty());
    }

    #[test]
    fn test_file_key_is_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path()).unwrap();
        let path = store.path_for("draft:01/../x");
        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(path.file_name().unwrap(), "draft_01____x.json");
    }
}
