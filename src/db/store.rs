// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Key-value stores backing the credential cache.
//!
//! The interface is deliberately string-to-string so that any durable
//! key-value backend can stand in for it.

use crate::error::AppError;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Durable string key-value store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
    fn remove(&self, key: &str) -> Result<(), AppError>;
}

/// In-memory store, used in tests and when no persistence is wanted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`.
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let store = Self::new();
        for (k, v) in entries {
            store.entries.insert(k.to_string(), v.to_string());
        }
        store
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store persisted as a flat JSON object on disk.
///
/// Every mutation rewrites the file (write to a sibling temp file, then
/// rename) so a crash never leaves a half-written credential file.
pub struct JsonFileStore {
    path: PathBuf,
    entries: DashMap<String, String>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is
    /// logged and treated as empty rather than failing startup.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = DashMap::new();

        match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, String>>(&bytes) {
                Ok(map) => {
                    for (k, v) in map {
                        entries.insert(k, v);
                    }
                    tracing::debug!(path = %path.display(), count = entries.len(), "Loaded credential store");
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Failed to parse credential store, starting empty");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to read credential store, starting empty");
            }
        }

        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), AppError> {
        let snapshot: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let payload = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| AppError::Storage(format!("Failed to encode store: {}", e)))?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .map_err(|e| AppError::Storage(format!("Failed to create {}: {}", dir.display(), e)))?;

        // The temp file must live in the same directory for the rename to be atomic
        let mut tmp = NamedTempFile::new_in(dir)
            .map_err(|e| AppError::Storage(format!("Failed to create temp file in {}: {}", dir.display(), e)))?;
        tmp.write_all(&payload)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", tmp.path().display(), e)))?;
        tmp.persist(&self.path)
            .map_err(|e| AppError::Storage(format!("Failed to replace {}: {}", self.path.display(), e.error)))?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        if self.entries.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}
