// Durable key-value storage backing the session tokens

use anyhow::{Context, Result};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Synchronous key-value storage that survives a process restart.
///
/// Best-effort: implementations log failures instead of returning them, so a
/// broken disk never takes the session down with it.
pub trait DurableStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    /// Remove every key
    fn clear(&self);
}

/// In-memory storage, used when nothing durable is available
#[derive(Default)]
pub struct MemoryStorage {
    entries: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

/// JSON file storage, one flat object of string values
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open storage at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match load_entries(&path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Starting with empty session storage: {:#}", e);
                BTreeMap::new()
            }
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "Session storage opened");

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply a mutation and write the result to disk under the same lock
    fn mutate(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut entries);

        if let Err(e) = persist_entries(&self.path, &entries) {
            tracing::error!(path = %self.path.display(), "Failed to persist session storage: {:#}", e);
        }
    }
}

impl DurableStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        });
    }

    fn remove(&self, key: &str) {
        self.mutate(|entries| {
            entries.remove(key);
        });
    }

    fn clear(&self) {
        self.mutate(|entries| entries.clear());
    }
}

fn load_entries(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write to a sibling temp file, then rename over the target
fn persist_entries(path: &Path, entries: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let json = serde_json::to_string_pretty(entries).context("Failed to serialize storage")?;
    let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));

    std::fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
    }

    Ok(())
}
