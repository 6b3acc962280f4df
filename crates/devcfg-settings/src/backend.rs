//! Key-value backends for the settings namespace.
//!
//! A backend is the flash-storage primitive: it stores typed values under
//! string keys and can wipe the whole namespace. It does no validation of
//! its own beyond reporting I/O failures.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::{SettingsError, SettingsResult};
use crate::value::SettingValue;

/// Storage for one settings namespace.
pub trait KvBackend: Send {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Option<SettingValue>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// On error nothing is changed.
    fn put(&mut self, key: &str, value: SettingValue) -> SettingsResult<()>;

    /// Remove `key`. Removing an absent key succeeds.
    fn remove(&mut self, key: &str) -> SettingsResult<()>;

    /// Remove every key in the namespace.
    fn clear(&mut self) -> SettingsResult<()>;

    /// Apply several mutations as one unit: either all of them land or none.
    fn write_batch(&mut self, writes: Vec<KvWrite>) -> SettingsResult<()>;

    /// All keys currently stored, in sorted order.
    fn keys(&self) -> Vec<String>;
}

/// One mutation inside a [`KvBackend::write_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvWrite {
    /// Store a value under a key.
    Put(String, SettingValue),
    /// Remove a key.
    Remove(String),
}

impl KvWrite {
    /// Key touched by this mutation.
    pub fn key(&self) -> &str {
        match self {
            KvWrite::Put(key, _) | KvWrite::Remove(key) => key,
        }
    }

    fn apply(self, entries: &mut BTreeMap<String, SettingValue>) {
        match self {
            KvWrite::Put(key, value) => {
                entries.insert(key, value);
            }
            KvWrite::Remove(key) => {
                entries.remove(&key);
            }
        }
    }
}

// ============================================================================
// Memory Backend
// ============================================================================

/// Volatile backend, mainly for tests and dry runs.
///
/// Writes can be made to fail through the switch returned by
/// [`MemoryBackend::failure_switch`], which simulates a worn or full flash
/// partition.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: BTreeMap<String, SettingValue>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryBackend {
    /// Create an empty memory backend.
    pub fn new() -> Self {
        MemoryBackend::default()
    }

    /// Shared flag that, while set, makes every mutation fail.
    pub fn failure_switch(&self) -> Arc<AtomicBool> {
        self.fail_writes.clone()
    }

    fn check_writable(&self, key: &str) -> SettingsResult<()> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(SettingsError::WriteRejected(key.to_string()));
        }
        Ok(())
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<SettingValue> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: SettingValue) -> SettingsResult<()> {
        self.check_writable(key)?;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> SettingsResult<()> {
        self.check_writable(key)?;
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> SettingsResult<()> {
        self.check_writable("*")?;
        self.entries.clear();
        Ok(())
    }

    fn write_batch(&mut self, writes: Vec<KvWrite>) -> SettingsResult<()> {
        if let Some(first) = writes.first() {
            self.check_writable(first.key())?;
        }
        for write in writes {
            write.apply(&mut self.entries);
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

// ============================================================================
// File Backend
// ============================================================================

/// Backend persisting one namespace as a JSON document.
///
/// The namespace `settings` in directory `dir` lives in
/// `dir/settings.json`. Every mutation rewrites the document through a
/// temporary file and a rename, so a crash leaves either the old or the new
/// document on disk.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    entries: BTreeMap<String, SettingValue>,
}

impl FileBackend {
    /// Open (or create) the namespace `namespace` under `dir`.
    pub fn open(dir: impl AsRef<Path>, namespace: &str) -> SettingsResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| SettingsError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(format!("{}.json", namespace));
        let entries = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|source| SettingsError::Io {
                path: path.clone(),
                source,
            })?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&text).map_err(|source| SettingsError::Corrupt {
                    path: path.clone(),
                    source,
                })?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), keys = entries.len(), "opened settings namespace");
        Ok(FileBackend { path, entries })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, SettingValue>) -> SettingsResult<()> {
        let text = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source| SettingsError::Io {
            path: tmp.clone(),
            source,
        };

        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(text.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Apply `change` to a copy of the entries and commit it only if the
    /// copy was persisted.
    fn commit<F>(&mut self, change: F) -> SettingsResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, SettingValue>),
    {
        let mut next = self.entries.clone();
        change(&mut next);
        self.persist(&next)?;
        self.entries = next;
        Ok(())
    }
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> Option<SettingValue> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: SettingValue) -> SettingsResult<()> {
        let key = key.to_string();
        self.commit(move |entries| {
            entries.insert(key, value);
        })
    }

    fn remove(&mut self, key: &str) -> SettingsResult<()> {
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        self.commit(|entries| {
            entries.remove(key);
        })
    }

    fn clear(&mut self) -> SettingsResult<()> {
        self.commit(|entries| entries.clear())
    }

    fn write_batch(&mut self, writes: Vec<KvWrite>) -> SettingsResult<()> {
        if writes.is_empty() {
            return Ok(());
        }
        self.commit(move |entries| {
            for write in writes {
                write.apply(entries);
            }
        })
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}
