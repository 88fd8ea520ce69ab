//! Persisted key-value facts shared between the call observer and the
//! call-match source.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::FactStoreError;
use crate::platform::{FactChange, FactStore};

/// Name of the most recent identified caller.
pub const LAST_CALLER_NAME: &str = "last_caller_name";

/// Epoch milliseconds of the most recent identified call.
pub const LAST_CALL_TIMESTAMP: &str = "last_call_timestamp";

const CHANGE_BUFFER: usize = 64;

/// Fact store backed by a single JSON document on disk.
///
/// The whole document is rewritten on every write (temp file + rename).
pub struct JsonFactStore {
    path: PathBuf,
    facts: RwLock<BTreeMap<String, String>>,
    changes: broadcast::Sender<FactChange>,
}

impl JsonFactStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, FactStoreError> {
        let path = path.into();
        let facts = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| FactStoreError::Read {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&contents).map_err(|source| FactStoreError::Corrupt {
                path: path.clone(),
                source,
            })?
        } else {
            BTreeMap::new()
        };

        info!(path = %path.display(), facts = facts.len(), "Opened fact store");
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Ok(Self {
            path,
            facts: RwLock::new(facts),
            changes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, facts: &BTreeMap<String, String>) -> Result<(), FactStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| FactStoreError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(facts)?;
        fs::write(&tmp, bytes).map_err(|source| FactStoreError::Write {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            FactStoreError::Write {
                path: self.path.clone(),
                source,
            }
        })
    }
}

impl FactStore for JsonFactStore {
    fn get(&self, key: &str) -> Option<String> {
        self.facts.read().get(key).cloned()
    }

    fn put_all(&self, entries: &[(&str, String)]) -> Result<(), FactStoreError> {
        {
            // Only a document that reached disk becomes visible.
            let mut facts = self.facts.write();
            let mut next = facts.clone();
            for (key, value) in entries {
                next.insert((*key).to_string(), value.clone());
            }
            self.persist(&next)?;
            *facts = next;
        }

        let keys: Vec<String> = entries.iter().map(|(k, _)| (*k).to_string()).collect();
        debug!(keys = ?keys, "Facts written");
        let _ = self.changes.send(FactChange { keys });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<FactChange> {
        self.changes.subscribe()
    }
}

/// Volatile fact store for tests and simulations.
pub struct InMemoryFactStore {
    facts: RwLock<BTreeMap<String, String>>,
    changes: broadcast::Sender<FactChange>,
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            facts: RwLock::new(BTreeMap::new()),
            changes,
        }
    }

    /// Store pre-seeded with a caller name.
    pub fn with_caller(name: impl Into<String>) -> Self {
        let store = Self::new();
        store
            .facts
            .write()
            .insert(LAST_CALLER_NAME.to_string(), name.into());
        store
    }
}

impl Default for InMemoryFactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FactStore for InMemoryFactStore {
    fn get(&self, key: &str) -> Option<String> {
        self.facts.read().get(key).cloned()
    }

    fn put_all(&self, entries: &[(&str, String)]) -> Result<(), FactStoreError> {
        {
            let mut facts = self.facts.write();
            for (key, value) in entries {
                facts.insert((*key).to_string(), value.clone());
            }
        }
        let keys = entries.iter().map(|(k, _)| (*k).to_string()).collect();
        let _ = self.changes.send(FactChange { keys });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<FactChange> {
        self.changes.subscribe()
    }
}
