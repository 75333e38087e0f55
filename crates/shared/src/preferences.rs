use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write as _};
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};

use crate::spicyness::Spicyness;

pub const CONTEXT_KEY: &str = "conspiracyContext";
pub const SPICYNESS_KEY: &str = "spicyness";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    pub context: String,
    pub spicyness: Spicyness,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read preference storage at {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write preference storage at {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("preference storage at {path} is not a JSON object of strings: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("failed to save {key}: {source}")]
    Save { key: &'static str, source: StorageError },
}

/// Synchronous string key-value storage.
pub trait KeyValueStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Key-value storage backed by a single JSON object file.
///
/// Every write rewrites the whole file through a sibling temp file and a
/// rename, so a crash never leaves a half-written file behind.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let write_err = |source| StorageError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let encoded = serde_json::to_vec_pretty(entries)
            .map_err(|err| write_err(io::Error::new(io::ErrorKind::InvalidData, err)))?;
        let temp_path = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path).map_err(write_err)?;
        file.write_all(&encoded).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        fs::rename(&temp_path, &self.path).map_err(write_err)
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        // A corrupt file is replaced rather than blocking every future save.
        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(err @ StorageError::Corrupt { .. }) => {
                warn!(error = %err, "overwriting unreadable preference storage");
                BTreeMap::new()
            }
            Err(err) => return Err(err),
        };
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries)
    }
}

/// Persists the two user preferences across sessions.
#[derive(Debug, Clone)]
pub struct PreferenceStore<S> {
    storage: S,
}

impl<S: KeyValueStorage> PreferenceStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Writes both values. An empty context is not written, so a previously
    /// saved context survives; spicyness is always written.
    pub fn save(&mut self, context: &str, spicyness: Spicyness) -> Result<(), PreferenceError> {
        if !context.is_empty() {
            self.storage
                .set(CONTEXT_KEY, context)
                .map_err(|source| PreferenceError::Save {
                    key: CONTEXT_KEY,
                    source,
                })?;
        }

        self.storage
            .set(SPICYNESS_KEY, &spicyness.to_string())
            .map_err(|source| PreferenceError::Save {
                key: SPICYNESS_KEY,
                source,
            })?;

        debug!(spicyness = spicyness.value(), "preferences saved");
        Ok(())
    }

    /// Reads stored values over the defaults. Read failures and unparseable
    /// values are logged and leave the default in place.
    pub fn load(&self) -> Preferences {
        let mut preferences = Preferences::default();

        if let Some(context) = self.read(CONTEXT_KEY).filter(|value| !value.is_empty()) {
            preferences.context = context;
        }

        if let Some(raw) = self.read(SPICYNESS_KEY).filter(|value| !value.is_empty()) {
            match Spicyness::parse(&raw) {
                Some(spicyness) => preferences.spicyness = spicyness,
                None => warn!(value = %raw, "ignoring unparseable stored spicyness"),
            }
        }

        preferences
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "failed to read stored preference; using default");
                None
            }
        }
    }
}
