//! Storage Backends
//!
//! Key/value stores that hold persisted snapshots, one string per slot.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tempfile::NamedTempFile;

use crate::error::StorageError;

// == Storage Trait ==
/// Minimal key/value capability used for persistence.
pub trait Storage: Send + Sync {
    fn get(&self, slot: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, slot: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, slot: &str) -> Result<(), StorageError>;

    /// Number of occupied slots.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == Persist Media ==
/// Storage backend selector.
#[derive(Clone, Default)]
pub enum PersistMedia {
    /// In-memory store shared by every handler of the same context
    #[default]
    Session,
    /// One file per slot under the given directory
    Local(PathBuf),
    /// Caller-supplied backend
    Custom(Arc<dyn Storage>),
}

impl fmt::Debug for PersistMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistMedia::Session => f.write_str("Session"),
            PersistMedia::Local(dir) => f.debug_tuple("Local").field(dir).finish(),
            PersistMedia::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// == Memory Storage ==
/// Session-scoped store living as long as its owner.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: RwLock<HashMap<String, String>>,
    /// Maximum total bytes of all values, if bounded
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that rejects writes pushing it past `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            quota: Some(quota),
        }
    }
}

impl Storage for MemoryStorage {
    fn get(&self, slot: &str) -> Result<Option<String>, StorageError> {
        Ok(self.slots.read().get(slot).cloned())
    }

    fn set(&self, slot: &str, value: &str) -> Result<(), StorageError> {
        let mut slots = self.slots.write();
        if let Some(quota) = self.quota {
            let others: usize = slots
                .iter()
                .filter(|(name, _)| name.as_str() != slot)
                .map(|(_, v)| v.len())
                .sum();
            let needed = others + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }
        slots.insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<(), StorageError> {
        self.slots.write().remove(slot);
        Ok(())
    }

    fn len(&self) -> usize {
        self.slots.read().len()
    }
}

// == File Storage ==
/// Persistent store writing each slot to its own file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens (and creates if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_slot(slot)))
    }
}

/// Maps a slot name onto a portable file name.
fn sanitize_slot(slot: &str) -> String {
    slot.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl Storage for FileStorage {
    fn get(&self, slot: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(slot)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, slot: &str, value: &str) -> Result<(), StorageError> {
        // each write gets its own temp file, renamed over the slot once complete
        let mut temp_file = NamedTempFile::new_in(&self.dir)?;
        temp_file.write_all(value.as_bytes())?;
        temp_file.flush()?;
        temp_file
            .persist(self.path_for(slot))
            .map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(slot)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn len(&self) -> usize {
        fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
                    .count()
            })
            .unwrap_or(0)
    }
}
