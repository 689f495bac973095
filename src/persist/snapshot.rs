//! Snapshot Persistence
//!
//! Mirrors committed entries to one storage slot as a JSON array of
//! `[key, {"expire": ms, "data": payload}]` pairs. Writes always replace the
//! whole snapshot.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::cache::{current_timestamp_ms, CacheEntry};
use crate::error::{CodecError, MemoError, Result};
use crate::persist::Storage;

// == Public Constants ==
/// Prefix of every storage slot name.
pub const SLOT_PREFIX: &str = "memo_task:";

/// Storage slot name for a persist identifier.
pub fn slot_name(id: &str) -> String {
    format!("{}{}", SLOT_PREFIX, id)
}

// == Persist Adapter ==
/// Loads and saves the snapshot of one handler.
#[derive(Clone)]
pub struct PersistAdapter {
    slot: String,
    storage: Arc<dyn Storage>,
}

impl fmt::Debug for PersistAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistAdapter")
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl PersistAdapter {
    /// Creates an adapter for an already-claimed identifier.
    pub fn new(id: &str, storage: Arc<dyn Storage>) -> Self {
        Self {
            slot: slot_name(id),
            storage,
        }
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    // == Load ==
    /// Reads the stored snapshot, dropping entries that expired while stored.
    ///
    /// An absent slot yields an empty snapshot.
    ///
    /// # Errors
    /// - [`MemoError::Storage`] if the slot cannot be read
    /// - [`MemoError::CorruptSnapshot`] if the stored text does not parse
    pub fn load(&self) -> Result<Vec<(String, CacheEntry)>> {
        let Some(raw) = self.storage.get(&self.slot)? else {
            return Ok(Vec::new());
        };

        let entries: Vec<(String, CacheEntry)> =
            serde_json::from_str(&raw).map_err(|source| MemoError::CorruptSnapshot {
                slot: self.slot.clone(),
                source,
            })?;

        let now = current_timestamp_ms();
        let total = entries.len();
        let live: Vec<_> = entries
            .into_iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .collect();
        debug!(
            slot = %self.slot,
            loaded = live.len(),
            expired = total - live.len(),
            "Loaded persisted snapshot"
        );
        Ok(live)
    }

    // == Save ==
    /// Replaces the stored snapshot; an empty snapshot removes the slot.
    ///
    /// # Errors
    /// - [`MemoError::Storage`] if the write fails, e.g. on quota exhaustion
    pub fn save(&self, entries: &[(String, CacheEntry)]) -> Result<()> {
        if entries.is_empty() {
            self.storage.remove(&self.slot)?;
            return Ok(());
        }

        let raw = serde_json::to_string(entries).map_err(CodecError::Encode)?;
        self.storage.set(&self.slot, &raw)?;
        Ok(())
    }
}
