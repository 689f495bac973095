//! Persistence Module
//!
//! Snapshot persistence of committed entries into pluggable storage.

mod registry;
mod snapshot;
mod storage;

// Re-export public types
pub use registry::PersistRegistry;
pub use snapshot::{slot_name, PersistAdapter, SLOT_PREFIX};
pub use storage::{FileStorage, MemoryStorage, PersistMedia, Storage};
