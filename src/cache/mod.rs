//! Cache Module
//!
//! Entry table with lazy TTL expiry and in-flight registrations.

mod entry;
mod order;
mod stats;
mod table;


// Re-export public types
pub use entry::{current_timestamp_ms, duration_ms, CacheEntry};
pub use order::InsertionOrder;
pub use stats::CacheStats;
pub use table::{EntryTable, EntryView, Slot};
