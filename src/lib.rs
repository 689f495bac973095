//! Memo Task - memoization for async producers
//!
//! Collapses concurrent duplicate calls into one producer run, serves results
//! for a configurable time to live, and optionally persists committed results
//! to a key/value store so a later handler can reload them.

pub mod cache;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod key;
pub mod persist;
pub mod tasks;

pub use codec::{JsonCodec, PayloadCodec};
pub use config::{CacheOptions, DefaultConfig};
pub use context::CacheContext;
pub use error::{MemoError, Result};
pub use handler::{memoize, CacheHandler, Lookup, Task};
pub use key::{Arg, CallArgs, KeyStrategy, ToArg, DEFAULT_KEY};
pub use persist::{FileStorage, MemoryStorage, PersistMedia, Storage};
