//! Key Module
//!
//! Derives cache keys from call arguments.

mod arg;
mod derive;


// Re-export public types
pub use arg::{Arg, CallArgs, Primitive, ToArg};
pub use derive::{derive_key, transform, KeyFn, KeyStrategy, DEFAULT_KEY, TYPE_MARKER};
