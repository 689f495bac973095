//! Background Tasks Module
//!
//! Tokio tasks spawned by handlers.
//!
//! # Tasks
//! - Expiry timer: one-shot eviction of a short-lived entry once its TTL elapses

mod expiry;

pub use expiry::spawn_expiry_timer;
