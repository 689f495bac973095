//! Expiry Timer
//!
//! One-shot task that evicts a committed entry after its TTL, so short-lived
//! entries do not linger when their key is never probed again. Lazy eviction
//! on probe stays authoritative; this only reclaims memory early.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

/// Spawns a task that runs `evict` once `delay` has elapsed.
///
/// Returns `None` when called outside a Tokio runtime, in which case the entry
/// is left to lazy eviction.
///
/// # Arguments
/// * `delay` - Time until the entry expires
/// * `evict` - Eviction callback; must itself check the entry is still the expired one
pub fn spawn_expiry_timer<F>(delay: Duration, evict: F) -> Option<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let handle = Handle::try_current().ok()?;

    Some(handle.spawn(async move {
        tokio::time::sleep(delay).await;
        trace!(?delay, "Expiry timer fired");
        evict();
    }))
}
