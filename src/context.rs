//! Cache Context
//!
//! Shared state handlers are built against: the mutable defaults, the persist
//! identifier registry and the session storage. The process-wide instance is
//! [`CacheContext::global`]; tests build isolated ones with [`CacheContext::new`].

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::config::DefaultConfig;
use crate::error::Result;
use crate::persist::{FileStorage, MemoryStorage, PersistMedia, PersistRegistry, Storage};

#[derive(Debug)]
struct ContextInner {
    defaults: RwLock<DefaultConfig>,
    registry: PersistRegistry,
    session: Arc<MemoryStorage>,
}

/// Cheaply cloneable handle to shared cache state.
#[derive(Debug, Clone)]
pub struct CacheContext {
    inner: Arc<ContextInner>,
}

static GLOBAL: OnceLock<CacheContext> = OnceLock::new();

impl Default for CacheContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheContext {
    /// Creates an isolated context with built-in defaults.
    pub fn new() -> Self {
        Self::with_defaults(DefaultConfig::default())
    }

    pub fn with_defaults(defaults: DefaultConfig) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                defaults: RwLock::new(defaults),
                registry: PersistRegistry::new(),
                session: Arc::new(MemoryStorage::new()),
            }),
        }
    }

    /// Process-wide context, with defaults read from the environment on first use.
    pub fn global() -> &'static CacheContext {
        GLOBAL.get_or_init(|| Self::with_defaults(DefaultConfig::from_env()))
    }

    // == Defaults ==
    /// Snapshot of the current defaults.
    pub fn defaults(&self) -> DefaultConfig {
        self.inner.defaults.read().clone()
    }

    /// Updates the defaults. Handlers built earlier keep their configuration.
    pub fn set_defaults(&self, update: impl FnOnce(&mut DefaultConfig)) {
        let mut defaults = self.inner.defaults.write();
        update(&mut defaults);
        debug!(?defaults, "Cache defaults updated");
    }

    pub fn registry(&self) -> &PersistRegistry {
        &self.inner.registry
    }

    pub fn session_storage(&self) -> Arc<MemoryStorage> {
        Arc::clone(&self.inner.session)
    }

    // == Open Storage ==
    /// Resolves a media selector to a storage backend.
    pub fn open_storage(&self, media: &PersistMedia) -> Result<Arc<dyn Storage>> {
        let storage: Arc<dyn Storage> = match media {
            PersistMedia::Session => self.session_storage(),
            PersistMedia::Local(dir) => Arc::new(FileStorage::open(dir.clone())?),
            PersistMedia::Custom(storage) => Arc::clone(storage),
        };
        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_set_defaults() {
        let ctx = CacheContext::new();

        ctx.set_defaults(|d| d.max_age = Duration::from_secs(30));

        assert_eq!(ctx.defaults().max_age, Duration::from_secs(30));
    }

    #[test]
    fn test_contexts_are_isolated() {
        let a = CacheContext::new();
        let b = CacheContext::new();

        a.registry().claim("users").unwrap();
        assert!(!b.registry().is_claimed("users"));
        assert!(!Arc::ptr_eq(&a.session_storage(), &b.session_storage()));
    }

    #[test]
    fn test_clones_share_state() {
        let a = CacheContext::new();
        let b = a.clone();

        b.set_defaults(|d| d.debug = true);
        assert!(a.defaults().debug);
    }

    #[test]
    fn test_open_session_storage_is_shared() {
        let ctx = CacheContext::new();

        let storage = ctx.open_storage(&PersistMedia::Session).unwrap();
        storage.set("slot", "v").unwrap();

        assert_eq!(ctx.session_storage().get("slot").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_open_local_storage() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = CacheContext::new();

        let storage = ctx
            .open_storage(&PersistMedia::Local(dir.path().to_path_buf()))
            .unwrap();
        storage.set("slot", "v").unwrap();
        assert_eq!(storage.len(), 1);
    }
}
