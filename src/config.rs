//! Configuration Module
//!
//! Process-wide defaults, per-handler options, and the overlay that turns the
//! two into the configuration a handler runs with.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::key::KeyStrategy;
use crate::persist::PersistMedia;

/// Post-processing hook applied to producer output.
pub type GetDataFn<T> = dyn Fn(T) -> T + Send + Sync;

/// Gate deciding whether a producer result may be cached.
pub type CanCacheFn<T> = dyn Fn(&T) -> bool + Send + Sync;

// == Default Config ==
/// Defaults every new handler starts from.
#[derive(Debug, Clone)]
pub struct DefaultConfig {
    /// Time to live of committed entries, zero = never expires
    pub max_age: Duration,
    /// Verbose diagnostics
    pub debug: bool,
    /// Storage backend for persisted snapshots
    pub persist_media: PersistMedia,
    /// Entries living at most this long get a proactive eviction timer
    pub timer_eviction_limit: Duration,
}

impl DefaultConfig {
    /// Creates a DefaultConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMO_MAX_AGE` - TTL in seconds, fractions allowed (default: 0, never expires)
    /// - `MEMO_DEBUG` - `1` or `true` enables diagnostics (default: off)
    /// - `MEMO_PERSIST_DIR` - directory for file-backed persistence (default: session storage)
    /// - `MEMO_TIMER_LIMIT` - proactive eviction limit in seconds (default: 300)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let seconds = |name: &str| {
            lookup(name)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        };

        Self {
            max_age: seconds("MEMO_MAX_AGE").unwrap_or(defaults.max_age),
            debug: lookup("MEMO_DEBUG")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.debug),
            persist_media: lookup("MEMO_PERSIST_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(|dir| PersistMedia::Local(PathBuf::from(dir)))
                .unwrap_or(defaults.persist_media),
            timer_eviction_limit: seconds("MEMO_TIMER_LIMIT")
                .unwrap_or(defaults.timer_eviction_limit),
        }
    }
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::ZERO,
            debug: false,
            persist_media: PersistMedia::Session,
            timer_eviction_limit: Duration::from_secs(300),
        }
    }
}

// == Cache Options ==
/// Per-handler options; unset fields fall back to [`DefaultConfig`].
pub struct CacheOptions<T> {
    pub max_age: Option<Duration>,
    pub key: KeyStrategy,
    /// Persist identifier, unique per context
    pub persist: Option<String>,
    pub persist_media: Option<PersistMedia>,
    pub debug: Option<bool>,
    pub get_data: Option<Arc<GetDataFn<T>>>,
    pub can_cache: Option<Arc<CanCacheFn<T>>>,
}

impl<T> Default for CacheOptions<T> {
    fn default() -> Self {
        Self {
            max_age: None,
            key: KeyStrategy::default(),
            persist: None,
            persist_media: None,
            debug: None,
            get_data: None,
            can_cache: None,
        }
    }
}

impl<T> Clone for CacheOptions<T> {
    fn clone(&self) -> Self {
        Self {
            max_age: self.max_age,
            key: self.key.clone(),
            persist: self.persist.clone(),
            persist_media: self.persist_media.clone(),
            debug: self.debug,
            get_data: self.get_data.clone(),
            can_cache: self.can_cache.clone(),
        }
    }
}

impl<T> fmt::Debug for CacheOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("max_age", &self.max_age)
            .field("key", &self.key)
            .field("persist", &self.persist)
            .field("persist_media", &self.persist_media)
            .field("debug", &self.debug)
            .field("get_data", &self.get_data.is_some())
            .field("can_cache", &self.can_cache.is_some())
            .finish()
    }
}

impl<T> CacheOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn key(mut self, key: KeyStrategy) -> Self {
        self.key = key;
        self
    }

    pub fn persist(mut self, id: impl Into<String>) -> Self {
        self.persist = Some(id.into());
        self
    }

    pub fn persist_media(mut self, media: PersistMedia) -> Self {
        self.persist_media = Some(media);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn get_data(mut self, f: impl Fn(T) -> T + Send + Sync + 'static) -> Self {
        self.get_data = Some(Arc::new(f));
        self
    }

    pub fn can_cache(mut self, f: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.can_cache = Some(Arc::new(f));
        self
    }

    // == Resolve ==
    /// Overlays these options on a defaults snapshot.
    pub fn resolve(self, defaults: &DefaultConfig) -> EffectiveConfig<T> {
        EffectiveConfig {
            max_age: self.max_age.unwrap_or(defaults.max_age),
            debug: self.debug.unwrap_or(defaults.debug),
            key: self.key,
            persist: self.persist,
            persist_media: self
                .persist_media
                .unwrap_or_else(|| defaults.persist_media.clone()),
            timer_eviction_limit: defaults.timer_eviction_limit,
            get_data: self.get_data,
            can_cache: self.can_cache,
        }
    }
}

// == Effective Config ==
/// Configuration captured by a handler at construction.
pub struct EffectiveConfig<T> {
    pub max_age: Duration,
    pub debug: bool,
    pub key: KeyStrategy,
    pub persist: Option<String>,
    pub persist_media: PersistMedia,
    pub timer_eviction_limit: Duration,
    pub get_data: Option<Arc<GetDataFn<T>>>,
    pub can_cache: Option<Arc<CanCacheFn<T>>>,
}

impl<T> fmt::Debug for EffectiveConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectiveConfig")
            .field("max_age", &self.max_age)
            .field("debug", &self.debug)
            .field("key", &self.key)
            .field("persist", &self.persist)
            .field("persist_media", &self.persist_media)
            .field("timer_eviction_limit", &self.timer_eviction_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = DefaultConfig::default();
        assert_eq!(config.max_age, Duration::ZERO);
        assert!(!config.debug);
        assert!(matches!(config.persist_media, PersistMedia::Session));
        assert_eq!(config.timer_eviction_limit, Duration::from_secs(300));
    }

    #[test]
    fn test_config_from_empty_env() {
        let config = DefaultConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.max_age, Duration::ZERO);
        assert!(!config.debug);
        assert!(matches!(config.persist_media, PersistMedia::Session));
    }

    #[test]
    fn test_config_from_env_values() {
        let config = DefaultConfig::from_lookup(lookup_from(&[
            ("MEMO_MAX_AGE", "1.5"),
            ("MEMO_DEBUG", "true"),
            ("MEMO_PERSIST_DIR", "/tmp/memo"),
            ("MEMO_TIMER_LIMIT", "10"),
        ]));
        assert_eq!(config.max_age, Duration::from_millis(1500));
        assert!(config.debug);
        assert!(matches!(config.persist_media, PersistMedia::Local(ref p) if p == &PathBuf::from("/tmp/memo")));
        assert_eq!(config.timer_eviction_limit, Duration::from_secs(10));
    }

    #[test]
    fn test_config_ignores_garbage() {
        let config = DefaultConfig::from_lookup(lookup_from(&[
            ("MEMO_MAX_AGE", "soon"),
            ("MEMO_TIMER_LIMIT", "-4"),
        ]));
        assert_eq!(config.max_age, Duration::ZERO);
        assert_eq!(config.timer_eviction_limit, Duration::from_secs(300));
    }

    #[test]
    fn test_options_overlay_defaults() {
        let defaults = DefaultConfig {
            max_age: Duration::from_secs(60),
            debug: true,
            ..DefaultConfig::default()
        };

        let effective = CacheOptions::<u32>::new().debug(false).resolve(&defaults);
        assert_eq!(effective.max_age, Duration::from_secs(60));
        assert!(!effective.debug);

        let effective = CacheOptions::<u32>::new()
            .max_age(Duration::from_secs(5))
            .resolve(&defaults);
        assert_eq!(effective.max_age, Duration::from_secs(5));
        assert!(effective.debug);
    }
}
