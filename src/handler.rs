//! Cache Handler
//!
//! Memoizes one async producer: derives a key per call, serves live entries,
//! collapses concurrent calls with the same key into one producer run, and
//! commits or evicts the provisional entry once that run settles.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, MutexGuard};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use crate::cache::{current_timestamp_ms, CacheEntry, CacheStats, EntryTable, EntryView, Slot};
use crate::codec::{JsonCodec, PayloadCodec};
use crate::config::{CacheOptions, EffectiveConfig};
use crate::context::CacheContext;
use crate::error::{MemoError, Result};
use crate::key::{CallArgs, DEFAULT_KEY};
use crate::persist::PersistAdapter;
use crate::tasks::spawn_expiry_timer;

/// Eventual outcome of one memoized call.
pub type Task<T, E> = BoxFuture<'static, std::result::Result<T, E>>;

type SharedTask<T, E> = Shared<Task<T, E>>;
type Producer<A, T, E> = dyn Fn(A) -> Task<T, E> + Send + Sync;

// == Lookup ==
/// Result of probing a key without calling the producer.
pub enum Lookup<T, E> {
    /// Committed value, decoded into a fresh copy
    Ready(T),
    /// Producer call still running
    Pending(Task<T, E>),
}

impl<T: Send + 'static, E: Send + 'static> Lookup<T, E> {
    /// Awaitable form of either variant.
    pub fn into_task(self) -> Task<T, E> {
        match self {
            Lookup::Ready(value) => future::ready(Ok(value)).boxed(),
            Lookup::Pending(task) => task,
        }
    }
}

impl<T, E> Lookup<T, E> {
    pub fn ready(self) -> Option<T> {
        match self {
            Lookup::Ready(value) => Some(value),
            Lookup::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Lookup::Pending(_))
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Lookup<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Lookup::Pending(_) => f.write_str("Pending"),
        }
    }
}

struct Inner<A, T, E, C> {
    producer: Arc<Producer<A, T, E>>,
    table: Mutex<EntryTable<SharedTask<T, E>>>,
    config: EffectiveConfig<T>,
    persist: Option<PersistAdapter>,
    /// Serializes snapshot writes in the order their snapshots were taken
    save_lock: Mutex<()>,
    codec: C,
}

// == Cache Handler ==
/// Memoizing wrapper around an async producer `Fn(A) -> Future<Output = Result<T, E>>`.
///
/// Cloning is cheap and every clone shares the same entry table. Values are
/// cached in encoded form, so each hit hands out an independent copy.
/// Failures are cloned to every caller that joined the failed run.
pub struct CacheHandler<A, T, E, C = JsonCodec> {
    inner: Arc<Inner<A, T, E, C>>,
}

impl<A, T, E, C> Clone for CacheHandler<A, T, E, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, T, E> CacheHandler<A, T, E, JsonCodec>
where
    A: CallArgs + Send + 'static,
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Creates a handler bound to the process-wide [`CacheContext`].
    pub fn new<F, Fut>(producer: F, options: CacheOptions<T>) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        Self::with_context(producer, options, CacheContext::global())
    }

    pub fn with_context<F, Fut>(producer: F, options: CacheOptions<T>, ctx: &CacheContext) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        Self::with_codec(producer, options, ctx, JsonCodec)
    }
}

impl<A, T, E, C> CacheHandler<A, T, E, C>
where
    A: CallArgs + Send + 'static,
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: PayloadCodec,
{
    // == Constructor ==
    /// Creates a handler with an explicit payload codec.
    ///
    /// Captures the context's current defaults, claims the persist identifier
    /// if one is configured and loads its snapshot. Persistence problems are
    /// logged and leave the handler working in memory only.
    pub fn with_codec<F, Fut>(
        producer: F,
        options: CacheOptions<T>,
        ctx: &CacheContext,
        codec: C,
    ) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        let config = options.resolve(&ctx.defaults());
        let persist = config
            .persist
            .as_deref()
            .and_then(|id| open_persistence(ctx, id, &config));

        let mut table = EntryTable::new();
        let mut loaded = Vec::new();
        if let Some(adapter) = &persist {
            match adapter.load() {
                Ok(entries) => {
                    for (key, entry) in entries {
                        loaded.push((key.clone(), entry.expire_at));
                        table.set(&key, entry);
                    }
                }
                Err(e) => {
                    error!(slot = adapter.slot(), error = %e, "Discarding unreadable snapshot");
                }
            }
        }

        let producer: Arc<Producer<A, T, E>> = Arc::new(move |args| producer(args).boxed());
        let inner = Arc::new(Inner {
            producer,
            table: Mutex::new(table),
            config,
            persist,
            save_lock: Mutex::new(()),
            codec,
        });
        for (key, expire_at) in loaded {
            inner.schedule_expiry(&key, expire_at);
        }

        Self { inner }
    }

    // == Invoke ==
    /// Runs the memoized call.
    ///
    /// A miss registers the pending run before this method returns, so a call
    /// with an equivalent key made right after joins it instead of starting a
    /// second producer run. Inside a Tokio runtime the run is driven on a
    /// spawned task and settles even if the returned task is dropped.
    pub fn invoke(&self, args: A) -> Task<T, E> {
        let Some(key) = self.get_cache_key(&args) else {
            self.inner.table.lock().stats_mut().record_uncacheable();
            if self.inner.config.debug {
                debug!("Call arguments have no cache key, running producer uncached");
            }
            return self.inner.run_uncached(args);
        };

        let mut table = self.inner.table.lock();
        match self.inner.lookup(&mut table, &key) {
            Some(Lookup::Ready(value)) => {
                table.stats_mut().record_hit();
                if self.inner.config.debug {
                    debug!(key = %key, "Cache hit");
                }
                return future::ready(Ok(value)).boxed();
            }
            Some(Lookup::Pending(task)) => {
                table.stats_mut().record_join();
                if self.inner.config.debug {
                    debug!(key = %key, "Joining in-flight call");
                }
                return task;
            }
            None => {}
        }

        table.stats_mut().record_miss();
        let (_, task) =
            table.begin_with(&key, |generation| self.inner.start(key.clone(), generation, args));
        drop(table);

        if let Ok(runtime) = Handle::try_current() {
            runtime.spawn(task.clone().map(|_| ()));
        }
        task.boxed()
    }

    /// Directly-callable form of [`invoke`](Self::invoke).
    pub fn memoized(&self) -> impl Fn(A) -> Task<T, E> + Clone + Send + Sync + 'static {
        memoize(self)
    }

    // == Cache Key ==
    /// Key `args` would be cached under, or `None` if they are uncacheable.
    pub fn get_cache_key(&self, args: &A) -> Option<String> {
        self.inner.config.key.cache_key(&args.to_args())
    }

    // == Get ==
    /// Live value under `key` (default key if `None`), without calling the producer.
    pub fn get(&self, key: Option<&str>) -> Option<Lookup<T, E>> {
        let key = key.unwrap_or(DEFAULT_KEY);
        let mut table = self.inner.table.lock();
        self.inner.lookup(&mut table, key)
    }

    // == Set ==
    /// Stores `value` under `key` (default key if `None`), bypassing the producer.
    ///
    /// Returns false, after logging why, if the value could not be stored.
    pub fn set(&self, value: &T, key: Option<&str>) -> bool {
        match self.try_set(value, key) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Cache set rejected");
                false
            }
        }
    }

    /// Fallible form of [`set`](Self::set).
    pub fn try_set(&self, value: &T, key: Option<&str>) -> Result<()> {
        let key = key.unwrap_or(DEFAULT_KEY);
        if key.is_empty() {
            return Err(MemoError::UncacheableArguments);
        }

        let data = self.inner.codec.encode(value)?;
        let entry = CacheEntry::new(data, self.inner.config.max_age);
        let expire_at = entry.expire_at;
        let mut table = self.inner.table.lock();
        table.set(key, entry);
        self.inner.save(table);
        self.inner.schedule_expiry(key, expire_at);
        Ok(())
    }

    // == Has ==
    /// Whether `key` (default key if `None`) is live; evicts it if it has expired.
    pub fn has(&self, key: Option<&str>) -> bool {
        self.inner.table.lock().has(key.unwrap_or(DEFAULT_KEY))
    }

    // == Clear ==
    /// Evicts `key` (default key if `None`) and resyncs persistence.
    pub fn clear(&self, key: Option<&str>) {
        let key = key.unwrap_or(DEFAULT_KEY);
        let mut table = self.inner.table.lock();
        if table.remove(key) && self.inner.config.debug {
            debug!(key = %key, "Cache entry cleared");
        }
        self.inner.save(table);
    }

    /// Evicts every key; the persisted slot is removed.
    pub fn clear_all(&self) {
        let mut table = self.inner.table.lock();
        table.clear();
        self.inner.save(table);
    }

    // == Get All ==
    /// Every entry in insertion order.
    pub fn get_all(&self) -> Vec<(String, EntryView)> {
        self.inner.table.lock().entries()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.table.lock().stats()
    }

    /// Storage slot this handler persists to, if persistence is active.
    pub fn persist_slot(&self) -> Option<&str> {
        self.inner.persist.as_ref().map(PersistAdapter::slot)
    }

    pub fn max_age(&self) -> Duration {
        self.inner.config.max_age
    }
}

/// Wraps a handler as a plain callable.
pub fn memoize<A, T, E, C>(
    handler: &CacheHandler<A, T, E, C>,
) -> impl Fn(A) -> Task<T, E> + Clone + Send + Sync + 'static
where
    A: CallArgs + Send + 'static,
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: PayloadCodec,
{
    let handler = handler.clone();
    move |args| handler.invoke(args)
}

fn open_persistence<T>(
    ctx: &CacheContext,
    id: &str,
    config: &EffectiveConfig<T>,
) -> Option<PersistAdapter> {
    if let Err(e) = ctx.registry().claim(id) {
        warn!(persist = id, error = %e, "Persistence disabled for this handler");
        return None;
    }
    match ctx.open_storage(&config.persist_media) {
        Ok(storage) => Some(PersistAdapter::new(id, storage)),
        Err(e) => {
            error!(persist = id, error = %e, "Persistence storage unavailable");
            None
        }
    }
}

impl<A, T, E, C> Inner<A, T, E, C>
where
    A: CallArgs + Send + 'static,
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: PayloadCodec,
{
    /// Probes `key` and decodes a committed value into a fresh copy.
    fn lookup(&self, table: &mut EntryTable<SharedTask<T, E>>, key: &str) -> Option<Lookup<T, E>> {
        let data = match table.probe(key)? {
            Slot::InFlight { task, .. } => return Some(Lookup::Pending(task.clone().boxed())),
            Slot::Ready(entry) => entry.data.clone(),
        };
        match self.codec.decode::<T>(&data) {
            Ok(value) => Some(Lookup::Ready(value)),
            Err(e) => {
                warn!(key = %key, error = %e, "Dropping entry that no longer decodes");
                table.remove(key);
                None
            }
        }
    }

    /// Builds the shared run for a miss. The producer is only called once the
    /// run is first polled, outside the table lock.
    fn start(self: &Arc<Self>, key: String, generation: u64, args: A) -> SharedTask<T, E> {
        let producer = Arc::clone(&self.producer);
        let inner = Arc::downgrade(self);
        async move {
            let outcome = producer(args).await;
            match inner.upgrade() {
                Some(inner) => inner.settle(&key, generation, outcome),
                None => outcome,
            }
        }
        .boxed()
        .shared()
    }

    fn run_uncached(&self, args: A) -> Task<T, E> {
        let producer = Arc::clone(&self.producer);
        let get_data = self.config.get_data.clone();
        async move {
            let value = producer(args).await?;
            Ok::<T, E>(match get_data {
                Some(f) => f(value),
                None => value,
            })
        }
        .boxed()
    }

    // == Settle ==
    /// Commits or evicts the provisional entry of run `generation`.
    fn settle(
        self: &Arc<Self>,
        key: &str,
        generation: u64,
        outcome: std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                let mut table = self.table.lock();
                if table.abandon(key, generation) {
                    table.stats_mut().record_rejection();
                    if self.config.debug {
                        debug!(key = %key, "Producer failed, provisional entry evicted");
                    }
                }
                return Err(err);
            }
        };

        let value = match &self.config.get_data {
            Some(f) => f(value),
            None => value,
        };

        if let Some(can_cache) = &self.config.can_cache {
            if !can_cache(&value) {
                self.table.lock().abandon(key, generation);
                if self.config.debug {
                    debug!(key = %key, "Result refused by can_cache, not cached");
                }
                return Ok(value);
            }
        }

        let data = match self.codec.encode(&value) {
            Ok(data) => data,
            Err(e) => {
                warn!(key = %key, error = %e, "Result cannot be encoded, not cached");
                self.table.lock().abandon(key, generation);
                return Ok(value);
            }
        };

        let entry = CacheEntry::new(data, self.config.max_age);
        let expire_at = entry.expire_at;
        let mut table = self.table.lock();
        if table.commit(key, generation, entry) {
            self.save(table);
            self.schedule_expiry(key, expire_at);
        }
        Ok(value)
    }

    /// Writes the committed entries to storage, if persistence is active.
    ///
    /// The snapshot is taken under the table lock, which is released before
    /// any storage I/O.
    fn save(&self, table: MutexGuard<'_, EntryTable<SharedTask<T, E>>>) {
        let Some(adapter) = &self.persist else {
            return;
        };
        let entries = table.snapshot();
        let _writing = self.save_lock.lock();
        drop(table);

        if let Err(e) = adapter.save(&entries) {
            error!(slot = adapter.slot(), error = %e, "Failed to persist snapshot");
        }
    }

    /// Arms the proactive eviction timer for short-lived entries.
    fn schedule_expiry(self: &Arc<Self>, key: &str, expire_at: u64) {
        if expire_at == 0 {
            return;
        }
        let remaining = Duration::from_millis(expire_at.saturating_sub(current_timestamp_ms()));
        if remaining > self.config.timer_eviction_limit {
            return;
        }

        let inner = Arc::downgrade(self);
        let key = key.to_string();
        spawn_expiry_timer(remaining + Duration::from_millis(1), move || {
            if let Some(inner) = inner.upgrade() {
                if inner.table.lock().evict_expired(&key, expire_at) && inner.config.debug {
                    debug!(key = %key, "Expired entry evicted by timer");
                }
            }
        });
    }
}

impl<A, T, E, C> fmt::Debug for CacheHandler<A, T, E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandler")
            .field("config", &self.inner.config)
            .field("persist", &self.inner.persist)
            .field("entries", &self.inner.table.lock().len())
            .finish()
    }
}
