//! Entry Table Module
//!
//! Maps cache keys to in-flight or committed entries and applies the entry
//! lifecycle: provisional registration, commit, lazy expiry and eviction.

use std::collections::HashMap;

use crate::cache::{current_timestamp_ms, CacheEntry, CacheStats, InsertionOrder};

// == Slot ==
/// State of a single key.
#[derive(Debug, Clone)]
pub enum Slot<P> {
    /// Producer call still running; `generation` identifies this registration
    InFlight { generation: u64, task: P },
    /// Settled and committed
    Ready(CacheEntry),
}

// == Entry View ==
/// Read-only view of a slot, as returned by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryView {
    Pending,
    Ready(CacheEntry),
}

// == Entry Table ==
/// Key → slot mapping owned by one handler.
///
/// Expired entries stay in the map until the key is probed again, or until a
/// proactive timer calls [`evict_expired`](Self::evict_expired).
#[derive(Debug)]
pub struct EntryTable<P> {
    slots: HashMap<String, Slot<P>>,
    order: InsertionOrder,
    stats: CacheStats,
    next_generation: u64,
}

impl<P> Default for EntryTable<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> EntryTable<P> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            order: InsertionOrder::new(),
            stats: CacheStats::new(),
            next_generation: 0,
        }
    }

    // == Probe ==
    /// Returns the live slot for `key`, evicting it first if it has expired.
    pub fn probe(&mut self, key: &str) -> Option<&Slot<P>> {
        let expired = matches!(
            self.slots.get(key),
            Some(Slot::Ready(entry)) if entry.is_expired_at(current_timestamp_ms())
        );
        if expired {
            self.remove(key);
            self.stats.record_expiration();
            return None;
        }
        self.slots.get(key)
    }

    // == Has ==
    /// Whether `key` is live (in flight or committed and unexpired).
    pub fn has(&mut self, key: &str) -> bool {
        self.probe(key).is_some()
    }

    // == Begin ==
    /// Registers an in-flight producer call and returns its generation.
    #[cfg(test)]
    pub fn begin(&mut self, key: &str, task: P) -> u64
    where
        P: Clone,
    {
        self.begin_with(key, |_| task).0
    }

    /// Registers an in-flight producer call, building its task from the new
    /// generation. Returns the generation and a handle to the registered task.
    pub fn begin_with(&mut self, key: &str, make_task: impl FnOnce(u64) -> P) -> (u64, P)
    where
        P: Clone,
    {
        self.next_generation += 1;
        let generation = self.next_generation;
        let task = make_task(generation);
        self.insert_slot(
            key,
            Slot::InFlight {
                generation,
                task: task.clone(),
            },
        );
        (generation, task)
    }

    // == Commit ==
    /// Promotes the in-flight registration `generation` to a committed entry.
    ///
    /// Returns false if the slot was cleared or replaced in the meantime.
    pub fn commit(&mut self, key: &str, generation: u64, entry: CacheEntry) -> bool {
        if !self.is_generation(key, generation) {
            return false;
        }
        self.slots.insert(key.to_string(), Slot::Ready(entry));
        true
    }

    // == Abandon ==
    /// Drops the in-flight registration `generation` after a producer failure.
    pub fn abandon(&mut self, key: &str, generation: u64) -> bool {
        if !self.is_generation(key, generation) {
            return false;
        }
        self.remove(key);
        true
    }

    fn is_generation(&self, key: &str, generation: u64) -> bool {
        matches!(
            self.slots.get(key),
            Some(Slot::InFlight { generation: current, .. }) if *current == generation
        )
    }

    // == Set ==
    /// Stores a committed entry directly, replacing any previous slot.
    pub fn set(&mut self, key: &str, entry: CacheEntry) {
        self.insert_slot(key, Slot::Ready(entry));
    }

    fn insert_slot(&mut self, key: &str, slot: Slot<P>) {
        self.slots.insert(key.to_string(), slot);
        self.order.insert(key);
        self.stats.set_total_entries(self.slots.len());
    }

    // == Evict Expired ==
    /// Removes `key` if it still holds the committed entry expiring at
    /// `expire_at` and that entry has expired.
    pub fn evict_expired(&mut self, key: &str, expire_at: u64) -> bool {
        let matches = matches!(
            self.slots.get(key),
            Some(Slot::Ready(entry))
                if entry.expire_at == expire_at && entry.is_expired_at(current_timestamp_ms())
        );
        if matches {
            self.remove(key);
            self.stats.record_expiration();
        }
        matches
    }

    // == Remove ==
    /// Removes an entry by key, whatever its state.
    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.slots.remove(key).is_some();
        if removed {
            self.order.remove(key);
            self.stats.set_total_entries(self.slots.len());
        }
        removed
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.slots.clear();
        self.order.clear();
        self.stats.set_total_entries(0);
    }

    // == Snapshot ==
    /// Committed entries in insertion order, for persistence.
    pub fn snapshot(&self) -> Vec<(String, CacheEntry)> {
        self.order
            .iter()
            .filter_map(|key| match self.slots.get(key) {
                Some(Slot::Ready(entry)) => Some((key.to_string(), entry.clone())),
                _ => None,
            })
            .collect()
    }

    // == Entries ==
    /// Every slot in insertion order.
    pub fn entries(&self) -> Vec<(String, EntryView)> {
        self.order
            .iter()
            .filter_map(|key| {
                let view = match self.slots.get(key)? {
                    Slot::InFlight { .. } => EntryView::Pending,
                    Slot::Ready(entry) => EntryView::Ready(entry.clone()),
                };
                Some((key.to_string(), view))
            })
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.slots.len());
        stats
    }

    pub fn stats_mut(&mut self) -> &mut CacheStats {
        &mut self.stats
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn entry(data: &str, max_age: Duration) -> CacheEntry {
        CacheEntry::new(data.to_string(), max_age)
    }

    #[test]
    fn test_table_new() {
        let table: EntryTable<()> = EntryTable::new();
        assert_eq!(table.len(), 0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_set_and_probe() {
        let mut table: EntryTable<()> = EntryTable::new();

        table.set("key1", entry("1", Duration::ZERO));

        assert!(table.has("key1"));
        assert!(matches!(table.probe("key1"), Some(Slot::Ready(e)) if e.data == "1"));
        assert!(!table.has("missing"));
    }

    #[test]
    fn test_probe_evicts_expired() {
        let mut table: EntryTable<()> = EntryTable::new();

        table.set("key1", entry("1", Duration::from_millis(30)));
        assert!(table.has("key1"));

        sleep(Duration::from_millis(60));

        // still physically present until probed
        assert_eq!(table.len(), 1);
        assert!(!table.has("key1"));
        assert_eq!(table.len(), 0);
        assert_eq!(table.stats().expirations, 1);
    }

    #[test]
    fn test_commit_promotes_matching_generation() {
        let mut table: EntryTable<&str> = EntryTable::new();

        let generation = table.begin("key1", "task");
        assert!(matches!(table.probe("key1"), Some(Slot::InFlight { .. })));

        assert!(table.commit("key1", generation, entry("1", Duration::ZERO)));
        assert!(matches!(table.probe("key1"), Some(Slot::Ready(_))));
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let mut table: EntryTable<&str> = EntryTable::new();

        let first = table.begin("key1", "first");
        table.remove("key1");
        let second = table.begin("key1", "second");
        assert_ne!(first, second);

        assert!(!table.commit("key1", first, entry("old", Duration::ZERO)));
        assert!(!table.abandon("key1", first));
        assert!(matches!(
            table.probe("key1"),
            Some(Slot::InFlight { task: "second", .. })
        ));

        // a direct set also supersedes an in-flight registration
        table.set("key1", entry("direct", Duration::ZERO));
        assert!(!table.commit("key1", second, entry("late", Duration::ZERO)));
        assert!(matches!(table.probe("key1"), Some(Slot::Ready(e)) if e.data == "direct"));
    }

    #[test]
    fn test_abandon_removes_in_flight() {
        let mut table: EntryTable<&str> = EntryTable::new();

        let generation = table.begin("key1", "task");
        assert!(table.abandon("key1", generation));
        assert!(!table.has("key1"));
    }

    #[test]
    fn test_evict_expired_checks_identity() {
        let mut table: EntryTable<()> = EntryTable::new();

        table.set("key1", entry("1", Duration::from_millis(20)));
        let old_expire = match table.probe("key1") {
            Some(Slot::Ready(e)) => e.expire_at,
            _ => panic!("expected ready entry"),
        };

        // replaced by a long-lived entry before the timer fires
        table.set("key1", entry("2", Duration::from_secs(60)));
        sleep(Duration::from_millis(40));

        assert!(!table.evict_expired("key1", old_expire));
        assert!(table.has("key1"));
    }

    #[test]
    fn test_snapshot_skips_in_flight_and_keeps_order() {
        let mut table: EntryTable<&str> = EntryTable::new();

        table.set("b", entry("1", Duration::ZERO));
        table.begin("pending", "task");
        table.set("a", entry("2", Duration::ZERO));

        let keys: Vec<String> = table.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);

        let views = table.entries();
        assert_eq!(views.len(), 3);
        assert_eq!(views[1], ("pending".to_string(), EntryView::Pending));
    }

    #[test]
    fn test_clear() {
        let mut table: EntryTable<()> = EntryTable::new();
        table.set("key1", entry("1", Duration::ZERO));
        table.set("key2", entry("2", Duration::ZERO));

        table.clear();

        assert!(table.is_empty());
        assert_eq!(table.stats().total_entries, 0);
    }
}
