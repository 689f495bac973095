//! Insertion Order Module
//!
//! Remembers the order in which keys entered the table, for enumeration.

use std::collections::VecDeque;

// == Insertion Order ==
/// Tracks first-insertion order of keys.
///
/// Overwriting a key keeps its position; removing and re-inserting it moves
/// it to the back.
#[derive(Debug, Default)]
pub struct InsertionOrder {
    /// Front = oldest
    order: VecDeque<String>,
}

impl InsertionOrder {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Insert ==
    /// Appends a key unless it is already tracked.
    pub fn insert(&mut self, key: &str) {
        if !self.contains(key) {
            self.order.push_back(key.to_string());
        }
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }

    /// Keys from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.order.iter().any(|k| k == key)
    }
}
