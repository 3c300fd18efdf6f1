// src/watch/debounce.rs

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

use crate::engine::TaskName;

/// Default coalescing window for file events.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(100);

/// Per-key debounce with a fixed window.
///
/// The first event for a key (a task, or a reload kind for reload-only
/// subscriptions) opens a window of `window` length; every further event
/// for that key before the window closes is merged into it. When the window
/// closes the key is emitted exactly once. The window is not extended by
/// later events, so a steady stream of writes still yields a trigger every
/// `window`.
#[derive(Debug)]
pub struct Debouncer<K = TaskName> {
    window: Duration,
    pending: HashMap<K, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self::keyed(window)
    }
}

impl<K: Clone + Eq + Hash + Ord> Debouncer<K> {
    pub fn keyed(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an event for `key` at `now`. Returns true if it opened a new
    /// window.
    pub fn record(&mut self, key: impl Into<K>, now: Instant) -> bool {
        let key = key.into();
        if self.pending.contains_key(&key) {
            return false;
        }
        self.pending.insert(key, now + self.window);
        true
    }

    /// Earliest moment a window closes.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Remove and return every key whose window closed at or before `now`,
    /// sorted.
    pub fn take_due(&mut self, now: Instant) -> Vec<K> {
        let mut due: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        due.sort();
        for key in &due {
            self.pending.remove(key);
        }
        due
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
