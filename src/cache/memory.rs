// src/cache/memory.rs

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{CacheEntry, CacheResult, CacheStore, Fingerprint};

/// Per-process store. Tests create a fresh one each.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<Fingerprint, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Fingerprint, CacheEntry>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &Fingerprint) -> CacheResult<Option<CacheEntry>> {
        Ok(self.entries().get(key).cloned())
    }

    fn put(&self, entry: CacheEntry) -> CacheResult<()> {
        self.entries().insert(entry.key, entry);
        Ok(())
    }

    fn clear(&self) -> CacheResult<()> {
        self.entries().clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Artifact;

    #[test]
    fn put_get_clear() {
        let store = MemoryCacheStore::new();
        let key = Fingerprint::of_bytes(b"k");
        assert!(store.get(&key).unwrap().is_none());

        store
            .put(CacheEntry::new(key, vec![Artifact::new("a.css", "a")]))
            .unwrap();
        let hit = store.get(&key).unwrap().unwrap();
        assert_eq!(hit.artifacts, vec![Artifact::new("a.css", "a")]);
        assert_eq!(store.len(), 1);

        store.clear().unwrap();
        assert!(store.is_empty());
    }
}
