use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// Marks cached query results stale when a realtime update touches them
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, key: &str);
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stale: bool,
}

/// In-memory query cache keyed by invalidation key.
///
/// Invalidation keeps the last value around but flags it stale so readers can
/// show it while refetching.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fresh value
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        let entry = CacheEntry {
            value,
            stale: false,
        };
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.into(), entry);
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(key).map(|entry| entry.value.clone()))
    }

    /// `true` if the key is cached and has been invalidated since its last insert
    pub fn is_stale(&self, key: &str) -> bool {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(key).map(|entry| entry.stale))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheInvalidator for QueryCache {
    fn invalidate(&self, key: &str) {
        let Ok(mut entries) = self.entries.write() else {
            tracing::warn!("Query cache lock poisoned, cannot invalidate '{}'", key);
            return;
        };

        match entries.get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                tracing::debug!("Invalidated cache key '{}'", key);
            }
            None => tracing::trace!("Cache key '{}' not cached, nothing to invalidate", key),
        }
    }
}
