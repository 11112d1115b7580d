//! In-memory TTL cache backing the feed.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tilawa_feed::FeedCache;

struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Key/value cache with lazy expiry: entries are dropped when a read finds
/// them past their deadline, so staleness is bounded by the TTL even when an
/// invalidation never arrives.
#[derive(Default)]
pub struct InMemoryTtlCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryTtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live (unexpired) entry count.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .unwrap()
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FeedCache for InMemoryTtlCache {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Instant::now();
        {
            let entries = self.entries.read().unwrap();
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: drop it under the write lock.
        self.entries.write().unwrap().remove(key);
        None
    }

    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        self.entries.write().unwrap().insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn delete_by_prefix(&self, prefix: &str) {
        self.entries
            .write()
            .unwrap()
            .retain(|key, _| !key.starts_with(prefix));
    }
}
