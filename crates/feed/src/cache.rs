//! Key/value cache port fronting the feed.

use std::time::Duration;

/// Keys under this prefix hold cached feed pages.
pub const FEED_KEY_PREFIX: &str = "feed:";

/// Default entry lifetime: five minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// TTL'd key/value cache. Implementations must expire entries no later than
/// their TTL; callers must treat every `get` as possibly `None`.
pub trait FeedCache: Send + Sync {
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration);

    /// Coarse invalidation: remove every key under `prefix`.
    fn delete_by_prefix(&self, prefix: &str);
}

impl<T: FeedCache + ?Sized> FeedCache for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        (**self).set(key, value, ttl)
    }

    fn delete_by_prefix(&self, prefix: &str) {
        (**self).delete_by_prefix(prefix)
    }
}
