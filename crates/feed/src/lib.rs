//! `tilawa-feed` — the public feed read path.
//!
//! The feed lists publicly visible recitations behind a read-optimized cache.
//! The cache is strictly an optimization: every read tolerates a miss by
//! recomputing from the store, and staleness is bounded by the entry TTL even
//! when an invalidation is missed.

pub mod cache;
pub mod invalidation;
pub mod service;

pub use cache::FeedCache;
pub use invalidation::CacheInvalidationCoordinator;
pub use service::{FeedItem, FeedPage, FeedParams, FeedRepository, FeedService};
