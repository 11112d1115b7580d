//! Feed cache invalidation.
//!
//! Whenever a recitation crosses into or out of the publicly visible set, the
//! whole feed prefix is dropped. Coarse by design: feed pages are cheap to
//! recompute and per-item invalidation would have to know which pages an
//! item appears on.

use tracing::{debug, info};

use tilawa_core::{RecitationId, RecitationStatus};
use tilawa_recitation::StatusChangeHook;

use crate::cache::{FEED_KEY_PREFIX, FeedCache};

/// Listens to persisted status transitions and drops cached feed pages when
/// the visible set may have changed.
pub struct CacheInvalidationCoordinator<C> {
    cache: C,
}

impl<C: FeedCache> CacheInvalidationCoordinator<C> {
    pub fn new(cache: C) -> Self {
        Self { cache }
    }

    /// Drop every cached feed page.
    pub fn invalidate_feed(&self) {
        self.cache.delete_by_prefix(FEED_KEY_PREFIX);
        info!("feed cache invalidated");
    }
}

impl<C: FeedCache> StatusChangeHook for CacheInvalidationCoordinator<C> {
    fn status_changed(&self, id: RecitationId, old: RecitationStatus, new: RecitationStatus) {
        // Entering the visible set (approval) or leaving it (publish, delete,
        // re-moderation of a previously approved item) both change the feed.
        if old == RecitationStatus::Approved || new == RecitationStatus::Approved {
            debug!(recitation_id = %id, %old, %new, "approved boundary crossed");
            self.invalidate_feed();
        }
    }
}
