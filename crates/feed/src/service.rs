//! Read-through cached feed of publicly visible recitations.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tilawa_core::{RecitationId, SurahNumber, UserId, VerseRange};
use tilawa_recitation::Recitation;

use crate::cache::{DEFAULT_TTL, FeedCache};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Read side of the recitation store: the publicly visible set, newest first.
pub trait FeedRepository: Send + Sync {
    /// Items for one page plus the total visible count.
    fn visible_page(&self, page: u32, page_size: u32) -> Result<(Vec<Recitation>, u64), FeedError>;
}

impl<T: FeedRepository + ?Sized> FeedRepository for std::sync::Arc<T> {
    fn visible_page(&self, page: u32, page_size: u32) -> Result<(Vec<Recitation>, u64), FeedError> {
        (**self).visible_page(page, page_size)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FeedError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One feed entry, shaped for the read path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: RecitationId,
    pub reciter_id: UserId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub surah: SurahNumber,
    pub verses: VerseRange,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

impl From<&Recitation> for FeedItem {
    fn from(recitation: &Recitation) -> Self {
        Self {
            id: recitation.id,
            reciter_id: recitation.user_id,
            title: recitation.title.clone(),
            description: recitation.description.clone(),
            surah: recitation.surah,
            verses: recitation.verses.clone(),
            language: recitation.language.clone(),
            audio_url: recitation.audio_url.clone(),
            duration: recitation.duration_secs,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeedParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

/// Serves feed pages through the cache, recomputing from the store on miss.
pub struct FeedService<R, C> {
    repo: R,
    cache: C,
    ttl: std::time::Duration,
}

impl<R, C> FeedService<R, C>
where
    R: FeedRepository,
    C: FeedCache,
{
    pub fn new(repo: R, cache: C) -> Self {
        Self {
            repo,
            cache,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn feed(&self, params: FeedParams) -> Result<FeedPage, FeedError> {
        let page = params.page.unwrap_or(1).max(1);
        let page_size = params
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let key = format!("{}{page}:{page_size}", crate::cache::FEED_KEY_PREFIX);
        if let Some(cached) = self.cache.get(&key) {
            match serde_json::from_value::<FeedPage>(cached) {
                Ok(feed) => {
                    debug!(%key, "feed cache hit");
                    return Ok(feed);
                }
                Err(err) => {
                    // Corrupt entry: fall back to the store and overwrite.
                    warn!(%key, error = %err, "discarding undecodable feed cache entry");
                }
            }
        }
        debug!(%key, "feed cache miss");

        let (records, total) = self.repo.visible_page(page, page_size)?;
        let feed = FeedPage {
            items: records.iter().map(FeedItem::from).collect(),
            page,
            page_size,
            total,
            total_pages: total.div_ceil(page_size as u64),
        };

        match serde_json::to_value(&feed) {
            Ok(value) => self.cache.set(&key, value, self.ttl),
            Err(err) => warn!(%key, error = %err, "feed page not cacheable"),
        }
        Ok(feed)
    }
}
