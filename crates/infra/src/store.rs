//! In-memory source-of-truth store for recitations and their satellite
//! records. One lock guards all three tables, which makes the guarded
//! status update atomic: no write can slip between the status check and
//! the patch.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use tilawa_core::{RecitationId, RecitationStatus, UserId};
use tilawa_feed::service::{FeedError, FeedRepository};
use tilawa_recitation::model::{AudioAnalysis, ModerationLog, Recitation, RecitationPatch};
use tilawa_recitation::ports::{
    AnalysisStore, Guarded, ModerationStore, RecitationRepository, RepoError,
};

#[derive(Debug, Default)]
struct Tables {
    recitations: HashMap<RecitationId, Recitation>,
    analyses: HashMap<RecitationId, AudioAnalysis>,
    logs: HashMap<RecitationId, ModerationLog>,
}

/// In-memory implementation of every store port.
#[derive(Debug, Default)]
pub struct InMemoryRecitationStore {
    tables: RwLock<Tables>,
}

impl InMemoryRecitationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test escape hatch: rewind `updated_at` so reconciliation cutoffs can
    /// be exercised without sleeping.
    pub fn backdate(&self, id: RecitationId, updated_at: DateTime<Utc>) {
        let mut tables = self.tables.write().unwrap();
        if let Some(recitation) = tables.recitations.get_mut(&id) {
            recitation.updated_at = updated_at;
        }
    }
}

fn apply_patch(recitation: &mut Recitation, patch: RecitationPatch) {
    if let Some(title) = patch.title {
        recitation.title = title;
    }
    if let Some(description) = patch.description {
        recitation.description = Some(description);
    }
    if let Some(audio_url) = patch.audio_url {
        recitation.audio_url = Some(audio_url);
    }
    if let Some(duration) = patch.duration_secs {
        recitation.duration_secs = Some(duration);
    }
    if let Some(status) = patch.status {
        recitation.status = status;
    }
    if let Some(published_at) = patch.published_at {
        recitation.published_at = Some(published_at);
    }
    recitation.updated_at = Utc::now();
}

impl RecitationRepository for InMemoryRecitationStore {
    fn create(&self, recitation: Recitation) -> Result<Recitation, RepoError> {
        let mut tables = self.tables.write().unwrap();
        tables.recitations.insert(recitation.id, recitation.clone());
        Ok(recitation)
    }

    fn find_by_id(&self, id: RecitationId) -> Result<Option<Recitation>, RepoError> {
        let tables = self.tables.read().unwrap();
        Ok(tables.recitations.get(&id).cloned())
    }

    fn find_by_user(&self, user_id: UserId) -> Result<Vec<Recitation>, RepoError> {
        let tables = self.tables.read().unwrap();
        let mut found: Vec<_> = tables
            .recitations
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    fn update(&self, id: RecitationId, patch: RecitationPatch) -> Result<Recitation, RepoError> {
        let mut tables = self.tables.write().unwrap();
        let recitation = tables.recitations.get_mut(&id).ok_or(RepoError::NotFound)?;
        apply_patch(recitation, patch);
        Ok(recitation.clone())
    }

    fn update_where_status(
        &self,
        id: RecitationId,
        expected: &[RecitationStatus],
        patch: RecitationPatch,
    ) -> Result<Guarded, RepoError> {
        let mut tables = self.tables.write().unwrap();
        let recitation = tables.recitations.get_mut(&id).ok_or(RepoError::NotFound)?;

        let before = recitation.status;
        if !expected.contains(&before) {
            return Ok(Guarded::Rejected { current: before });
        }
        apply_patch(recitation, patch);
        Ok(Guarded::Applied {
            before,
            after: recitation.clone(),
        })
    }

    fn find_stalled(
        &self,
        status: RecitationStatus,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Recitation>, RepoError> {
        let tables = self.tables.read().unwrap();
        let mut found: Vec<_> = tables
            .recitations
            .values()
            .filter(|r| r.status == status && r.updated_at < updated_before)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.updated_at);
        Ok(found)
    }

    fn delete(&self, id: RecitationId) -> Result<(), RepoError> {
        let mut tables = self.tables.write().unwrap();
        tables.recitations.remove(&id).ok_or(RepoError::NotFound)?;
        tables.analyses.remove(&id);
        tables.logs.remove(&id);
        Ok(())
    }
}

impl AnalysisStore for InMemoryRecitationStore {
    fn upsert(&self, analysis: AudioAnalysis) -> Result<(), RepoError> {
        let mut tables = self.tables.write().unwrap();
        tables.analyses.insert(analysis.recitation_id, analysis);
        Ok(())
    }

    fn find_by_recitation(&self, id: RecitationId) -> Result<Option<AudioAnalysis>, RepoError> {
        let tables = self.tables.read().unwrap();
        Ok(tables.analyses.get(&id).cloned())
    }
}

impl ModerationStore for InMemoryRecitationStore {
    fn upsert(&self, log: ModerationLog) -> Result<(), RepoError> {
        let mut tables = self.tables.write().unwrap();
        tables.logs.insert(log.recitation_id, log);
        Ok(())
    }

    fn find_by_recitation(&self, id: RecitationId) -> Result<Option<ModerationLog>, RepoError> {
        let tables = self.tables.read().unwrap();
        Ok(tables.logs.get(&id).cloned())
    }
}

impl FeedRepository for InMemoryRecitationStore {
    fn visible_page(&self, page: u32, page_size: u32) -> Result<(Vec<Recitation>, u64), FeedError> {
        let tables = self.tables.read().unwrap();
        let mut visible: Vec<_> = tables
            .recitations
            .values()
            .filter(|r| r.status.is_publicly_visible())
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = visible.len() as u64;
        let start = ((page.max(1) - 1) as usize).saturating_mul(page_size as usize);
        let items = visible
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect();
        Ok((items, total))
    }
}
