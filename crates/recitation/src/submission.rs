//! Submission service: the owner-facing side of the pipeline.

use chrono::Utc;
use tracing::{info, warn};

use tilawa_core::{DomainError, RecitationId, RecitationStatus, UserId};

use crate::jobs::{ANALYSIS_JOB, ANALYSIS_QUEUE, AnalysisJobData, JobMetadata};
use crate::model::{NewRecitation, Recitation, RecitationPatch};
use crate::ports::{
    AudioStorage, Guarded, JobProducer, QueueError, RecitationRepository, RepoError,
    StatusChangeHook, StorageError,
};

/// Error surfaced synchronously to the submitter.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Transient infrastructure failure (store/storage/queue unavailable).
    #[error("infrastructure unavailable: {0}")]
    Infra(String),
}

impl From<RepoError> for SubmissionError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::Domain(DomainError::NotFound),
            RepoError::Unavailable(msg) => Self::Infra(msg),
        }
    }
}

impl From<StorageError> for SubmissionError {
    fn from(err: StorageError) -> Self {
        let StorageError::Unavailable(msg) = err;
        Self::Infra(msg)
    }
}

impl From<QueueError> for SubmissionError {
    fn from(err: QueueError) -> Self {
        let QueueError::Unavailable(msg) = err;
        Self::Infra(msg)
    }
}

/// Validates ownership and state, stores audio blobs, flips status and hands
/// the recitation to the analysis queue.
pub struct SubmissionService<R, S, Q, H> {
    repo: R,
    storage: S,
    queue: Q,
    hook: H,
}

impl<R, S, Q, H> SubmissionService<R, S, Q, H>
where
    R: RecitationRepository,
    S: AudioStorage,
    Q: JobProducer,
    H: StatusChangeHook,
{
    pub fn new(repo: R, storage: S, queue: Q, hook: H) -> Self {
        Self {
            repo,
            storage,
            queue,
            hook,
        }
    }

    /// Create a recitation in `Draft` status after validating the scripture
    /// reference. Language defaults to Arabic.
    pub fn create_draft(&self, input: NewRecitation) -> Result<Recitation, SubmissionError> {
        let surah = input.surah.parse().map_err(SubmissionError::Domain)?;
        let verses = input.verses.parse().map_err(SubmissionError::Domain)?;

        let now = Utc::now();
        let recitation = Recitation {
            id: RecitationId::new(),
            user_id: input.user_id,
            title: input.title,
            description: input.description,
            surah,
            verses,
            language: input.language.unwrap_or_else(|| "ar".to_string()),
            audio_url: None,
            duration_secs: None,
            status: RecitationStatus::Draft,
            published_at: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(recitation)?;
        info!(recitation_id = %created.id, "draft created");
        Ok(created)
    }

    /// Store the audio blob, flip `Draft -> Uploaded` and enqueue the
    /// analysis job.
    ///
    /// The status flip and the enqueue are not one transaction: if the
    /// enqueue fails after the update, the upload still succeeds and the
    /// reconciliation sweep re-enqueues the job later.
    pub fn upload_audio(
        &self,
        id: RecitationId,
        requester: UserId,
        audio: &[u8],
    ) -> Result<Recitation, SubmissionError> {
        let recitation = self.require_owned(id, requester, "upload audio to")?;
        if recitation.status != RecitationStatus::Draft {
            return Err(DomainError::conflict(format!(
                "can only upload audio to a draft recitation (status: {})",
                recitation.status
            ))
            .into());
        }

        let filename = format!("{id}-{}.mp3", Utc::now().timestamp_millis());
        let audio_url = self.storage.upload_audio(audio, &filename)?;

        let patch = RecitationPatch {
            audio_url: Some(audio_url),
            status: Some(RecitationStatus::Uploaded),
            ..Default::default()
        };
        let updated = match self.repo.update_where_status(
            id,
            &[RecitationStatus::Draft],
            patch,
        )? {
            Guarded::Applied { after, .. } => after,
            Guarded::Rejected { current } => {
                // Someone raced us past Draft between the read and the write.
                return Err(DomainError::conflict(format!(
                    "can only upload audio to a draft recitation (status: {current})"
                ))
                .into());
            }
        };

        if let Err(err) = self.enqueue_analysis(&updated) {
            warn!(
                recitation_id = %id,
                error = %err,
                "analysis enqueue failed after upload; reconciliation will re-enqueue"
            );
        } else {
            info!(recitation_id = %id, "audio uploaded, analysis enqueued");
        }

        Ok(updated)
    }

    /// `Approved -> Published`, owner-only. Crossing out of Approved notifies
    /// the status hook so the feed cache gets invalidated.
    pub fn publish(
        &self,
        id: RecitationId,
        requester: UserId,
    ) -> Result<Recitation, SubmissionError> {
        self.require_owned(id, requester, "publish")?;

        let patch = RecitationPatch {
            status: Some(RecitationStatus::Published),
            published_at: Some(Utc::now()),
            ..Default::default()
        };
        match self
            .repo
            .update_where_status(id, &[RecitationStatus::Approved], patch)?
        {
            Guarded::Applied { before, after } => {
                self.hook.status_changed(id, before, after.status);
                info!(recitation_id = %id, "recitation published");
                Ok(after)
            }
            Guarded::Rejected { current } => Err(DomainError::conflict(format!(
                "only an approved recitation can be published (status: {current})"
            ))
            .into()),
        }
    }

    /// Delete a recitation. Drafts never entered the pipeline and are removed
    /// outright; anything else is soft-deleted via a `Deleted` transition so
    /// in-flight jobs observe the status and no-op.
    pub fn delete(&self, id: RecitationId, requester: UserId) -> Result<(), SubmissionError> {
        let recitation = self.require_owned(id, requester, "delete")?;

        if recitation.status == RecitationStatus::Draft {
            self.repo.delete(id)?;
            info!(recitation_id = %id, "draft deleted");
            return Ok(());
        }
        if recitation.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "recitation is already in a terminal state ({})",
                recitation.status
            ))
            .into());
        }

        let expected = [
            RecitationStatus::Uploaded,
            RecitationStatus::Processing,
            RecitationStatus::PendingModeration,
            RecitationStatus::Approved,
        ];
        match self.repo.update_where_status(
            id,
            &expected,
            RecitationPatch::status(RecitationStatus::Deleted),
        )? {
            Guarded::Applied { before, after } => {
                if let Some(url) = &recitation.audio_url {
                    if let Err(err) = self.storage.delete_audio(url) {
                        warn!(recitation_id = %id, error = %err, "audio blob delete failed");
                    }
                }
                self.hook.status_changed(id, before, after.status);
                info!(recitation_id = %id, previous = %before, "recitation deleted");
                Ok(())
            }
            Guarded::Rejected { current } => Err(DomainError::conflict(format!(
                "recitation can no longer be deleted (status: {current})"
            ))
            .into()),
        }
    }

    pub fn recitation(&self, id: RecitationId) -> Result<Recitation, SubmissionError> {
        self.repo
            .find_by_id(id)?
            .ok_or(SubmissionError::Domain(DomainError::NotFound))
    }

    pub fn user_recitations(&self, user_id: UserId) -> Result<Vec<Recitation>, SubmissionError> {
        Ok(self.repo.find_by_user(user_id)?)
    }

    fn require_owned(
        &self,
        id: RecitationId,
        requester: UserId,
        action: &str,
    ) -> Result<Recitation, SubmissionError> {
        let recitation = self
            .repo
            .find_by_id(id)?
            .ok_or(SubmissionError::Domain(DomainError::NotFound))?;
        if recitation.user_id != requester {
            return Err(DomainError::forbidden(format!(
                "you can only {action} your own recitations"
            ))
            .into());
        }
        Ok(recitation)
    }

    fn enqueue_analysis(&self, recitation: &Recitation) -> Result<(), QueueError> {
        let audio_url = recitation.audio_url.clone().unwrap_or_default();
        let job = AnalysisJobData {
            recitation_id: recitation.id,
            audio_url,
            metadata: Some(JobMetadata {
                surah: Some(recitation.surah.to_string()),
                verses: Some(recitation.verses.to_string()),
            }),
        };
        let payload = serde_json::to_value(&job)
            .map_err(|e| QueueError::Unavailable(format!("payload serialization: {e}")))?;
        self.queue.enqueue(ANALYSIS_QUEUE, ANALYSIS_JOB, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::ANALYSIS_QUEUE;
    use crate::testutil::{FailingQueue, MemQueue, MemStorage, MemStore, RecordingHook, draft_input};
    use std::sync::Arc;

    fn service(
        store: Arc<MemStore>,
        queue: Arc<MemQueue>,
    ) -> SubmissionService<Arc<MemStore>, Arc<MemStorage>, Arc<MemQueue>, Arc<RecordingHook>> {
        SubmissionService::new(
            store,
            Arc::new(MemStorage::default()),
            queue,
            Arc::new(RecordingHook::default()),
        )
    }

    #[test]
    fn create_draft_validates_scripture_reference() {
        let store = Arc::new(MemStore::default());
        let svc = service(store.clone(), Arc::new(MemQueue::default()));

        let created = svc.create_draft(draft_input("1", "1-7")).unwrap();
        assert_eq!(created.status, RecitationStatus::Draft);
        assert_eq!(created.language, "ar");
        assert_eq!(created.surah.get(), 1);

        let err = svc.create_draft(draft_input("115", "1-7")).unwrap_err();
        assert!(matches!(err, SubmissionError::Domain(DomainError::Validation(_))));

        let err = svc.create_draft(draft_input("1", "7-1")).unwrap_err();
        assert!(matches!(err, SubmissionError::Domain(DomainError::Validation(_))));
    }

    #[test]
    fn upload_flips_status_and_enqueues_analysis() {
        let store = Arc::new(MemStore::default());
        let queue = Arc::new(MemQueue::default());
        let svc = service(store.clone(), queue.clone());

        let draft = svc.create_draft(draft_input("1", "1-7")).unwrap();
        let uploaded = svc
            .upload_audio(draft.id, draft.user_id, b"bytes")
            .unwrap();

        assert_eq!(uploaded.status, RecitationStatus::Uploaded);
        assert!(uploaded.audio_url.as_deref().unwrap().ends_with(".mp3"));

        let jobs = queue.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].0, ANALYSIS_QUEUE);
        assert_eq!(jobs[0].2["recitationId"], draft.id.to_string());
        assert_eq!(jobs[0].2["metadata"]["surah"], "1");
    }

    #[test]
    fn upload_rejects_non_owner() {
        let store = Arc::new(MemStore::default());
        let svc = service(store, Arc::new(MemQueue::default()));

        let draft = svc.create_draft(draft_input("1", "1-7")).unwrap();
        let err = svc
            .upload_audio(draft.id, UserId::new(), b"bytes")
            .unwrap_err();
        assert!(matches!(err, SubmissionError::Domain(DomainError::Forbidden(_))));
    }

    #[test]
    fn upload_requires_draft_status() {
        let store = Arc::new(MemStore::default());
        let svc = service(store, Arc::new(MemQueue::default()));

        let draft = svc.create_draft(draft_input("1", "1-7")).unwrap();
        svc.upload_audio(draft.id, draft.user_id, b"bytes").unwrap();

        // Second upload hits a non-draft record.
        let err = svc
            .upload_audio(draft.id, draft.user_id, b"bytes")
            .unwrap_err();
        assert!(matches!(err, SubmissionError::Domain(DomainError::Conflict(_))));
    }

    #[test]
    fn upload_missing_recitation_is_not_found() {
        let svc = service(Arc::new(MemStore::default()), Arc::new(MemQueue::default()));
        let err = svc
            .upload_audio(RecitationId::new(), UserId::new(), b"bytes")
            .unwrap_err();
        assert!(matches!(err, SubmissionError::Domain(DomainError::NotFound)));
    }

    #[test]
    fn upload_survives_enqueue_failure() {
        let store = Arc::new(MemStore::default());
        let svc = SubmissionService::new(
            store.clone(),
            Arc::new(MemStorage::default()),
            FailingQueue,
            Arc::new(RecordingHook::default()),
        );

        let draft = svc.create_draft(draft_input("1", "1-7")).unwrap();
        let uploaded = svc
            .upload_audio(draft.id, draft.user_id, b"bytes")
            .unwrap();
        // Record advanced even though the queue was down.
        assert_eq!(uploaded.status, RecitationStatus::Uploaded);
    }

    #[test]
    fn publish_requires_approved_and_fires_hook() {
        let store = Arc::new(MemStore::default());
        let hook = Arc::new(RecordingHook::default());
        let svc = SubmissionService::new(
            store.clone(),
            Arc::new(MemStorage::default()),
            Arc::new(MemQueue::default()),
            hook.clone(),
        );

        let draft = svc.create_draft(draft_input("36", "1")).unwrap();
        let err = svc.publish(draft.id, draft.user_id).unwrap_err();
        assert!(matches!(err, SubmissionError::Domain(DomainError::Conflict(_))));

        store.set_status(draft.id, RecitationStatus::Approved);
        let published = svc.publish(draft.id, draft.user_id).unwrap();
        assert_eq!(published.status, RecitationStatus::Published);
        assert!(published.published_at.is_some());
        assert_eq!(
            hook.events(),
            vec![(draft.id, RecitationStatus::Approved, RecitationStatus::Published)]
        );
    }

    #[test]
    fn delete_removes_drafts_and_soft_deletes_pipeline_records() {
        let store = Arc::new(MemStore::default());
        let hook = Arc::new(RecordingHook::default());
        let svc = SubmissionService::new(
            store.clone(),
            Arc::new(MemStorage::default()),
            Arc::new(MemQueue::default()),
            hook.clone(),
        );

        let draft = svc.create_draft(draft_input("2", "255")).unwrap();
        svc.delete(draft.id, draft.user_id).unwrap();
        assert!(store.find_by_id(draft.id).unwrap().is_none());

        let approved = svc.create_draft(draft_input("2", "255")).unwrap();
        svc.upload_audio(approved.id, approved.user_id, b"a").unwrap();
        store.set_status(approved.id, RecitationStatus::Approved);
        svc.delete(approved.id, approved.user_id).unwrap();

        let record = store.find_by_id(approved.id).unwrap().unwrap();
        assert_eq!(record.status, RecitationStatus::Deleted);
        assert!(hook.events().contains(&(
            approved.id,
            RecitationStatus::Approved,
            RecitationStatus::Deleted
        )));
    }

    #[test]
    fn delete_of_terminal_record_conflicts() {
        let store = Arc::new(MemStore::default());
        let svc = service(store.clone(), Arc::new(MemQueue::default()));

        let draft = svc.create_draft(draft_input("3", "1-5")).unwrap();
        store.set_status(draft.id, RecitationStatus::Rejected);
        let err = svc.delete(draft.id, draft.user_id).unwrap_err();
        assert!(matches!(err, SubmissionError::Domain(DomainError::Conflict(_))));
    }
}
