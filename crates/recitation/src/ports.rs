//! Ports the pipeline talks through, implemented by `tilawa-infra`.

use chrono::{DateTime, Utc};

use tilawa_core::{RecitationId, RecitationStatus, UserId};

use crate::model::{AudioAnalysis, ModerationLog, Recitation, RecitationPatch};

/// Store-level error. `Unavailable` is transient: callers inside a worker
/// surface it as a retryable failure and let queue lease mechanics redeliver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a guarded (conditional) update.
#[derive(Debug, Clone, PartialEq)]
pub enum Guarded {
    /// Precondition held; the patch was applied.
    Applied {
        before: RecitationStatus,
        after: Recitation,
    },
    /// Current status did not match any expected status; nothing was written.
    Rejected { current: RecitationStatus },
}

/// Source-of-truth store for recitation records.
///
/// `update_where_status` is the pipeline's only concurrency-control
/// mechanism: read current status, write only if it still matches the
/// precondition. Stale or duplicate jobs observe `Guarded::Rejected` and
/// no-op instead of corrupting later state.
pub trait RecitationRepository: Send + Sync {
    fn create(&self, recitation: Recitation) -> Result<Recitation, RepoError>;

    fn find_by_id(&self, id: RecitationId) -> Result<Option<Recitation>, RepoError>;

    /// A user's recitations, newest first.
    fn find_by_user(&self, user_id: UserId) -> Result<Vec<Recitation>, RepoError>;

    /// Unconditional partial update.
    fn update(&self, id: RecitationId, patch: RecitationPatch) -> Result<Recitation, RepoError>;

    /// Apply `patch` only if the record's current status is one of `expected`.
    fn update_where_status(
        &self,
        id: RecitationId,
        expected: &[RecitationStatus],
        patch: RecitationPatch,
    ) -> Result<Guarded, RepoError>;

    /// Records sitting in `status` with no write since `updated_before`.
    /// Feeds the reconciliation sweep for lost enqueues.
    fn find_stalled(
        &self,
        status: RecitationStatus,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Recitation>, RepoError>;

    /// Hard removal. Only drafts are removed this way; anything that entered
    /// the pipeline is soft-deleted via a status transition instead.
    fn delete(&self, id: RecitationId) -> Result<(), RepoError>;
}

/// Analysis results keyed by recitation id, at most one row per key.
pub trait AnalysisStore: Send + Sync {
    fn upsert(&self, analysis: AudioAnalysis) -> Result<(), RepoError>;

    fn find_by_recitation(&self, id: RecitationId) -> Result<Option<AudioAnalysis>, RepoError>;
}

/// Moderation logs keyed by recitation id, at most one row per key.
pub trait ModerationStore: Send + Sync {
    fn upsert(&self, log: ModerationLog) -> Result<(), RepoError>;

    fn find_by_recitation(&self, id: RecitationId) -> Result<Option<ModerationLog>, RepoError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Audio blob storage.
pub trait AudioStorage: Send + Sync {
    /// Store the blob and return its location reference.
    fn upload_audio(&self, bytes: &[u8], filename: &str) -> Result<String, StorageError>;

    fn delete_audio(&self, url: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Unavailable(String),
}

/// Fire-and-forget producer side of the durable job queue. A returned `Ok`
/// means the job is queued, never that it has been processed.
pub trait JobProducer: Send + Sync {
    fn enqueue(
        &self,
        queue: &str,
        job_name: &str,
        payload: serde_json::Value,
    ) -> Result<(), QueueError>;
}

/// Notified after a status transition has been persisted. The feed cache
/// invalidation coordinator hangs off this.
pub trait StatusChangeHook: Send + Sync {
    fn status_changed(&self, id: RecitationId, old: RecitationStatus, new: RecitationStatus);
}

/// Hook that does nothing; for tests and wiring without a cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatusHook;

impl StatusChangeHook for NoopStatusHook {
    fn status_changed(&self, _id: RecitationId, _old: RecitationStatus, _new: RecitationStatus) {}
}

// Ports are commonly shared across worker pools behind an Arc.
macro_rules! impl_port_for_arc {
    ($trait_:ident { $($body:tt)* }) => {
        impl<T: $trait_ + ?Sized> $trait_ for std::sync::Arc<T> {
            $($body)*
        }
    };
}

impl_port_for_arc!(RecitationRepository {
    fn create(&self, recitation: Recitation) -> Result<Recitation, RepoError> {
        (**self).create(recitation)
    }
    fn find_by_id(&self, id: RecitationId) -> Result<Option<Recitation>, RepoError> {
        (**self).find_by_id(id)
    }
    fn find_by_user(&self, user_id: UserId) -> Result<Vec<Recitation>, RepoError> {
        (**self).find_by_user(user_id)
    }
    fn update(&self, id: RecitationId, patch: RecitationPatch) -> Result<Recitation, RepoError> {
        (**self).update(id, patch)
    }
    fn update_where_status(
        &self,
        id: RecitationId,
        expected: &[RecitationStatus],
        patch: RecitationPatch,
    ) -> Result<Guarded, RepoError> {
        (**self).update_where_status(id, expected, patch)
    }
    fn find_stalled(
        &self,
        status: RecitationStatus,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Recitation>, RepoError> {
        (**self).find_stalled(status, updated_before)
    }
    fn delete(&self, id: RecitationId) -> Result<(), RepoError> {
        (**self).delete(id)
    }
});

impl_port_for_arc!(AnalysisStore {
    fn upsert(&self, analysis: AudioAnalysis) -> Result<(), RepoError> {
        (**self).upsert(analysis)
    }
    fn find_by_recitation(&self, id: RecitationId) -> Result<Option<AudioAnalysis>, RepoError> {
        (**self).find_by_recitation(id)
    }
});

impl_port_for_arc!(ModerationStore {
    fn upsert(&self, log: ModerationLog) -> Result<(), RepoError> {
        (**self).upsert(log)
    }
    fn find_by_recitation(&self, id: RecitationId) -> Result<Option<ModerationLog>, RepoError> {
        (**self).find_by_recitation(id)
    }
});

impl_port_for_arc!(AudioStorage {
    fn upload_audio(&self, bytes: &[u8], filename: &str) -> Result<String, StorageError> {
        (**self).upload_audio(bytes, filename)
    }
    fn delete_audio(&self, url: &str) -> Result<(), StorageError> {
        (**self).delete_audio(url)
    }
});

impl_port_for_arc!(JobProducer {
    fn enqueue(
        &self,
        queue: &str,
        job_name: &str,
        payload: serde_json::Value,
    ) -> Result<(), QueueError> {
        (**self).enqueue(queue, job_name, payload)
    }
});

impl_port_for_arc!(StatusChangeHook {
    fn status_changed(&self, id: RecitationId, old: RecitationStatus, new: RecitationStatus) {
        (**self).status_changed(id, old, new)
    }
});
