//! In-memory fakes for unit tests in this crate.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use tilawa_core::{RecitationId, RecitationStatus, UserId};

use crate::model::{AudioAnalysis, ModerationLog, NewRecitation, Recitation, RecitationPatch};
use crate::ports::{
    AnalysisStore, AudioStorage, Guarded, JobProducer, ModerationStore, QueueError,
    RecitationRepository, RepoError, StatusChangeHook, StorageError,
};

pub fn draft_input(surah: &str, verses: &str) -> NewRecitation {
    NewRecitation {
        user_id: UserId::new(),
        title: "Test recitation".into(),
        description: None,
        surah: surah.into(),
        verses: verses.into(),
        language: None,
    }
}

pub fn apply_patch(recitation: &mut Recitation, patch: RecitationPatch) {
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

/// Recitations plus both satellite stores behind one lock.
#[derive(Default)]
pub struct MemStore {
    recitations: Mutex<HashMap<RecitationId, Recitation>>,
    analyses: Mutex<HashMap<RecitationId, AudioAnalysis>>,
    logs: Mutex<HashMap<RecitationId, ModerationLog>>,
}

impl MemStore {
    pub fn set_status(&self, id: RecitationId, status: RecitationStatus) {
        let mut recitations = self.recitations.lock().unwrap();
        recitations.get_mut(&id).unwrap().status = status;
    }

    pub fn backdate(&self, id: RecitationId, updated_at: DateTime<Utc>) {
        let mut recitations = self.recitations.lock().unwrap();
        recitations.get_mut(&id).unwrap().updated_at = updated_at;
    }

    pub fn analysis_count(&self) -> usize {
        self.analyses.lock().unwrap().len()
    }

    pub fn log_count(&self) -> usize {
        self.logs.lock().unwrap().len()
    }
}

impl RecitationRepository for MemStore {
    fn create(&self, recitation: Recitation) -> Result<Recitation, RepoError> {
        let mut recitations = self.recitations.lock().unwrap();
        recitations.insert(recitation.id, recitation.clone());
        Ok(recitation)
    }

    fn find_by_id(&self, id: RecitationId) -> Result<Option<Recitation>, RepoError> {
        Ok(self.recitations.lock().unwrap().get(&id).cloned())
    }

    fn find_by_user(&self, user_id: UserId) -> Result<Vec<Recitation>, RepoError> {
        let recitations = self.recitations.lock().unwrap();
        let mut found: Vec<_> = recitations
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    fn update(&self, id: RecitationId, patch: RecitationPatch) -> Result<Recitation, RepoError> {
        let mut recitations = self.recitations.lock().unwrap();
        let recitation = recitations.get_mut(&id).ok_or(RepoError::NotFound)?;
        apply_patch(recitation, patch);
        Ok(recitation.clone())
    }

    fn update_where_status(
        &self,
        id: RecitationId,
        expected: &[RecitationStatus],
        patch: RecitationPatch,
    ) -> Result<Guarded, RepoError> {
        let mut recitations = self.recitations.lock().unwrap();
        let recitation = recitations.get_mut(&id).ok_or(RepoError::NotFound)?;
        if !expected.contains(&recitation.status) {
            return Ok(Guarded::Rejected {
                current: recitation.status,
            });
        }
        let before = recitation.status;
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
        let recitations = self.recitations.lock().unwrap();
        Ok(recitations
            .values()
            .filter(|r| r.status == status && r.updated_at < updated_before)
            .cloned()
            .collect())
    }

    fn delete(&self, id: RecitationId) -> Result<(), RepoError> {
        let mut recitations = self.recitations.lock().unwrap();
        recitations.remove(&id).ok_or(RepoError::NotFound)?;
        Ok(())
    }
}

impl AnalysisStore for MemStore {
    fn upsert(&self, analysis: AudioAnalysis) -> Result<(), RepoError> {
        let mut analyses = self.analyses.lock().unwrap();
        analyses.insert(analysis.recitation_id, analysis);
        Ok(())
    }

    fn find_by_recitation(&self, id: RecitationId) -> Result<Option<AudioAnalysis>, RepoError> {
        Ok(self.analyses.lock().unwrap().get(&id).cloned())
    }
}

impl ModerationStore for MemStore {
    fn upsert(&self, log: ModerationLog) -> Result<(), RepoError> {
        let mut logs = self.logs.lock().unwrap();
        logs.insert(log.recitation_id, log);
        Ok(())
    }

    fn find_by_recitation(&self, id: RecitationId) -> Result<Option<ModerationLog>, RepoError> {
        Ok(self.logs.lock().unwrap().get(&id).cloned())
    }
}

#[derive(Default)]
pub struct MemStorage {
    pub deleted: Mutex<Vec<String>>,
}

impl AudioStorage for MemStorage {
    fn upload_audio(&self, _bytes: &[u8], filename: &str) -> Result<String, StorageError> {
        Ok(format!("https://storage.test/recitations/{filename}"))
    }

    fn delete_audio(&self, url: &str) -> Result<(), StorageError> {
        self.deleted.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemQueue {
    jobs: Mutex<Vec<(String, String, serde_json::Value)>>,
}

impl MemQueue {
    pub fn jobs(&self) -> Vec<(String, String, serde_json::Value)> {
        self.jobs.lock().unwrap().clone()
    }
}

impl JobProducer for MemQueue {
    fn enqueue(
        &self,
        queue: &str,
        job_name: &str,
        payload: serde_json::Value,
    ) -> Result<(), QueueError> {
        self.jobs
            .lock()
            .unwrap()
            .push((queue.to_string(), job_name.to_string(), payload));
        Ok(())
    }
}

/// Producer whose enqueues always fail (queue outage).
pub struct FailingQueue;

impl JobProducer for FailingQueue {
    fn enqueue(&self, _: &str, _: &str, _: serde_json::Value) -> Result<(), QueueError> {
        Err(QueueError::Unavailable("connection refused".into()))
    }
}

#[derive(Default)]
pub struct RecordingHook {
    events: Mutex<Vec<(RecitationId, RecitationStatus, RecitationStatus)>>,
}

impl RecordingHook {
    pub fn events(&self) -> Vec<(RecitationId, RecitationStatus, RecitationStatus)> {
        self.events.lock().unwrap().clone()
    }
}

impl StatusChangeHook for RecordingHook {
    fn status_changed(&self, id: RecitationId, old: RecitationStatus, new: RecitationStatus) {
        self.events.lock().unwrap().push((id, old, new));
    }
}
