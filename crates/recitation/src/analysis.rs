//! Audio analysis worker: scores uploaded audio and advances the record to
//! moderation.

use chrono::Utc;
use tracing::{debug, info, warn};

use tilawa_core::RecitationStatus;

use crate::jobs::{
    AnalysisJobData, AnalysisSummary, MODERATION_JOB, MODERATION_QUEUE, ModerationJobData,
};
use crate::model::{AudioAnalysis, AudioQuality, DeepfakeScore, RecitationPatch};
use crate::ports::{AnalysisStore, Guarded, JobProducer, RecitationRepository, RepoError};

/// What the scorer extracted from the audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredAudio {
    pub duration_secs: u32,
    pub quality: AudioQuality,
    pub deepfake_score: DeepfakeScore,
}

#[derive(Debug, thiserror::Error)]
#[error("scorer failed: {0}")]
pub struct ScorerError(pub String);

/// Black-box quality/authenticity scorer. Model internals are out of scope;
/// implementations plug in here and stay deterministic in tests.
pub trait AudioScorer: Send + Sync {
    fn score(&self, job: &AnalysisJobData) -> Result<ScoredAudio, ScorerError>;
}

/// Stand-in scorer mirroring the reference implementation: every submission
/// comes back three minutes long, high quality and almost certainly human.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceScorer;

impl AudioScorer for ReferenceScorer {
    fn score(&self, _job: &AnalysisJobData) -> Result<ScoredAudio, ScorerError> {
        Ok(ScoredAudio {
            duration_secs: 180,
            quality: AudioQuality::High,
            deepfake_score: DeepfakeScore::new(0.05).expect("constant in range"),
        })
    }
}

/// How a delivery was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The recitation advanced one stage.
    Advanced,
    /// Stale or duplicate delivery; acknowledged without touching state.
    Stale,
}

/// Retryable worker failure: the queue redelivers after the lease expires.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Scorer(#[from] ScorerError),
    #[error("store unavailable: {0}")]
    Store(String),
    #[error("moderation enqueue failed: {0}")]
    Enqueue(String),
}

/// Handler for one analysis delivery. Shared across the pool's consumers.
pub struct AnalysisWorker<R, A, Q, Sc> {
    repo: R,
    analyses: A,
    queue: Q,
    scorer: Sc,
}

impl<R, A, Q, Sc> AnalysisWorker<R, A, Q, Sc>
where
    R: RecitationRepository,
    A: AnalysisStore,
    Q: JobProducer,
    Sc: AudioScorer,
{
    pub fn new(repo: R, analyses: A, queue: Q, scorer: Sc) -> Self {
        Self {
            repo,
            analyses,
            queue,
            scorer,
        }
    }

    /// Process one delivery. Every delivery may be a duplicate of one already
    /// fully processed, so each write is either an upsert or status-guarded.
    pub fn handle(&self, job: &AnalysisJobData) -> Result<Outcome, AnalysisError> {
        let id = job.recitation_id;

        // Claim the record for analysis. Seeing Processing here means a
        // previous attempt died mid-flight (lease expiry); carry on.
        match self.repo.update_where_status(
            id,
            &[RecitationStatus::Uploaded],
            RecitationPatch::status(RecitationStatus::Processing),
        ) {
            Ok(Guarded::Applied { .. }) => {}
            Ok(Guarded::Rejected {
                current: RecitationStatus::Processing,
            }) => {
                debug!(recitation_id = %id, "resuming interrupted analysis");
            }
            Ok(Guarded::Rejected { current }) => {
                info!(recitation_id = %id, status = %current, "stale analysis job, skipping");
                return Ok(Outcome::Stale);
            }
            Err(RepoError::NotFound) => {
                info!(recitation_id = %id, "recitation gone, dropping analysis job");
                return Ok(Outcome::Stale);
            }
            Err(RepoError::Unavailable(msg)) => return Err(AnalysisError::Store(msg)),
        }

        let scored = self.scorer.score(job)?;
        debug!(
            recitation_id = %id,
            duration_secs = scored.duration_secs,
            deepfake_score = scored.deepfake_score.value(),
            "audio scored"
        );

        // Upsert: a redelivery overwrites the same row, never adds one.
        self.analyses
            .upsert(AudioAnalysis {
                recitation_id: id,
                duration_secs: scored.duration_secs,
                quality: scored.quality,
                deepfake_score: scored.deepfake_score,
                analyzed_at: Utc::now(),
            })
            .map_err(store_err)?;

        let patch = RecitationPatch {
            status: Some(RecitationStatus::PendingModeration),
            duration_secs: Some(scored.duration_secs),
            ..Default::default()
        };
        match self.repo.update_where_status(
            id,
            &[RecitationStatus::Uploaded, RecitationStatus::Processing],
            patch,
        ) {
            Ok(Guarded::Applied { .. }) => {}
            Ok(Guarded::Rejected { current }) => {
                // Advanced (or deleted) underneath us: terminal no-op.
                info!(recitation_id = %id, status = %current, "analysis already applied, skipping");
                return Ok(Outcome::Stale);
            }
            Err(RepoError::NotFound) => {
                info!(recitation_id = %id, "recitation gone, dropping analysis job");
                return Ok(Outcome::Stale);
            }
            Err(RepoError::Unavailable(msg)) => return Err(AnalysisError::Store(msg)),
        }

        self.enqueue_moderation(job, scored)?;
        info!(recitation_id = %id, "recitation pending moderation");
        Ok(Outcome::Advanced)
    }

    fn enqueue_moderation(
        &self,
        job: &AnalysisJobData,
        scored: ScoredAudio,
    ) -> Result<(), AnalysisError> {
        let moderation = ModerationJobData {
            recitation_id: job.recitation_id,
            audio_analysis: AnalysisSummary {
                duration: scored.duration_secs,
                quality: scored.quality,
                deepfake_score: scored.deepfake_score,
            },
        };
        let payload = serde_json::to_value(&moderation)
            .map_err(|e| AnalysisError::Enqueue(format!("payload serialization: {e}")))?;
        self.queue
            .enqueue(MODERATION_QUEUE, MODERATION_JOB, payload)
            .map_err(|e| {
                warn!(recitation_id = %job.recitation_id, error = %e, "moderation enqueue failed");
                AnalysisError::Enqueue(e.to_string())
            })
    }
}

fn store_err(err: RepoError) -> AnalysisError {
    AnalysisError::Store(err.to_string())
}
