//! Reconciliation sweep.
//!
//! The status flip and the job enqueue are separate writes, so a crash or a
//! queue outage between them leaves a record stranded mid-pipeline with no
//! job to move it. The sweep scans for records that have sat in an
//! intermediate status with no write activity and re-enqueues the job that
//! should be in flight for them. Re-enqueueing is safe: workers treat every
//! delivery as a possible duplicate.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use tilawa_core::RecitationStatus;

use crate::jobs::{
    ANALYSIS_JOB, ANALYSIS_QUEUE, AnalysisJobData, AnalysisSummary, JobMetadata, MODERATION_JOB,
    MODERATION_QUEUE, ModerationJobData,
};
use crate::model::Recitation;
use crate::ports::{AnalysisStore, JobProducer, QueueError, RecitationRepository, RepoError};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("store unavailable: {0}")]
    Store(String),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl From<RepoError> for ReconcileError {
    fn from(err: RepoError) -> Self {
        Self::Store(err.to_string())
    }
}

/// What one sweep re-enqueued.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub analysis_jobs: usize,
    pub moderation_jobs: usize,
}

/// Periodic compensating sweep over stranded records.
pub struct Reconciler<R, A, Q> {
    repo: R,
    analyses: A,
    queue: Q,
}

impl<R, A, Q> Reconciler<R, A, Q>
where
    R: RecitationRepository,
    A: AnalysisStore,
    Q: JobProducer,
{
    pub fn new(repo: R, analyses: A, queue: Q) -> Self {
        Self {
            repo,
            analyses,
            queue,
        }
    }

    /// Re-enqueue jobs for records idle in an intermediate status for longer
    /// than `idle_for`.
    pub fn sweep(&self, idle_for: Duration) -> Result<SweepReport, ReconcileError> {
        let cutoff = Utc::now() - idle_for;
        let mut report = SweepReport::default();

        // Uploaded and Processing both mean an analysis job should exist.
        for status in [RecitationStatus::Uploaded, RecitationStatus::Processing] {
            for recitation in self.repo.find_stalled(status, cutoff)? {
                self.enqueue_analysis(&recitation)?;
                report.analysis_jobs += 1;
            }
        }

        for recitation in self
            .repo
            .find_stalled(RecitationStatus::PendingModeration, cutoff)?
        {
            match self.analyses.find_by_recitation(recitation.id)? {
                Some(analysis) => {
                    let job = ModerationJobData {
                        recitation_id: recitation.id,
                        audio_analysis: AnalysisSummary {
                            duration: analysis.duration_secs,
                            quality: analysis.quality,
                            deepfake_score: analysis.deepfake_score,
                        },
                    };
                    let payload = serde_json::to_value(&job)
                        .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                    self.queue
                        .enqueue(MODERATION_QUEUE, MODERATION_JOB, payload)?;
                    report.moderation_jobs += 1;
                }
                None => {
                    // Pending moderation without an analysis row should not
                    // happen; leave it for an operator.
                    warn!(recitation_id = %recitation.id, "pending moderation without analysis result");
                }
            }
        }

        if report.analysis_jobs + report.moderation_jobs > 0 {
            info!(
                analysis_jobs = report.analysis_jobs,
                moderation_jobs = report.moderation_jobs,
                "reconciliation sweep re-enqueued stranded work"
            );
        }
        Ok(report)
    }

    fn enqueue_analysis(&self, recitation: &Recitation) -> Result<(), ReconcileError> {
        let job = AnalysisJobData {
            recitation_id: recitation.id,
            audio_url: recitation.audio_url.clone().unwrap_or_default(),
            metadata: Some(JobMetadata {
                surah: Some(recitation.surah.to_string()),
                verses: Some(recitation.verses.to_string()),
            }),
        };
        let payload =
            serde_json::to_value(&job).map_err(|e| QueueError::Unavailable(e.to_string()))?;
        self.queue.enqueue(ANALYSIS_QUEUE, ANALYSIS_JOB, payload)?;
        Ok(())
    }
}
