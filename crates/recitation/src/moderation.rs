//! Moderation worker: gates the analysis result and settles the recitation.

use chrono::Utc;
use tracing::{debug, info};

use tilawa_core::{RecitationId, RecitationStatus};

use crate::jobs::{AnalysisSummary, ModerationJobData};
use crate::model::{ModerationDecision, ModerationLog, RecitationPatch};
use crate::ports::{
    Guarded, ModerationStore, RecitationRepository, RepoError, StatusChangeHook,
};

pub use crate::analysis::Outcome;

/// Deepfake score at or above this fails the authenticity gate.
pub const DEEPFAKE_THRESHOLD: f64 = 0.3;

pub const REASON_DEEPFAKE: &str = "high deepfake score detected";
pub const REASON_POLICY: &str = "content flagged by moderation rules";
pub const REASON_PASSED: &str = "all checks passed";

#[derive(Debug, thiserror::Error)]
#[error("moderation policy failed: {0}")]
pub struct PolicyError(pub String);

/// Pluggable content/authenticity check. The reference used randomness here;
/// implementations are expected to be deterministic per recitation so
/// redeliveries cannot flip the decision.
pub trait ModerationPolicy: Send + Sync {
    fn evaluate(&self, job: &ModerationJobData) -> Result<bool, PolicyError>;
}

/// Policy with a fixed answer; the demo approves everything.
#[derive(Debug, Clone, Copy)]
pub struct StaticPolicy {
    pub pass: bool,
}

impl StaticPolicy {
    pub fn approve_all() -> Self {
        Self { pass: true }
    }
}

impl ModerationPolicy for StaticPolicy {
    fn evaluate(&self, _job: &ModerationJobData) -> Result<bool, PolicyError> {
        Ok(self.pass)
    }
}

/// The settled decision for one recitation.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub decision: ModerationDecision,
    pub reason: &'static str,
    pub kids_safe: bool,
}

/// Pure decision logic: approved iff both gates pass. Reason picks the
/// deepfake gate first, then the policy gate.
pub fn decide(analysis: &AnalysisSummary, policy_passed: bool, threshold: f64) -> Verdict {
    let deepfake_passed = analysis.deepfake_score.value() < threshold;
    let decision = if deepfake_passed && policy_passed {
        ModerationDecision::Approved
    } else {
        ModerationDecision::Rejected
    };
    let reason = if !deepfake_passed {
        REASON_DEEPFAKE
    } else if !policy_passed {
        REASON_POLICY
    } else {
        REASON_PASSED
    };
    Verdict {
        decision,
        reason,
        kids_safe: deepfake_passed && policy_passed,
    }
}

/// Retryable moderation failure.
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("store unavailable: {0}")]
    Store(String),
}

/// Handler for one moderation delivery.
pub struct ModerationWorker<R, M, P, H> {
    repo: R,
    logs: M,
    policy: P,
    hook: H,
    threshold: f64,
}

impl<R, M, P, H> ModerationWorker<R, M, P, H>
where
    R: RecitationRepository,
    M: ModerationStore,
    P: ModerationPolicy,
    H: StatusChangeHook,
{
    pub fn new(repo: R, logs: M, policy: P, hook: H) -> Self {
        Self {
            repo,
            logs,
            policy,
            hook,
            threshold: DEEPFAKE_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Process one delivery.
    ///
    /// The decision is idempotent per recitation: a conclusive log written by
    /// an earlier delivery is reused rather than re-running the gates, so two
    /// processing attempts can never settle on different terminal decisions.
    pub fn handle(&self, job: &ModerationJobData) -> Result<Outcome, ModerationError> {
        let id = job.recitation_id;

        let existing = self.logs.find_by_recitation(id).map_err(store_err)?;
        let (decision, kids_safe) = match existing.filter(|log| log.decision.is_conclusive()) {
            Some(log) => {
                debug!(recitation_id = %id, decision = ?log.decision, "reusing prior moderation decision");
                (log.decision, log.kids_safe)
            }
            None => {
                let policy_passed = self.policy.evaluate(job)?;
                let verdict = decide(&job.audio_analysis, policy_passed, self.threshold);
                self.logs
                    .upsert(ModerationLog {
                        recitation_id: id,
                        decision: verdict.decision,
                        reason: verdict.reason.to_string(),
                        kids_safe: verdict.kids_safe,
                        moderated_at: Utc::now(),
                    })
                    .map_err(store_err)?;
                (verdict.decision, verdict.kids_safe)
            }
        };

        let target = match decision {
            ModerationDecision::Approved => RecitationStatus::Approved,
            ModerationDecision::Rejected => RecitationStatus::Rejected,
            // Conclusive filter above guarantees we never get here.
            ModerationDecision::Flagged | ModerationDecision::Pending => {
                return Ok(Outcome::Stale);
            }
        };

        match self.repo.update_where_status(
            id,
            &[RecitationStatus::PendingModeration],
            RecitationPatch::status(target),
        ) {
            Ok(Guarded::Applied { before, after }) => {
                self.notify(id, before, after.status);
                info!(
                    recitation_id = %id,
                    decision = ?decision,
                    kids_safe,
                    "moderation settled"
                );
                Ok(Outcome::Advanced)
            }
            Ok(Guarded::Rejected { current }) => {
                info!(recitation_id = %id, status = %current, "stale moderation job, skipping");
                Ok(Outcome::Stale)
            }
            Err(RepoError::NotFound) => {
                info!(recitation_id = %id, "recitation gone, dropping moderation job");
                Ok(Outcome::Stale)
            }
            Err(RepoError::Unavailable(msg)) => Err(ModerationError::Store(msg)),
        }
    }

    /// Fire the status hook when the transition crosses the publicly-visible
    /// boundary in either direction.
    fn notify(&self, id: RecitationId, old: RecitationStatus, new: RecitationStatus) {
        self.hook.status_changed(id, old, new);
    }
}

fn store_err(err: RepoError) -> ModerationError {
    ModerationError::Store(err.to_string())
}
