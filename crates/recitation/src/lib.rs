//! `tilawa-recitation` — the recitation submission pipeline.
//!
//! A recitation moves through upload, automated audio analysis and content
//! moderation to a terminal published-or-rejected state. This crate holds the
//! domain side of that pipeline: the records, the ports it talks through, the
//! job payload contracts, the submission service and the two worker handlers.
//! Infrastructure (queues, stores, cache) lives in `tilawa-infra`.

pub mod analysis;
pub mod jobs;
#[cfg(test)]
pub(crate) mod testutil;
pub mod model;
pub mod moderation;
pub mod ports;
pub mod reconcile;
pub mod submission;

pub use analysis::{AnalysisWorker, AudioScorer, ScoredAudio};
pub use jobs::{AnalysisJobData, ModerationJobData};
pub use model::{
    AudioAnalysis, AudioQuality, DeepfakeScore, ModerationDecision, ModerationLog, Recitation,
};
pub use moderation::{ModerationPolicy, ModerationWorker};
pub use ports::{
    AnalysisStore, AudioStorage, Guarded, JobProducer, ModerationStore, RecitationRepository,
    StatusChangeHook,
};
pub use submission::SubmissionService;
