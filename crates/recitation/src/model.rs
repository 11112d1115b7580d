//! Recitation records: the aggregate and its two satellite records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tilawa_core::{DomainError, Entity, RecitationId, RecitationStatus, SurahNumber, UserId, VerseRange};

/// A user-submitted recitation. Single source of truth for pipeline state;
/// mutated only by the submission service and the two worker pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recitation {
    pub id: RecitationId,
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub surah: SurahNumber,
    pub verses: VerseRange,
    pub language: String,
    pub audio_url: Option<String>,
    pub duration_secs: Option<u32>,
    pub status: RecitationStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Recitation {
    type Id = RecitationId;

    fn id(&self) -> &RecitationId {
        &self.id
    }
}

/// Input for creating a draft. Surah and verses arrive as raw text and are
/// validated by the submission service.
#[derive(Debug, Clone)]
pub struct NewRecitation {
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub surah: String,
    pub verses: String,
    pub language: Option<String>,
}

/// Partial update applied to a recitation record. Absent fields are left
/// untouched; the store bumps `updated_at` on every applied patch.
#[derive(Debug, Clone, Default)]
pub struct RecitationPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub audio_url: Option<String>,
    pub duration_secs: Option<u32>,
    pub status: Option<RecitationStatus>,
    pub published_at: Option<DateTime<Utc>>,
}

impl RecitationPatch {
    pub fn status(status: RecitationStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Perceived audio quality bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    Low,
    Medium,
    High,
}

/// Normalized confidence in `[0, 1]` that the audio is synthetically
/// generated rather than a genuine human recitation.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct DeepfakeScore(f64);

impl DeepfakeScore {
    pub fn new(score: f64) -> Result<Self, DomainError> {
        if (0.0..=1.0).contains(&score) {
            Ok(Self(score))
        } else {
            Err(DomainError::validation(format!(
                "deepfake score out of range [0,1]: {score}"
            )))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for DeepfakeScore {
    type Error = DomainError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeepfakeScore> for f64 {
    fn from(value: DeepfakeScore) -> Self {
        value.0
    }
}

/// Analysis result, one per recitation (upsert semantics: redelivered jobs
/// must never produce a second row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioAnalysis {
    pub recitation_id: RecitationId,
    pub duration_secs: u32,
    pub quality: AudioQuality,
    pub deepfake_score: DeepfakeScore,
    pub analyzed_at: DateTime<Utc>,
}

impl Entity for AudioAnalysis {
    type Id = RecitationId;

    fn id(&self) -> &RecitationId {
        &self.recitation_id
    }
}

/// Moderation decision attached to a recitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModerationDecision {
    Approved,
    Rejected,
    Flagged,
    Pending,
}

impl ModerationDecision {
    /// Approved and Rejected conclude the pipeline; Flagged and Pending mean
    /// a fresh evaluation is still required.
    pub fn is_conclusive(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

/// Moderation log entry, one per recitation (upsert semantics).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationLog {
    pub recitation_id: RecitationId,
    pub decision: ModerationDecision,
    pub reason: String,
    pub kids_safe: bool,
    pub moderated_at: DateTime<Utc>,
}

impl Entity for ModerationLog {
    type Id = RecitationId;

    fn id(&self) -> &RecitationId {
        &self.recitation_id
    }
}
