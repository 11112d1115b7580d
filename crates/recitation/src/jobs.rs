//! Job payload contracts and queue names.
//!
//! Payloads cross the queue as camelCase JSON. Jobs are ephemeral: they exist
//! to trigger one transition and are discarded (or dead-lettered) afterwards,
//! so every field a worker needs must travel in the payload.

use serde::{Deserialize, Serialize};

use tilawa_core::RecitationId;

use crate::model::{AudioQuality, DeepfakeScore};

/// Queue consumed by the audio analysis worker pool.
pub const ANALYSIS_QUEUE: &str = "audio-process";
/// Queue consumed by the moderation worker pool.
pub const MODERATION_QUEUE: &str = "moderation-analyze";

pub const ANALYSIS_JOB: &str = "process-audio";
pub const MODERATION_JOB: &str = "moderate-recitation";

/// Payload of an analysis job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisJobData {
    pub recitation_id: RecitationId,
    pub audio_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JobMetadata>,
}

/// Scripture reference carried along for the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surah: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verses: Option<String>,
}

/// Payload of a moderation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationJobData {
    pub recitation_id: RecitationId,
    pub audio_analysis: AnalysisSummary,
}

/// The analysis facts moderation gates on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    /// Duration in seconds.
    pub duration: u32,
    pub quality: AudioQuality,
    pub deepfake_score: DeepfakeScore,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_payload_uses_camel_case_wire_names() {
        let job = AnalysisJobData {
            recitation_id: RecitationId::new(),
            audio_url: "https://example/audio.mp3".into(),
            metadata: Some(JobMetadata {
                surah: Some("1".into()),
                verses: Some("1-7".into()),
            }),
        };
        let value = serde_json::to_value(&job).unwrap();
        assert!(value.get("recitationId").is_some());
        assert!(value.get("audioUrl").is_some());
        assert_eq!(value["metadata"]["verses"], "1-7");

        let back: AnalysisJobData = serde_json::from_value(value).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn moderation_payload_roundtrips() {
        let job = ModerationJobData {
            recitation_id: RecitationId::new(),
            audio_analysis: AnalysisSummary {
                duration: 180,
                quality: AudioQuality::High,
                deepfake_score: DeepfakeScore::new(0.05).unwrap(),
            },
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["audioAnalysis"]["deepfakeScore"], 0.05);
        assert_eq!(value["audioAnalysis"]["quality"], "high");

        let back: ModerationJobData = serde_json::from_value(value).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn metadata_is_optional_on_the_wire() {
        let json = r#"{"recitationId":"018f0d6e-7c2a-7000-8000-000000000000","audioUrl":"u"}"#;
        let job: AnalysisJobData = serde_json::from_str(json).unwrap();
        assert!(job.metadata.is_none());
    }
}
