//! Recitation status lifecycle.
//!
//! The status graph is the single correctness mechanism for the pipeline:
//! workers only advance a recitation through a guarded compare-and-update, so
//! stale or duplicate deliveries can never move a record backward.
//!
//! ```text
//! Draft --upload--> Uploaded --analysis--> PendingModeration --approve--> Approved --publish--> Published
//!                      |                        |--reject--> Rejected
//!                      +--> Processing ---------^
//! any non-terminal state --delete--> Deleted
//! ```

use serde::{Deserialize, Serialize};

/// Pipeline status of a recitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecitationStatus {
    Draft,
    Uploaded,
    Processing,
    PendingModeration,
    Approved,
    Published,
    Rejected,
    Deleted,
}

impl RecitationStatus {
    /// Direct successors in the lifecycle graph.
    pub fn successors(self) -> &'static [RecitationStatus] {
        use RecitationStatus::*;
        match self {
            Draft => &[Uploaded, Deleted],
            Uploaded => &[Processing, PendingModeration, Deleted],
            Processing => &[PendingModeration, Deleted],
            PendingModeration => &[Approved, Rejected, Deleted],
            Approved => &[Published, Deleted],
            Published | Rejected | Deleted => &[],
        }
    }

    /// Whether `self -> next` is a valid lifecycle transition.
    pub fn can_transition_to(self, next: RecitationStatus) -> bool {
        self.successors().contains(&next)
    }

    /// Terminal states have no outgoing transitions. A rejected recitation is
    /// not resubmittable; the owner creates a new draft instead.
    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    /// Statuses shown on the public feed. Crossing this boundary in either
    /// direction invalidates the feed cache.
    pub fn is_publicly_visible(self) -> bool {
        matches!(
            self,
            RecitationStatus::Approved | RecitationStatus::Published
        )
    }

    /// Position along the pipeline, used to assert forward-only movement.
    /// `Deleted` sits outside the ordering (reachable from anywhere).
    fn pipeline_rank(self) -> u8 {
        use RecitationStatus::*;
        match self {
            Draft => 0,
            Uploaded => 1,
            Processing => 2,
            PendingModeration => 3,
            Approved | Rejected => 4,
            Published => 5,
            Deleted => u8::MAX,
        }
    }
}

impl core::fmt::Display for RecitationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            RecitationStatus::Draft => "DRAFT",
            RecitationStatus::Uploaded => "UPLOADED",
            RecitationStatus::Processing => "PROCESSING",
            RecitationStatus::PendingModeration => "PENDING_MODERATION",
            RecitationStatus::Approved => "APPROVED",
            RecitationStatus::Published => "PUBLISHED",
            RecitationStatus::Rejected => "REJECTED",
            RecitationStatus::Deleted => "DELETED",
        };
        f.write_str(s)
    }
}

/// All statuses, for exhaustive checks.
pub const ALL_STATUSES: [RecitationStatus; 8] = [
    RecitationStatus::Draft,
    RecitationStatus::Uploaded,
    RecitationStatus::Processing,
    RecitationStatus::PendingModeration,
    RecitationStatus::Approved,
    RecitationStatus::Published,
    RecitationStatus::Rejected,
    RecitationStatus::Deleted,
];
