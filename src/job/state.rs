/// Job lifecycle state definitions
///
/// A job moves strictly forward through these states; the last three are terminal.
use serde::Serialize;
use std::fmt;

/// Represents the current lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    // ===== Active States =====
    /// Job accepted, nothing fetched yet
    Created,

    /// Fetching the root sitemap and waiting for the first URL
    Resolving,

    /// Submitting URLs one at a time
    Submitting,

    // ===== Terminal States =====
    /// Every URL was processed
    Completed,

    /// Aborted by a resolution or credential error
    Failed,

    /// Stopped on request of the subscriber (or its disconnect)
    Cancelled,
}

impl JobState {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the lifecycle allows moving from `self` to `to`
    pub fn can_transition_to(&self, to: JobState) -> bool {
        matches!(
            (self, to),
            (Self::Created, Self::Resolving)
                | (Self::Created, Self::Failed)
                | (Self::Resolving, Self::Submitting)
                | (Self::Resolving, Self::Failed)
                | (Self::Resolving, Self::Cancelled)
                | (Self::Submitting, Self::Completed)
                | (Self::Submitting, Self::Failed)
                | (Self::Submitting, Self::Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Resolving => "resolving",
            Self::Submitting => "submitting",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
