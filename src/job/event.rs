//! Progress events and the messages exchanged with a job's subscriber

use crate::credentials::MAX_SLOTS;
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// What a progress event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Submission of a URL is about to start
    Started,
    /// The URL was accepted
    Success,
    /// The URL failed (after any retries)
    Failure,
    /// Informational message
    Log,
    /// Final event of a completed or cancelled job
    Done,
    /// Final event of a failed job
    Error,
}

/// Cumulative per-job counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// One message on the progress channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Strictly increasing per job, starting at 1
    pub ordinal: u64,
    /// URL the event is about; empty for job-level events
    pub url: String,
    pub kind: EventKind,
    pub message: String,
    pub totals: Totals,
    pub timestamp: DateTime<Utc>,
    /// Set on the `done` event of a cancelled job
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

/// Payload that starts a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub domain: String,
    /// Pin every submission to this slot instead of rotating
    #[serde(default, deserialize_with = "deserialize_slot")]
    pub credential_slot: Option<u8>,
}

/// Accepts only slot numbers `1..=MAX_SLOTS`
fn deserialize_slot<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<u8>::deserialize(deserializer)? {
        Some(slot) if !(1..=MAX_SLOTS).contains(&slot) => Err(D::Error::custom(format!(
            "credentialSlot must be between 1 and {}, got {}",
            MAX_SLOTS, slot
        ))),
        slot => Ok(slot),
    }
}

impl JobRequest {
    pub fn new(domain: impl Into<String>, credential_slot: Option<u8>) -> Self {
        Self {
            domain: domain.into(),
            credential_slot,
        }
    }
}

/// Control messages a subscriber may send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Cancel,
}
