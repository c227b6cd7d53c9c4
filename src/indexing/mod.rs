//! Indexing module: one authenticated notification per URL
//!
//! This module contains:
//! - The submitter that publishes "URL updated" notifications
//! - Response classification into retryable and terminal failures
//! - The retry policy (attempt cap, exponential backoff)

mod retry;
mod submitter;

pub use retry::RetryPolicy;
pub use submitter::{
    build_indexing_client, classify_status, FailureKind, Outcome, SubmitReport, Submitter,
};
