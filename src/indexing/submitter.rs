//! Indexing API submitter
//!
//! This module handles the authenticated "URL updated" notification for one URL:
//! - Obtaining the credential's access token
//! - Publishing the notification
//! - Classifying the response
//! - Retrying transient failures with exponential backoff
//! - Recording every attempt against the credential's quota

use crate::config::IndexingConfig;
use crate::credentials::{AttemptResult, Credential, CredentialPool};
use crate::indexing::retry::RetryPolicy;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// How a failed submission should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Transient (rate limited, server error, timeout); worth retrying
    Retryable,
    /// Permanent for this URL and credential
    Terminal,
}

/// Result of submitting one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure {
        kind: FailureKind,
        /// HTTP status of the last response, if one was received
        status: Option<u16>,
        reason: String,
    },
}

impl Outcome {
    fn failure(kind: FailureKind, status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            status,
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Failure {
                kind: FailureKind::Retryable,
                ..
            }
        )
    }
}

/// Outcome of [`Submitter::submit`] together with how it was reached
#[derive(Debug, Clone)]
pub struct SubmitReport {
    pub outcome: Outcome,
    /// Attempts made, including the first
    pub attempts: u32,
    /// Backoff slept before each retry, in order
    pub delays: Vec<Duration>,
}

/// Maps an indexing API status code to an outcome kind
///
/// | Status | Result |
/// |--------|--------|
/// | 2xx | success (`None`) |
/// | 429 | retryable |
/// | 5xx | retryable |
/// | anything else | terminal |
pub fn classify_status(status: StatusCode) -> Option<FailureKind> {
    if status.is_success() {
        None
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Some(FailureKind::Retryable)
    } else {
        Some(FailureKind::Terminal)
    }
}

#[derive(Debug, Serialize)]
struct UrlNotification<'a> {
    url: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Builds the HTTP client used for token exchange and indexing calls
pub fn build_indexing_client(config: &IndexingConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(config.request_timeout())
        .connect_timeout(config.request_timeout())
        .build()
}

/// Submits URLs to the indexing endpoint
#[derive(Debug, Clone)]
pub struct Submitter {
    client: Client,
    endpoint: String,
    scope: String,
    policy: RetryPolicy,
    pool: Arc<CredentialPool>,
}

impl Submitter {
    /// Creates a submitter that records attempt outcomes into `pool`
    pub fn new(config: &IndexingConfig, pool: Arc<CredentialPool>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_indexing_client(config)?,
            endpoint: config.endpoint.clone(),
            scope: config.scope.clone(),
            policy: RetryPolicy::from_config(config),
            pool,
        })
    }

    /// Submits `url` using `credential`, retrying transient failures
    ///
    /// Retryable failures are attempted up to the policy's cap with exponential
    /// backoff; once the cap is hit, or the credential runs out of budget or
    /// crosses its failure threshold, the URL is reported as a terminal failure.
    /// Terminal failures are never retried.
    pub async fn submit(&self, url: &str, credential: &Credential) -> SubmitReport {
        let mut delays = Vec::new();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let outcome = self.attempt(url, credential).await;

            let result = if outcome.is_success() {
                AttemptResult::Success
            } else {
                AttemptResult::Failure
            };
            self.pool.record_outcome(credential, result);

            match outcome {
                Outcome::Failure {
                    kind: FailureKind::Retryable,
                    status,
                    reason,
                } => {
                    if !self.policy.allows_retry(attempts) {
                        tracing::warn!(
                            "Giving up on {} after {} attempts: {}",
                            url,
                            attempts,
                            reason
                        );
                        return SubmitReport {
                            outcome: Outcome::failure(
                                FailureKind::Terminal,
                                status,
                                format!("gave up after {} attempts: {}", attempts, reason),
                            ),
                            attempts,
                            delays,
                        };
                    }

                    // Out of budget or over the failure threshold: leave the URL to
                    // its failure and let the next one rotate
                    if !self.pool.is_usable(credential) {
                        tracing::warn!(
                            "{} no longer usable; giving up on {} after {} attempts",
                            credential.name(),
                            url,
                            attempts
                        );
                        return SubmitReport {
                            outcome: Outcome::failure(
                                FailureKind::Terminal,
                                status,
                                format!(
                                    "credential {} exhausted after {} attempts: {}",
                                    credential.name(),
                                    attempts,
                                    reason
                                ),
                            ),
                            attempts,
                            delays,
                        };
                    }

                    let delay = self.policy.backoff(attempts - 1);
                    tracing::warn!(
                        "Attempt {} for {} via {} failed ({}); retrying in {:?}",
                        attempts,
                        url,
                        credential.name(),
                        reason,
                        delay
                    );
                    delays.push(delay);
                    tokio::time::sleep(delay).await;
                }
                outcome => {
                    return SubmitReport {
                        outcome,
                        attempts,
                        delays,
                    }
                }
            }
        }
    }

    /// Performs exactly one authenticated notification
    async fn attempt(&self, url: &str, credential: &Credential) -> Outcome {
        let token = match credential.access_token(&self.client, &self.scope).await {
            Ok(token) => token,
            Err(e) => {
                let kind = if e.is_retryable() {
                    FailureKind::Retryable
                } else {
                    FailureKind::Terminal
                };
                let status = match &e {
                    crate::AuthError::Rejected { status, .. } => Some(*status),
                    _ => None,
                };
                return Outcome::failure(kind, status, format!("token exchange failed: {}", e));
            }
        };

        let body = UrlNotification {
            url,
            kind: "URL_UPDATED",
        };

        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                // Transport problems, timeouts included, are transient
                let reason = if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                };
                return Outcome::failure(FailureKind::Retryable, None, reason);
            }
        };

        let status = response.status();
        let Some(kind) = classify_status(status) else {
            tracing::debug!("{} accepted via {}", url, credential.name());
            return Outcome::Success;
        };

        if status == StatusCode::UNAUTHORIZED {
            credential.invalidate_token().await;
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorResponse>(&text)
            .ok()
            .map(|e| e.error.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

        Outcome::failure(kind, Some(status.as_u16()), message)
    }
}
