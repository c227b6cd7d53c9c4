//! Credential pool and least-recently-used rotation

use crate::config::IndexingConfig;
use crate::credentials::auth::{exchange_token, AccessToken, KeyMaterial};
use crate::credentials::quota::{next_reset, AttemptResult, QuotaReport, QuotaState};
use crate::credentials::MAX_SLOTS;
use crate::{AuthError, ConfigError, PoolError};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::{Arc, Mutex, MutexGuard};

/// One configured service-account identity
pub struct Credential {
    slot: u8,
    material: KeyMaterial,
    quota: Mutex<QuotaState>,
    token: tokio::sync::Mutex<Option<AccessToken>>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("slot", &self.slot)
            .field("email", &self.material.key.client_email)
            .finish_non_exhaustive()
    }
}

impl Credential {
    fn new(slot: u8, material: KeyMaterial, now: DateTime<Utc>) -> Self {
        Self {
            slot,
            material,
            quota: Mutex::new(QuotaState::new(now)),
            token: tokio::sync::Mutex::new(None),
        }
    }

    /// Slot number (1..=5)
    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// Display name of the slot, e.g. `API3`
    pub fn name(&self) -> String {
        slot_name(self.slot)
    }

    /// Service-account email
    pub fn email(&self) -> &str {
        &self.material.key.client_email
    }

    /// Snapshot of the quota state
    pub fn quota(&self) -> QuotaState {
        self.lock_quota().clone()
    }

    /// Returns a valid access token for `scope`, exchanging a new one when the cached
    /// token is missing or about to expire
    pub async fn access_token(&self, client: &Client, scope: &str) -> Result<String, AuthError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.token.clone());
            }
        }

        let token = exchange_token(client, &self.material, scope).await?;
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Drops the cached access token so the next call exchanges a new one
    pub async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    fn lock_quota(&self) -> MutexGuard<'_, QuotaState> {
        // Quota counters stay consistent even if a holder panicked
        self.quota.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Display name for a slot number
pub fn slot_name(slot: u8) -> String {
    format!("API{}", slot)
}

/// Parses a slot display name (`API3`, case-insensitive) or bare number
pub fn parse_slot_name(name: &str) -> Option<u8> {
    let digits = match name.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("api") => &name[3..],
        _ => name,
    };
    digits
        .parse::<u8>()
        .ok()
        .filter(|slot| (1..=MAX_SLOTS).contains(slot))
}

/// The set of configured credentials, shared by all running jobs
///
/// Selection never mutates state. Each credential's quota state sits behind its own
/// lock, so concurrent jobs recording outcomes never lose updates.
#[derive(Debug)]
pub struct CredentialPool {
    credentials: Vec<Arc<Credential>>,
    daily_limit: u32,
    failure_threshold: u32,
}

impl CredentialPool {
    /// Parses the configured credential blobs
    ///
    /// # Arguments
    ///
    /// * `blobs` - `(slot, json)` pairs, at most one per slot in 1..=5
    /// * `config` - Indexing configuration (daily budget, failure threshold)
    ///
    /// # Returns
    ///
    /// * `Ok(CredentialPool)` - Every blob parsed into usable key material
    /// * `Err(ConfigError)` - A blob is malformed, a slot is out of range or repeated
    pub fn load(blobs: &[(u8, String)], config: &IndexingConfig) -> Result<Self, ConfigError> {
        let now = Utc::now();
        let mut credentials: Vec<Arc<Credential>> = Vec::with_capacity(blobs.len());

        for (slot, blob) in blobs {
            let slot = *slot;
            if !(1..=MAX_SLOTS).contains(&slot) {
                return Err(ConfigError::InvalidCredential {
                    slot,
                    reason: format!("slot must be between 1 and {}", MAX_SLOTS),
                });
            }
            if credentials.iter().any(|c| c.slot == slot) {
                return Err(ConfigError::InvalidCredential {
                    slot,
                    reason: "slot configured twice".to_string(),
                });
            }

            let material = KeyMaterial::parse(blob)
                .map_err(|reason| ConfigError::InvalidCredential { slot, reason })?;

            tracing::info!(
                "Loaded credential {} ({})",
                slot_name(slot),
                material.key.client_email
            );
            credentials.push(Arc::new(Credential::new(slot, material, now)));
        }

        credentials.sort_by_key(|c| c.slot);

        Ok(Self {
            credentials,
            daily_limit: config.daily_limit,
            failure_threshold: config.failure_threshold,
        })
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Configured slot numbers in ascending order
    pub fn slots(&self) -> Vec<u8> {
        self.credentials.iter().map(|c| c.slot).collect()
    }

    /// Looks up a configured slot
    pub fn get(&self, slot: u8) -> Result<Arc<Credential>, PoolError> {
        self.credentials
            .iter()
            .find(|c| c.slot == slot)
            .cloned()
            .ok_or(PoolError::NotFound(slot))
    }

    /// Picks a credential for the next submission
    ///
    /// A requested slot is returned as-is if configured. Without a preference the
    /// least-recently-used usable credential is returned (never-used first, ties by
    /// slot order).
    pub fn select(&self, preferred: Option<u8>) -> Result<Arc<Credential>, PoolError> {
        self.select_at(preferred, Utc::now())
    }

    /// [`select`](Self::select) evaluated at a given instant
    pub fn select_at(
        &self,
        preferred: Option<u8>,
        now: DateTime<Utc>,
    ) -> Result<Arc<Credential>, PoolError> {
        if let Some(slot) = preferred {
            return self.get(slot);
        }

        self.credentials
            .iter()
            .filter_map(|c| {
                let quota = c.lock_quota();
                quota
                    .is_usable(self.daily_limit, self.failure_threshold, now)
                    .then_some((quota.last_used, c))
            })
            .min_by_key(|(last_used, c)| (*last_used, c.slot))
            .map(|(_, c)| Arc::clone(c))
            .ok_or(PoolError::Exhausted)
    }

    /// Like [`select`](Self::select), but a pinned slot must also be usable
    pub fn select_usable(&self, preferred: Option<u8>) -> Result<Arc<Credential>, PoolError> {
        let now = Utc::now();
        let credential = self.select_at(preferred, now)?;
        if !self.is_usable_at(&credential, now) {
            return Err(PoolError::SlotExhausted(credential.slot));
        }
        Ok(credential)
    }

    /// Returns true if the credential is below its failure threshold and has budget
    pub fn is_usable(&self, credential: &Credential) -> bool {
        self.is_usable_at(credential, Utc::now())
    }

    fn is_usable_at(&self, credential: &Credential, now: DateTime<Utc>) -> bool {
        credential
            .lock_quota()
            .is_usable(self.daily_limit, self.failure_threshold, now)
    }

    /// Records the result of one attempt made with `credential`
    pub fn record_outcome(&self, credential: &Credential, result: AttemptResult) {
        self.record_outcome_at(credential, result, Utc::now());
    }

    /// [`record_outcome`](Self::record_outcome) at a given instant
    pub fn record_outcome_at(
        &self,
        credential: &Credential,
        result: AttemptResult,
        now: DateTime<Utc>,
    ) {
        let mut quota = credential.lock_quota();
        quota.record(result, now);

        if quota.consecutive_failures == self.failure_threshold {
            tracing::warn!(
                "{} reached {} consecutive failures and leaves rotation",
                credential.name(),
                quota.consecutive_failures
            );
        }
    }

    /// Clears the failure counter of a slot
    pub fn reset(&self, slot: u8) -> Result<(), PoolError> {
        let credential = self.get(slot)?;
        credential.lock_quota().reset_failures();
        tracing::info!("Reset failure counter of {}", credential.name());
        Ok(())
    }

    /// Quota summary of one credential
    pub fn quota_report(&self, credential: &Credential) -> QuotaReport {
        let now = Utc::now();
        let quota = credential.lock_quota();
        let used = quota.used_on(now);

        QuotaReport {
            slot: credential.slot,
            name: credential.name(),
            email: credential.email().to_string(),
            used,
            limit: self.daily_limit,
            remaining: self.daily_limit.saturating_sub(used),
            consecutive_failures: quota.consecutive_failures,
            usable: quota.is_usable(self.daily_limit, self.failure_threshold, now),
            resets_at: next_reset(now),
        }
    }

    /// Quota summaries for every configured slot
    pub fn reports(&self) -> Vec<QuotaReport> {
        self.credentials
            .iter()
            .map(|c| self.quota_report(c))
            .collect()
    }
}
