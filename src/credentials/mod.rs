//! Credential module: service-account identities used to authenticate submissions
//!
//! # Components
//!
//! - `CredentialPool`: the configured slots and least-recently-used rotation
//! - `QuotaState`: per-credential daily budget and consecutive-failure counter
//! - `KeyMaterial`: parsed service-account keys and access-token exchange

mod auth;
mod pool;
mod quota;

pub use auth::{exchange_token, AccessToken, KeyMaterial, ServiceAccountKey};
pub use pool::{parse_slot_name, slot_name, Credential, CredentialPool};
pub use quota::{next_reset, AttemptResult, QuotaReport, QuotaState};

/// Number of credential slots the configuration can hold
pub const MAX_SLOTS: u8 = 5;
