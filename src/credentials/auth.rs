//! Service-account key parsing and OAuth2 access-token exchange
//!
//! Tokens are obtained with the JWT-bearer grant: an RS256-signed assertion naming the
//! service account and the requested scope is posted to the key's `token_uri`.

use crate::AuthError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each assertion (the maximum the token endpoint accepts)
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Cached tokens are refreshed this long before they expire
const REFRESH_MARGIN_SECS: i64 = 60;

/// The fields of a service-account JSON key that token exchange needs
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Parsed key material: the key description plus its ready-to-use signing key
#[derive(Clone)]
pub struct KeyMaterial {
    pub key: ServiceAccountKey,
    encoding_key: EncodingKey,
}

impl KeyMaterial {
    /// Parses a single-line service-account JSON blob
    ///
    /// Fails if the blob is not JSON, lacks a client email or private key, or the
    /// private key is not an RSA PEM key.
    pub fn parse(blob: &str) -> Result<Self, String> {
        let key: ServiceAccountKey =
            serde_json::from_str(blob).map_err(|e| format!("not a service-account key: {}", e))?;

        if key.client_email.trim().is_empty() {
            return Err("client_email is empty".to_string());
        }

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| format!("private_key is not a valid RSA PEM key: {}", e))?;

        Ok(Self { key, encoding_key })
    }

    /// Builds a signed assertion for `scope`, issued at `now`
    pub fn assertion(&self, scope: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        Ok(encode(&header, &claims, &self.encoding_key)?)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// A bearer token and the instant it stops being valid
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Returns true if the token is still usable at `now` with the refresh margin
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Exchanges a fresh assertion for an access token
pub async fn exchange_token(
    client: &Client,
    material: &KeyMaterial,
    scope: &str,
) -> Result<AccessToken, AuthError> {
    let now = Utc::now();
    let assertion = material.assertion(scope, now)?;

    tracing::debug!(
        "Requesting access token for {} from {}",
        material.key.client_email,
        material.key.token_uri
    );

    let response = client
        .post(&material.key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => match err.error_description {
                Some(description) => format!("{}: {}", err.error, description),
                None => err.error,
            },
            Err(_) => body,
        };
        return Err(AuthError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    let token: TokenResponse = response.json().await?;
    Ok(AccessToken {
        token: token.access_token,
        expires_at: now + Duration::seconds(token.expires_in),
    })
}
