//! Sitemap-Indexer: push a WordPress site's sitemap through the indexing API
//!
//! This crate resolves every URL listed in a site's XML sitemap(s) and submits each one
//! to a search engine's indexing endpoint, rotating between service-account credentials
//! and streaming ordered progress events to a connected client.

pub mod config;
pub mod credentials;
pub mod indexing;
pub mod job;
pub mod server;
pub mod sitemap;

use thiserror::Error;

/// Main error type for Sitemap-Indexer operations
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sitemap error: {0}")]
    Sitemap(#[from] SitemapError),

    #[error("Credential error: {0}")]
    Pool(#[from] PoolError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid credential in slot {slot}: {reason}")]
    InvalidCredential { slot: u8, reason: String },
}

/// Errors raised while resolving a site's sitemap
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("Invalid domain '{0}'")]
    InvalidDomain(String),

    #[error("Failed to fetch sitemap {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Failed to parse sitemap {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("Sitemap nesting exceeds depth {max_depth} at {url}")]
    TooDeep { url: String, max_depth: u8 },
}

/// Credential selection errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Credential slot {0} is not configured")]
    NotFound(u8),

    #[error("No usable credential left in the pool")]
    Exhausted,

    #[error("Credential slot {0} has no quota left or too many consecutive failures")]
    SlotExhausted(u8),
}

/// Errors raised while obtaining an access token for a credential
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to sign token assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Token endpoint rejected the assertion (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
}

impl AuthError {
    /// Returns true if retrying the token exchange may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Signing(_) => false,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

/// Result type alias for Sitemap-Indexer operations
pub type Result<T> = std::result::Result<T, IndexerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for sitemap resolution
pub type SitemapResult<T> = std::result::Result<T, SitemapError>;

// Re-export commonly used types
pub use config::Config;
pub use credentials::{Credential, CredentialPool};
pub use indexing::{Outcome, Submitter};
pub use job::{JobRequest, JobState, ProgressEvent};
pub use sitemap::SitemapResolver;
