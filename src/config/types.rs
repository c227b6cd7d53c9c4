use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Sitemap-Indexer
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sitemap: SitemapConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// HTTP / WebSocket server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    /// Socket address the server listens on
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Number of progress events buffered between a job and its subscriber
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Always advertise `wss://` progress channels (for TLS-terminating proxies that
    /// do not forward the original scheme)
    #[serde(default)]
    pub force_secure_websocket: bool,

    /// Longest a single WebSocket frame may take to be accepted (seconds)
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,

    /// Interval between keep-alive pings to the subscriber (seconds)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// A subscriber silent for this long is treated as gone (seconds)
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
}

/// Sitemap discovery configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SitemapConfig {
    /// Candidate paths of the root sitemap, tried in order
    #[serde(default = "default_sitemap_paths")]
    pub paths: Vec<String>,

    /// Maximum nesting of sitemap indexes below the root document
    #[serde(default = "default_max_depth")]
    pub max_depth: u8,

    /// Hard timeout for one sitemap document fetch (seconds)
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// User agent sent with sitemap requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Indexing API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexingConfig {
    /// URL notification publish endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// OAuth2 scope requested for access tokens
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Hard timeout for one indexing or token request (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum attempts per URL for retryable failures
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the first retry (milliseconds)
    #[serde(default = "default_base_backoff")]
    pub base_backoff_ms: u64,

    /// Upper bound for a single backoff delay (milliseconds)
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Requests each credential may issue per UTC day
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,

    /// Consecutive failures after which a credential is taken out of rotation
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

/// Where credential blobs come from
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CredentialsConfig {
    /// Slot `n` is read from the environment variable `{env_prefix}{n}_JSON`
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,
}

impl SitemapConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl IndexingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            event_buffer: default_event_buffer(),
            force_secure_websocket: false,
            send_timeout_secs: default_send_timeout(),
            ping_interval_secs: default_ping_interval(),
            pong_timeout_secs: default_pong_timeout(),
        }
    }
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            paths: default_sitemap_paths(),
            max_depth: default_max_depth(),
            fetch_timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            scope: default_scope(),
            request_timeout_secs: default_request_timeout(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff(),
            max_backoff_ms: default_max_backoff(),
            daily_limit: default_daily_limit(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            env_prefix: default_env_prefix(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_event_buffer() -> usize {
    64
}

fn default_send_timeout() -> u64 {
    10
}

fn default_ping_interval() -> u64 {
    15
}

fn default_pong_timeout() -> u64 {
    45
}

fn default_sitemap_paths() -> Vec<String> {
    vec!["sitemap_index.xml".to_string(), "sitemap.xml".to_string()]
}

fn default_max_depth() -> u8 {
    5
}

fn default_fetch_timeout() -> u64 {
    15
}

fn default_user_agent() -> String {
    format!("sitemap-indexer/{}", env!("CARGO_PKG_VERSION"))
}

fn default_endpoint() -> String {
    "https://indexing.googleapis.com/v3/urlNotifications:publish".to_string()
}

fn default_scope() -> String {
    "https://www.googleapis.com/auth/indexing".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    8_000
}

fn default_daily_limit() -> u32 {
    200
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_env_prefix() -> String {
    "API".to_string()
}
