use crate::config::types::{Config, CredentialsConfig, IndexingConfig, ServerConfig, SitemapConfig};
use crate::ConfigError;
use std::net::SocketAddr;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_server_config(&config.server)?;
    validate_sitemap_config(&config.sitemap)?;
    validate_indexing_config(&config.indexing)?;
    validate_credentials_config(&config.credentials)?;
    Ok(())
}

/// Validates server configuration
fn validate_server_config(config: &ServerConfig) -> Result<(), ConfigError> {
    config.bind_address.parse::<SocketAddr>().map_err(|e| {
        ConfigError::Validation(format!(
            "bind_address '{}' is not a socket address: {}",
            config.bind_address, e
        ))
    })?;

    if config.event_buffer < 1 || config.event_buffer > 4096 {
        return Err(ConfigError::Validation(format!(
            "event_buffer must be between 1 and 4096, got {}",
            config.event_buffer
        )));
    }

    if config.send_timeout_secs == 0 || config.ping_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "send_timeout_secs and ping_interval_secs must be positive".to_string(),
        ));
    }

    if config.pong_timeout_secs <= config.ping_interval_secs {
        return Err(ConfigError::Validation(format!(
            "pong_timeout_secs ({}) must exceed ping_interval_secs ({})",
            config.pong_timeout_secs, config.ping_interval_secs
        )));
    }

    Ok(())
}

/// Validates sitemap configuration
fn validate_sitemap_config(config: &SitemapConfig) -> Result<(), ConfigError> {
    if config.paths.is_empty() {
        return Err(ConfigError::Validation(
            "sitemap paths cannot be empty".to_string(),
        ));
    }

    for path in &config.paths {
        if path.trim().is_empty() || path.contains("://") {
            return Err(ConfigError::Validation(format!(
                "sitemap path '{}' must be a non-empty path relative to the site root",
                path
            )));
        }
    }

    if config.max_depth < 1 || config.max_depth > 16 {
        return Err(ConfigError::Validation(format!(
            "sitemap max_depth must be between 1 and 16, got {}",
            config.max_depth
        )));
    }

    if config.fetch_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "sitemap fetch_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sitemap user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates indexing API configuration
fn validate_indexing_config(config: &IndexingConfig) -> Result<(), ConfigError> {
    let endpoint = Url::parse(&config.endpoint).map_err(|e| {
        ConfigError::Validation(format!("Invalid indexing endpoint: {}", e))
    })?;

    if !matches!(endpoint.scheme(), "https" | "http") {
        return Err(ConfigError::Validation(format!(
            "Indexing endpoint '{}' must use HTTP(S)",
            config.endpoint
        )));
    }

    if config.scope.is_empty() {
        return Err(ConfigError::Validation("scope cannot be empty".to_string()));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.max_backoff_ms < config.base_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "max_backoff_ms ({}) must be >= base_backoff_ms ({})",
            config.max_backoff_ms, config.base_backoff_ms
        )));
    }

    if config.daily_limit < 1 {
        return Err(ConfigError::Validation(
            "daily_limit must be >= 1".to_string(),
        ));
    }

    if config.failure_threshold < 1 {
        return Err(ConfigError::Validation(
            "failure_threshold must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates credential source configuration
fn validate_credentials_config(config: &CredentialsConfig) -> Result<(), ConfigError> {
    if config.env_prefix.is_empty() {
        return Err(ConfigError::Validation(
            "credentials env_prefix cannot be empty".to_string(),
        ));
    }

    if !config
        .env_prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "credentials env_prefix must be alphanumeric or '_', got '{}'",
            config.env_prefix
        )));
    }

    Ok(())
}
