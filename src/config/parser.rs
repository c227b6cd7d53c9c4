use crate::config::types::{Config, CredentialsConfig};
use crate::config::validation::validate;
use crate::credentials::MAX_SLOTS;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use sitemap_indexer::config::load_config;
///
/// let config = load_config(Path::new("indexer.toml")).unwrap();
/// println!("Max attempts: {}", config.indexing.max_attempts);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so a running server can be matched to the exact file it read.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Reads the raw credential blobs for every configured slot
///
/// Slot `n` (1..=5) is taken from the environment variable `{prefix}{n}_JSON`.
/// Unset or blank variables leave the slot unconfigured.
///
/// # Returns
///
/// `(slot, blob)` pairs in slot order
pub fn load_credential_blobs(config: &CredentialsConfig) -> Vec<(u8, String)> {
    (1..=MAX_SLOTS)
        .filter_map(|slot| {
            let var = format!("{}{}_JSON", config.env_prefix, slot);
            match std::env::var(&var) {
                Ok(value) if !value.trim().is_empty() => {
                    tracing::debug!("Found credential blob in {}", var);
                    Some((slot, value))
                }
                _ => None,
            }
        })
        .collect()
}
