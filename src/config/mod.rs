//! Configuration module for Sitemap-Indexer
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and reading credential blobs from the environment.
//!
//! # Example
//!
//! ```no_run
//! use sitemap_indexer::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("indexer.toml")).unwrap();
//! println!("Sitemap depth bound: {}", config.sitemap.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CredentialsConfig, IndexingConfig, ServerConfig, SitemapConfig};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_credential_blobs,
    parse_config,
};
