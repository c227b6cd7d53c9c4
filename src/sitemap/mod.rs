//! Sitemap module: turns a site into the list of page URLs to submit
//!
//! This module contains:
//! - Domain input normalisation and root-sitemap candidates
//! - XML parsing of `urlset` and `sitemapindex` documents
//! - Lazy, deduplicating expansion of nested sitemap indexes

mod parser;
mod resolver;
mod target;

pub use parser::{parse_document, SitemapDocument};
pub use resolver::{build_sitemap_client, SitemapResolver, UrlStream};
pub use target::{normalize_domain, SiteTarget};
