//! Integration tests for Sitemap-Indexer
//!
//! These tests use wiremock to stand in for the website, the token endpoint and
//! the indexing API, and exercise resolution, submission and whole jobs end-to-end.

mod server_tests;
mod sitemap_tests;
mod submitter_tests;
