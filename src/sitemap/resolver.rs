//! Sitemap resolution: root discovery, index expansion and URL deduplication
//!
//! Expansion is iterative. Every sitemap document ever queued gets a node in an arena
//! keyed by its URL, with a link to the index that listed it and its nesting depth. A
//! work stack of arena indices drives the fetches, so nested indexes never recurse.
//!
//! - A child listed deeper than `max_depth` fails with `SitemapError::TooDeep`
//! - A child that is its own ancestor (a cycle) fails the same way, since following
//!   it would nest without bound
//! - A child already queued through another branch is skipped

use crate::config::SitemapConfig;
use crate::sitemap::parser::{parse_document, SitemapDocument};
use crate::sitemap::target::SiteTarget;
use crate::{SitemapError, SitemapResult};
use reqwest::Client;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

/// Builds the HTTP client used for sitemap requests
pub fn build_sitemap_client(config: &SitemapConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.fetch_timeout())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Resolves a site's sitemap into a flat sequence of page URLs
#[derive(Debug, Clone)]
pub struct SitemapResolver {
    client: Client,
    paths: Vec<String>,
    max_depth: u8,
}

impl SitemapResolver {
    /// Creates a resolver with its own HTTP client
    pub fn new(config: &SitemapConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_sitemap_client(config)?, config))
    }

    /// Creates a resolver around an existing client
    pub fn with_client(client: Client, config: &SitemapConfig) -> Self {
        Self {
            client,
            paths: config.paths.clone(),
            max_depth: config.max_depth,
        }
    }

    /// Starts resolving `domain`
    ///
    /// Nothing is fetched until the stream is polled. Every call returns a fresh
    /// stream that starts again from the root sitemap.
    ///
    /// # Returns
    ///
    /// * `Ok(UrlStream)` - A lazy sequence of deduplicated page URLs
    /// * `Err(SitemapError::InvalidDomain)` - The input does not name a host
    pub fn resolve(&self, domain: &str) -> SitemapResult<UrlStream> {
        let target = SiteTarget::parse(domain)?;
        Ok(self.resolve_target(&target))
    }

    /// Starts resolving an already-parsed target
    pub fn resolve_target(&self, target: &SiteTarget) -> UrlStream {
        UrlStream::new(self.clone(), target.root_candidates(&self.paths))
    }

    /// Resolves the whole sitemap at once
    pub async fn resolve_all(&self, domain: &str) -> SitemapResult<Vec<String>> {
        let mut stream = self.resolve(domain)?;
        let mut urls = Vec::new();
        while let Some(url) = stream.next_url().await? {
            urls.push(url);
        }
        Ok(urls)
    }

    /// Fetches and parses one sitemap document
    async fn fetch_document(&self, url: &str) -> SitemapResult<SitemapDocument> {
        tracing::debug!("Fetching sitemap {}", url);

        let fetch_error = |reason: String| SitemapError::Fetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(describe_request_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status.as_u16())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| fetch_error(describe_request_error(&e)))?;

        parse_document(&body).map_err(|reason| SitemapError::Parse {
            url: url.to_string(),
            reason,
        })
    }
}

fn describe_request_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}

/// One sitemap document known to the resolver
#[derive(Debug, Clone)]
struct SitemapNode {
    url: String,
    parent: Option<usize>,
    depth: u8,
}

/// Lazy, finite sequence of page URLs from one resolution
///
/// Leaf sitemaps are fetched one at a time as URLs are consumed, so the first URLs
/// are available before the whole tree has been walked.
#[derive(Debug)]
pub struct UrlStream {
    resolver: SitemapResolver,
    root_candidates: Vec<String>,
    root: Option<usize>,
    arena: Vec<SitemapNode>,
    by_url: HashMap<String, usize>,
    stack: Vec<usize>,
    ready: VecDeque<String>,
    seen: HashSet<String>,
    documents_fetched: usize,
    yielded: usize,
    done: bool,
}

impl UrlStream {
    fn new(resolver: SitemapResolver, root_candidates: Vec<String>) -> Self {
        Self {
            resolver,
            root_candidates,
            root: None,
            arena: Vec::new(),
            by_url: HashMap::new(),
            stack: Vec::new(),
            ready: VecDeque::new(),
            seen: HashSet::new(),
            documents_fetched: 0,
            yielded: 0,
            done: false,
        }
    }

    /// Root sitemap URL, once one of the candidates has been fetched
    pub fn root_url(&self) -> Option<&str> {
        self.root.map(|i| self.arena[i].url.as_str())
    }

    /// Number of sitemap documents fetched so far
    pub fn documents_fetched(&self) -> usize {
        self.documents_fetched
    }

    /// Number of URLs handed out so far
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Returns the next unseen page URL
    ///
    /// # Returns
    ///
    /// * `Ok(Some(url))` - The next URL in first-seen order
    /// * `Ok(None)` - The sitemap tree is exhausted (or resolution already failed)
    /// * `Err(SitemapError)` - A document could not be fetched or parsed, or the tree
    ///   nests too deep; the stream is finished afterwards
    pub async fn next_url(&mut self) -> SitemapResult<Option<String>> {
        loop {
            if let Some(url) = self.ready.pop_front() {
                self.yielded += 1;
                return Ok(Some(url));
            }

            if self.done {
                return Ok(None);
            }

            let step = if self.root.is_none() {
                self.fetch_root().await
            } else if let Some(node) = self.stack.pop() {
                self.fetch_node(node).await
            } else {
                self.done = true;
                tracing::debug!(
                    "Sitemap exhausted: {} URLs from {} documents",
                    self.yielded,
                    self.documents_fetched
                );
                continue;
            };

            if let Err(e) = step {
                self.done = true;
                self.ready.clear();
                return Err(e);
            }
        }
    }

    async fn fetch_root(&mut self) -> SitemapResult<()> {
        let mut last_error = None;
        let candidates = self.root_candidates.clone();

        for candidate in candidates {
            match self.resolver.fetch_document(&candidate).await {
                Ok(document) => {
                    tracing::info!(
                        "Using root sitemap {} ({} entries)",
                        candidate,
                        document.len()
                    );
                    let root = self.add_node(candidate, None, 0);
                    self.root = Some(root);
                    self.documents_fetched += 1;
                    return self.expand(root, document);
                }
                Err(e) => {
                    tracing::debug!("Root candidate failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SitemapError::Fetch {
            url: String::new(),
            reason: "no sitemap paths configured".to_string(),
        }))
    }

    async fn fetch_node(&mut self, node: usize) -> SitemapResult<()> {
        let document = self.resolver.fetch_document(&self.arena[node].url).await?;
        self.documents_fetched += 1;
        self.expand(node, document)
    }

    fn add_node(&mut self, url: String, parent: Option<usize>, depth: u8) -> usize {
        let index = self.arena.len();
        self.by_url.insert(url.clone(), index);
        self.arena.push(SitemapNode { url, parent, depth });
        index
    }

    /// Returns true if `candidate` is `node` or one of its ancestors
    fn is_ancestor_or_self(&self, candidate: usize, node: usize) -> bool {
        let mut current = Some(node);
        while let Some(index) = current {
            if index == candidate {
                return true;
            }
            current = self.arena[index].parent;
        }
        false
    }

    fn expand(&mut self, node: usize, document: SitemapDocument) -> SitemapResult<()> {
        match document {
            SitemapDocument::UrlSet(locs) => {
                let before = self.ready.len();
                for loc in locs {
                    if self.seen.insert(loc.clone()) {
                        self.ready.push_back(loc);
                    }
                }
                tracing::debug!(
                    "{} contributed {} new URLs",
                    self.arena[node].url,
                    self.ready.len() - before
                );
            }
            SitemapDocument::Index(children) => {
                let depth = self.arena[node].depth + 1;
                let mut queued = Vec::new();

                for child in children {
                    if depth > self.resolver.max_depth {
                        return Err(SitemapError::TooDeep {
                            url: child,
                            max_depth: self.resolver.max_depth,
                        });
                    }

                    if let Some(&existing) = self.by_url.get(&child) {
                        if self.is_ancestor_or_self(existing, node) {
                            return Err(SitemapError::TooDeep {
                                url: child,
                                max_depth: self.resolver.max_depth,
                            });
                        }
                        tracing::debug!("Skipping already queued sitemap {}", child);
                        continue;
                    }

                    queued.push(self.add_node(child, Some(node), depth));
                }

                // Reversed so the first child is fetched first
                self.stack.extend(queued.into_iter().rev());
            }
        }
        Ok(())
    }
}
