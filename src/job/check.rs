use crate::credentials::QuotaReport;
use crate::job::orchestrator::Orchestrator;
use crate::sitemap::SiteTarget;
use crate::SitemapResult;
use serde::Serialize;

/// Pre-flight view of a domain: how many URLs it has and which credentials can
/// cover them today
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    /// Normalised domain (no scheme or path)
    pub domain: String,
    /// Unique URLs listed by the sitemap
    pub total: usize,
    /// Usable slots whose remaining budget covers `total`
    pub candidates: Vec<u8>,
    pub quotas: Vec<QuotaReport>,
}

impl CheckReport {
    /// Human-readable lines, one per credential
    pub fn details(&self) -> Vec<String> {
        self.quotas.iter().map(QuotaReport::message).collect()
    }
}

impl Orchestrator {
    /// Resolves the whole sitemap of `input` and matches it against credential quotas
    pub async fn check(&self, input: &str) -> SitemapResult<CheckReport> {
        let target = SiteTarget::parse(input)?;
        let mut stream = self.resolver().resolve_target(&target);

        let mut total = 0;
        while stream.next_url().await?.is_some() {
            total += 1;
        }

        let quotas = self.pool().reports();
        let candidates = quotas
            .iter()
            .filter(|q| q.usable && q.remaining as usize >= total)
            .map(|q| q.slot)
            .collect();

        tracing::info!("Checked {}: {} URLs", target.domain(), total);

        Ok(CheckReport {
            domain: target.domain().to_string(),
            total,
            candidates,
            quotas,
        })
    }
}
