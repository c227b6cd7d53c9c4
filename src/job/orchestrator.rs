//! Job orchestrator - drives one domain through resolution and submission
//!
//! This module contains the job loop that:
//! - Resolves the domain's sitemap into a lazy URL sequence
//! - Picks a credential for each URL (pinned slot or rotation)
//! - Submits URLs strictly one at a time, in sitemap order
//! - Emits ordered progress events and honours cancellation between URLs

use crate::config::Config;
use crate::credentials::CredentialPool;
use crate::indexing::{Outcome, Submitter};
use crate::job::channel::{progress_channel, EventSink};
use crate::job::event::{EventKind, JobRequest, ProgressEvent, Totals};
use crate::job::state::JobState;
use crate::sitemap::{SitemapResolver, UrlStream};
use crate::{IndexerError, Result};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Final state of a finished job
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub id: u64,
    pub domain: String,
    pub state: JobState,
    pub totals: Totals,
    /// Number of progress events produced, terminal event included
    pub events: u64,
}

/// A job running in the background
#[derive(Debug)]
pub struct JobHandle {
    pub id: u64,
    /// Progress events, in production order; closes when the job ends
    pub events: mpsc::Receiver<ProgressEvent>,
    /// Cancels the job at its next checkpoint
    pub cancel: CancellationToken,
    pub task: JoinHandle<JobSummary>,
}

/// Shared entry point for starting jobs
///
/// Cloning is cheap; every clone shares the credential pool and job counter.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    pool: Arc<CredentialPool>,
    resolver: SitemapResolver,
    submitter: Submitter,
    event_buffer: usize,
    next_job_id: Arc<AtomicU64>,
}

impl Orchestrator {
    pub fn new(
        pool: Arc<CredentialPool>,
        resolver: SitemapResolver,
        submitter: Submitter,
        event_buffer: usize,
    ) -> Self {
        Self {
            pool,
            resolver,
            submitter,
            event_buffer,
            next_job_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Builds the resolver and submitter described by `config` around `pool`
    pub fn from_config(config: &Config, pool: Arc<CredentialPool>) -> Result<Self> {
        let resolver = SitemapResolver::new(&config.sitemap)?;
        let submitter = Submitter::new(&config.indexing, Arc::clone(&pool))?;
        Ok(Self::new(pool, resolver, submitter, config.server.event_buffer))
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    pub fn resolver(&self) -> &SitemapResolver {
        &self.resolver
    }

    /// Spawns a job and returns its progress receiver and cancellation handle
    pub fn start(&self, request: JobRequest) -> JobHandle {
        let id = self.next_job_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (sink, events) = progress_channel(self.event_buffer, cancel.clone());

        let orchestrator = self.clone();
        let job_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            Job::new(&orchestrator, id, request, sink, job_cancel)
                .run()
                .await
        });

        JobHandle {
            id,
            events,
            cancel,
            task,
        }
    }
}

/// State of one running job; owned by the task that runs it
struct Job<'a> {
    ctx: &'a Orchestrator,
    id: u64,
    domain: String,
    slot: Option<u8>,
    state: JobState,
    position: u64,
    totals: Totals,
    used_slots: BTreeSet<u8>,
    sink: EventSink,
    cancel: CancellationToken,
}

impl<'a> Job<'a> {
    fn new(
        ctx: &'a Orchestrator,
        id: u64,
        request: JobRequest,
        sink: EventSink,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ctx,
            id,
            domain: request.domain.trim().to_string(),
            slot: request.credential_slot,
            state: JobState::Created,
            position: 0,
            totals: Totals::default(),
            used_slots: BTreeSet::new(),
            sink,
            cancel,
        }
    }

    async fn run(mut self) -> JobSummary {
        tracing::info!("Job {} started for {}", self.id, self.domain);
        self.transition(JobState::Resolving);

        let mut stream = match self.begin_resolution().await {
            Ok(stream) => stream,
            Err(e) => return self.fail(e).await,
        };

        let mut pending = match stream.next_url().await {
            Ok(first) => first,
            Err(e) => return self.fail(e.into()).await,
        };

        if self.cancel.is_cancelled() {
            return self.cancelled().await;
        }

        let root = stream.root_url().unwrap_or_default().to_string();
        self.log(format!("Reading sitemap {}", root)).await;
        self.transition(JobState::Submitting);

        loop {
            if self.cancel.is_cancelled() {
                return self.cancelled().await;
            }

            let url = match pending.take() {
                Some(url) => url,
                None => match stream.next_url().await {
                    Ok(Some(url)) => url,
                    Ok(None) => break,
                    Err(e) => return self.fail(e.into()).await,
                },
            };

            // A sitemap fetch may have taken a while
            if self.cancel.is_cancelled() {
                return self.cancelled().await;
            }

            if let Err(e) = self.submit_one(&url).await {
                return self.fail(e).await;
            }

            tokio::task::yield_now().await;
        }

        self.complete(&stream).await
    }

    /// Validates the pinned slot and opens the URL stream
    async fn begin_resolution(&mut self) -> Result<UrlStream> {
        if let Some(slot) = self.slot {
            let credential = self.ctx.pool.get(slot)?;
            self.log(format!(
                "Indexing {} with {} ({})",
                self.domain,
                credential.name(),
                credential.email()
            ))
            .await;
        } else {
            self.log(format!(
                "Indexing {} rotating across {} credentials",
                self.domain,
                self.ctx.pool.len()
            ))
            .await;
        }

        Ok(self.ctx.resolver.resolve(&self.domain)?)
    }

    /// Submits one URL and reports it; `Err` only for job-fatal problems
    async fn submit_one(&mut self, url: &str) -> Result<()> {
        let credential = self.ctx.pool.select_usable(self.slot)?;

        self.position += 1;
        self.totals.submitted += 1;
        self.used_slots.insert(credential.slot());

        let name = credential.name();
        let started = format!("[{}] Submitting via {}", self.position, name);
        self.sink
            .emit(EventKind::Started, url, started, self.totals)
            .await;

        let report = self.ctx.submitter.submit(url, &credential).await;

        match report.outcome {
            Outcome::Success => {
                self.totals.succeeded += 1;
                let message = if report.attempts > 1 {
                    format!(
                        "[{}] Indexed via {} after {} attempts",
                        self.position, name, report.attempts
                    )
                } else {
                    format!("[{}] Indexed via {}", self.position, name)
                };
                self.sink
                    .emit(EventKind::Success, url, message, self.totals)
                    .await;
            }
            Outcome::Failure { reason, .. } => {
                self.totals.failed += 1;
                tracing::warn!("Job {}: {} failed: {}", self.id, url, reason);
                let message = format!("[{}] Failed via {}: {}", self.position, name, reason);
                self.sink
                    .emit(EventKind::Failure, url, message, self.totals)
                    .await;
            }
        }

        Ok(())
    }

    async fn complete(mut self, stream: &UrlStream) -> JobSummary {
        if stream.yielded() == 0 {
            self.log("Sitemap lists no URLs").await;
        }
        self.log_quotas().await;
        self.transition(JobState::Completed);

        let message = format!(
            "Completed {} URLs from {} sitemap documents. Succeeded: {}, Failed: {}",
            self.totals.submitted,
            stream.documents_fetched(),
            self.totals.succeeded,
            self.totals.failed
        );
        self.sink
            .emit(EventKind::Done, "", message, self.totals)
            .await;
        self.finish()
    }

    async fn cancelled(mut self) -> JobSummary {
        self.transition(JobState::Cancelled);
        let message = format!(
            "Cancelled after {} URLs. Succeeded: {}, Failed: {}",
            self.totals.submitted, self.totals.succeeded, self.totals.failed
        );
        self.sink.emit_cancelled(message, self.totals).await;
        self.finish()
    }

    async fn fail(mut self, error: IndexerError) -> JobSummary {
        let message = match &error {
            IndexerError::Sitemap(e) => format!("Failed to resolve sitemap: {}", e),
            IndexerError::Pool(e) => format!("Cannot continue: {}", e),
            other => other.to_string(),
        };
        tracing::error!("Job {} failed: {}", self.id, message);
        self.transition(JobState::Failed);
        self.sink
            .emit(EventKind::Error, "", message, self.totals)
            .await;
        self.finish()
    }

    fn finish(self) -> JobSummary {
        tracing::info!(
            "Job {} for {} ended {}: {} submitted, {} succeeded, {} failed",
            self.id,
            self.domain,
            self.state,
            self.totals.submitted,
            self.totals.succeeded,
            self.totals.failed
        );

        JobSummary {
            id: self.id,
            domain: self.domain,
            state: self.state,
            totals: self.totals,
            events: self.sink.emitted(),
        }
    }

    async fn log(&mut self, message: impl Into<String>) {
        self.sink
            .emit(EventKind::Log, "", message, self.totals)
            .await;
    }

    /// Reports the quota of every credential this job used
    async fn log_quotas(&mut self) {
        let slots: Vec<u8> = self.used_slots.iter().copied().collect();
        for slot in slots {
            if let Ok(credential) = self.ctx.pool.get(slot) {
                let report = self.ctx.pool.quota_report(&credential);
                self.log(report.message()).await;
            }
        }
    }

    fn transition(&mut self, to: JobState) {
        debug_assert!(
            self.state.can_transition_to(to),
            "invalid job transition {} -> {}",
            self.state,
            to
        );
        if to.is_terminal() {
            tracing::info!("Job {} {}", self.id, to);
        } else {
            tracing::debug!("Job {}: {} -> {}", self.id, self.state, to);
        }
        self.state = to;
    }
}
