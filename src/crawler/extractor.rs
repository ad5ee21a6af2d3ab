//! Section extractor: turns discovered targets into structured records
//!
//! Reads the discovered-targets store, skips anything already extracted, and
//! fetches the rest under the same concurrency bound and politeness delay as
//! discovery. Transient failures retry with exponential backoff; terminal
//! failures land in the failed-targets store. Workers never write the stores
//! themselves - completed results flow over a channel to a single writer task
//! that owns both stores.

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, fetch_page};
use crate::crawler::parser::parse_section_page;
use crate::state::{ItemState, RetryPolicy};
use crate::storage::{
    DiscoveredStore, ErrorKind, FailedStore, FailedTarget, SectionRecord, SectionStore,
    StorageError,
};
use crate::Result;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

/// Summary of one extraction run
#[derive(Debug, Clone, Default)]
pub struct ExtractionStats {
    /// Records written this run
    pub extracted: u64,

    /// Targets that terminally failed this run
    pub failed: u64,

    /// Targets skipped because a record already existed
    pub skipped: u64,
}

/// What a worker hands the writer task
enum WriteCommand {
    Section(SectionRecord),
    Failure(FailedTarget),
}

/// Concurrent extractor over the discovered-targets store
pub struct SectionExtractor {
    config: Config,
    client: Client,
    policy: RetryPolicy,
    discovered_store: DiscoveredStore,
    section_store: SectionStore,
    failed_store: FailedStore,
    shutdown: Arc<AtomicBool>,
}

impl SectionExtractor {
    pub fn new(config: Config) -> Result<Self> {
        config.storage.ensure_data_dir()?;

        let client = build_http_client(&config.user_agent, config.crawler.timeout_seconds)?;
        let policy = RetryPolicy::from_config(&config.retry);
        let discovered_store = DiscoveredStore::new(config.storage.discovered_path());
        let section_store = SectionStore::new(config.storage.sections_path());
        let failed_store = FailedStore::new(config.storage.failed_path());

        Ok(Self {
            config,
            client,
            policy,
            discovered_store,
            section_store,
            failed_store,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Handle for requesting a graceful shutdown from another task
    ///
    /// Workers stop picking up new targets; in-flight fetches finish and their
    /// results are written (each append is durable on its own, so nothing else
    /// needs flushing).
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Extracts every discovered target that has no record yet
    ///
    /// Skip-if-present makes re-runs cheap and idempotent: a second run over
    /// an unchanged discovered set performs zero fetches.
    pub async fn run(&self) -> Result<ExtractionStats> {
        let discovered = self.discovered_store.load()?;
        let already_extracted = self.extracted_urls()?;

        let mut work = Vec::new();
        let mut skipped = 0u64;
        for target in discovered {
            if already_extracted.contains(&target.canonical_url) {
                skipped += 1;
            } else {
                work.push(target.canonical_url);
            }
        }

        tracing::info!(
            "Extraction work set: {} targets ({} already extracted)",
            work.len(),
            skipped
        );

        self.process(work, skipped).await
    }

    /// Recovery pass: re-runs extraction over the failed-targets store
    ///
    /// Recovered URLs gain a section record that supersedes the stale failure;
    /// the stores are append-only, so old failure entries stay on disk and
    /// reconciliation treats the record as authoritative.
    pub async fn retry_failed(&self) -> Result<ExtractionStats> {
        let already_extracted = self.extracted_urls()?;

        let mut seen = HashSet::new();
        let mut work = Vec::new();
        for failure in self.failed_store.load()? {
            if already_extracted.contains(&failure.canonical_url) {
                continue;
            }
            if seen.insert(failure.canonical_url.clone()) {
                work.push(failure.canonical_url);
            }
        }

        tracing::info!("Retrying {} previously failed targets", work.len());

        self.process(work, 0).await
    }

    /// URLs that already have a section record
    fn extracted_urls(&self) -> Result<HashSet<String>> {
        Ok(self
            .section_store
            .load()?
            .into_iter()
            .map(|record| record.source_url)
            .collect())
    }

    /// Fans the work set out to fetch workers and funnels results through the
    /// single writer task
    async fn process(&self, work: Vec<String>, skipped: u64) -> Result<ExtractionStats> {
        let (tx, mut rx) = mpsc::channel::<WriteCommand>(64);

        let section_store = self.section_store.clone();
        let failed_store = self.failed_store.clone();
        let writer = tokio::spawn(async move {
            let mut extracted = 0u64;
            let mut failed = 0u64;
            while let Some(command) = rx.recv().await {
                match command {
                    WriteCommand::Section(record) => {
                        section_store.append(&record)?;
                        tracing::info!("Extracted: {}", record.citation);
                        extracted += 1;
                    }
                    WriteCommand::Failure(failure) => {
                        failed_store.append(&failure)?;
                        tracing::warn!(
                            "Giving up on {} after {} attempt(s): {}",
                            failure.canonical_url,
                            failure.attempt_count,
                            failure.error_kind
                        );
                        failed += 1;
                    }
                }
            }
            Ok::<(u64, u64), StorageError>((extracted, failed))
        });

        let semaphore = Arc::new(Semaphore::new(
            self.config.crawler.max_concurrent_requests as usize,
        ));
        let delay = Duration::from_millis(self.config.crawler.request_delay_ms);

        let mut handles = Vec::with_capacity(work.len());
        for url in work {
            let worker = Worker {
                client: self.client.clone(),
                policy: self.policy,
                delay,
                tx: tx.clone(),
                shutdown: Arc::clone(&self.shutdown),
                semaphore: Arc::clone(&semaphore),
            };
            handles.push(tokio::spawn(worker.process(url)));
        }
        drop(tx);

        for handle in handles {
            handle.await?;
        }

        let (extracted, failed) = writer.await??;

        let stats = ExtractionStats {
            extracted,
            failed,
            skipped,
        };
        tracing::info!(
            "Extraction finished: {} extracted, {} failed, {} skipped",
            stats.extracted,
            stats.failed,
            stats.skipped
        );
        Ok(stats)
    }
}

/// Everything one fetch worker needs, cloneable per target
struct Worker {
    client: Client,
    policy: RetryPolicy,
    delay: Duration,
    tx: mpsc::Sender<WriteCommand>,
    shutdown: Arc<AtomicBool>,
    semaphore: Arc<Semaphore>,
}

impl Worker {
    /// Drives one target through the retry state machine to a terminal state
    async fn process(self, url: String) {
        // Never closed while workers hold clones
        let _permit = self.semaphore.clone().acquire_owned().await.ok();

        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }

        let mut state = ItemState::Pending;
        let mut last_error: Option<(ErrorKind, String)> = None;

        loop {
            if let Some(backoff) = state.retry_delay() {
                tracing::debug!("Backing off {:?} before retrying {}", backoff, url);
                tokio::time::sleep(backoff).await;
            }

            state = state.begin_attempt();
            tokio::time::sleep(self.delay).await;

            match self.attempt(&url).await {
                Ok(record) => {
                    state = state.on_success();
                    if self.tx.send(WriteCommand::Section(record)).await.is_err() {
                        // Writer is gone (store failure); nothing left to do
                        return;
                    }
                }
                Err((kind, message)) => {
                    tracing::debug!("Attempt failed for {}: {} ({})", url, message, kind);
                    state = state.on_error(kind, &self.policy);
                    last_error = Some((kind, message));
                }
            }

            if state.is_terminal() {
                break;
            }

            if self.shutdown.load(Ordering::SeqCst) {
                // Abandon mid-retry without a failure record; the target stays
                // missing and the next run picks it up again
                tracing::debug!("Shutdown requested, abandoning {}", url);
                return;
            }
        }

        if let ItemState::FailedPermanent { kind, attempts } = state {
            let message = last_error
                .map(|(_, message)| message)
                .unwrap_or_else(|| kind.label().to_string());
            let failure = FailedTarget::new(url, kind, attempts, message);
            let _ = self.tx.send(WriteCommand::Failure(failure)).await;
        }
    }

    /// One fetch-and-parse attempt
    async fn attempt(&self, url: &str) -> std::result::Result<SectionRecord, (ErrorKind, String)> {
        // A hand-edited store can hold unparseable URLs; fail them terminally
        // instead of burning retries on the HTTP client's builder error
        if let Err(e) = url::Url::parse(url) {
            return Err((ErrorKind::MalformedUrl, e.to_string()));
        }

        let page = fetch_page(&self.client, url)
            .await
            .map_err(|e| (e.kind(), e.to_string()))?;

        parse_section_page(&page.body, url).map_err(|message| (ErrorKind::ParseError, message))
    }
}

/// Runs a full extraction pass with the given configuration
pub async fn run_extraction(config: Config) -> Result<ExtractionStats> {
    let extractor = SectionExtractor::new(config)?;
    extractor.run().await
}

// End-to-end behavior (retry schedules, idempotent re-runs, failure records)
// is exercised against wiremock servers in tests/pipeline_tests.rs.
