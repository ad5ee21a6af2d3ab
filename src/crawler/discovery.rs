//! Discovery engine: breadth-first traversal of the portal's browse hierarchy
//!
//! Finds every section URL reachable from the configured seed pages. Browse
//! pages are fetched in batches under a global concurrency bound with a
//! politeness delay per worker; outgoing links are classified and either
//! queued (browse) or recorded once in the discovered-targets store (leaf).
//! Progress is checkpointed periodically and on shutdown so an interrupted
//! run resumes without re-fetching visited pages or re-emitting leaves.

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, fetch_page, FetchedPage};
use crate::crawler::parser::extract_links;
use crate::state::CrawlState;
use crate::storage::{Checkpoint, DiscoveredStore, DiscoveredTarget, FrontierEntry};
use crate::Result;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

/// Summary of one discovery run
#[derive(Debug, Clone, Default)]
pub struct DiscoveryStats {
    /// Browse pages fetched this run
    pub pages_visited: u64,

    /// Browse pages whose fetch failed and were dropped from traversal
    pub pages_failed: u64,

    /// Leaf URLs newly recorded this run
    pub newly_discovered: u64,

    /// Total leaf URLs in the discovered-targets store
    pub total_discovered: u64,
}

/// Breadth-first discovery over the portal's browse pages
///
/// One engine instance owns the crawl state and the discovered-targets store;
/// worker tasks only fetch.
pub struct DiscoveryEngine {
    config: Config,
    base: Url,
    client: Client,
    state: CrawlState,
    store: DiscoveredStore,
    checkpoint_path: PathBuf,
    config_hash: Option<String>,
    shutdown: Arc<AtomicBool>,
    discovered_at_last_checkpoint: u64,
}

impl DiscoveryEngine {
    /// Creates an engine, resuming from a checkpoint when one exists
    ///
    /// With no checkpoint the frontier is seeded from the configured seed
    /// pages. The discovered set is always reloaded from the store so
    /// already-discovered leaves are never re-emitted.
    pub fn new(config: Config, config_hash: Option<String>) -> Result<Self> {
        config.storage.ensure_data_dir()?;

        let base = Url::parse(&config.site.base_url)?;
        let client = build_http_client(&config.user_agent, config.crawler.timeout_seconds)?;
        let store = DiscoveredStore::new(config.storage.discovered_path());
        let checkpoint_path = config.storage.checkpoint_path();

        let mut state = match Checkpoint::load(&checkpoint_path)? {
            Some(checkpoint) => {
                if checkpoint.config_hash.is_some() && checkpoint.config_hash != config_hash {
                    tracing::warn!(
                        "Configuration changed since checkpoint was written; resuming anyway"
                    );
                }
                tracing::info!(
                    "Resuming discovery: {} visited, {} queued",
                    checkpoint.visited.len(),
                    checkpoint.frontier.len()
                );
                CrawlState::from_checkpoint(&checkpoint)
            }
            None => {
                tracing::info!("No checkpoint found, seeding frontier from config");
                let mut state = CrawlState::new();
                for seed in &config.site.seeds {
                    match crate::url::canonicalize(seed) {
                        Ok(url) => {
                            state.enqueue_browse(url.as_str(), 0);
                        }
                        Err(e) => {
                            tracing::warn!("Skipping malformed seed URL {}: {}", seed, e);
                        }
                    }
                }
                state
            }
        };

        let already_discovered = store.load()?;
        let discovered_at_last_checkpoint = already_discovered.len() as u64;
        state.load_discovered(
            already_discovered
                .into_iter()
                .map(|target| target.canonical_url),
        );

        Ok(Self {
            config,
            base,
            client,
            state,
            store,
            checkpoint_path,
            config_hash,
            shutdown: Arc::new(AtomicBool::new(false)),
            discovered_at_last_checkpoint,
        })
    }

    /// Handle for requesting a graceful shutdown from another task
    ///
    /// Once set, the engine stops dequeuing work, waits for the in-flight
    /// batch, flushes a checkpoint, and returns.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Runs the traversal to completion (empty frontier), a configured cap,
    /// or a shutdown request
    pub async fn run(&mut self) -> Result<DiscoveryStats> {
        let mut stats = DiscoveryStats::default();
        let concurrency = self.config.crawler.max_concurrent_requests as usize;
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let delay = Duration::from_millis(self.config.crawler.request_delay_ms);

        tracing::info!(
            "Starting discovery: {} in frontier, {} already discovered",
            self.state.frontier_len(),
            self.state.discovered_count()
        );

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                tracing::info!("Shutdown requested, stopping discovery");
                break;
            }

            if let Some(max_pages) = self.config.crawler.max_pages {
                if self.state.visited_count() >= max_pages {
                    tracing::info!("Stopping: reached max-pages={}", max_pages);
                    break;
                }
            }
            if let Some(max_leaves) = self.config.crawler.max_leaf_urls {
                if self.state.discovered_count() >= max_leaves {
                    tracing::info!("Stopping: reached max-leaf-urls={}", max_leaves);
                    break;
                }
            }

            // Keep smoke runs exact: never fetch past the page cap
            let batch_size = match self.config.crawler.max_pages {
                Some(max_pages) => {
                    let remaining = max_pages.saturating_sub(self.state.visited_count());
                    concurrency.min(remaining as usize)
                }
                None => concurrency,
            };

            let batch = self.state.next_batch(batch_size);
            if batch.is_empty() {
                tracing::info!("Frontier is empty, discovery complete");
                break;
            }

            let mut handles = Vec::with_capacity(batch.len());
            for entry in batch {
                let client = self.client.clone();
                let semaphore = Arc::clone(&semaphore);

                handles.push(tokio::spawn(async move {
                    // Never closed: the engine holds the semaphore for the
                    // whole run
                    let _permit = semaphore.acquire_owned().await.ok();
                    tokio::time::sleep(delay).await;
                    let result = fetch_page(&client, &entry.url).await;
                    (entry, result)
                }));
            }

            for handle in handles {
                let (entry, result) = handle.await?;
                self.state.mark_visited(&entry.url);
                stats.pages_visited += 1;

                match result {
                    Ok(page) => {
                        stats.newly_discovered += self.handle_page(&entry, &page)?;
                    }
                    Err(e) => {
                        // A failed browse page is dropped from traversal; its
                        // undiscovered descendants are lost but the crawl goes on
                        tracing::warn!("Failed to fetch browse page {}: {}", entry.url, e);
                        stats.pages_failed += 1;
                    }
                }

                self.maybe_checkpoint()?;

                if stats.pages_visited % 10 == 0 {
                    tracing::info!(
                        "Progress: {} visited, {} in frontier, {} discovered",
                        self.state.visited_count(),
                        self.state.frontier_len(),
                        self.state.discovered_count()
                    );
                }
            }
        }

        self.save_checkpoint()?;
        stats.total_discovered = self.state.discovered_count();

        tracing::info!(
            "Discovery finished: {} pages visited, {} failed, {} newly discovered ({} total)",
            stats.pages_visited,
            stats.pages_failed,
            stats.newly_discovered,
            stats.total_discovered
        );

        Ok(stats)
    }

    /// Classifies a fetched page's links; returns the number of new leaves
    fn handle_page(&mut self, entry: &FrontierEntry, page: &FetchedPage) -> Result<u64> {
        let page_url = Url::parse(&entry.url)?;
        let links = extract_links(&page.body, &page_url);
        let mut new_leaves = 0;

        for link in links {
            let canonical = match crate::url::canonicalize(&link) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Skipping malformed link {}: {}", link, e);
                    continue;
                }
            };

            match crate::url::classify_link(&canonical, &self.base) {
                crate::url::LinkKind::Leaf => {
                    if self.state.record_discovered(canonical.as_str()) {
                        self.store
                            .append(&DiscoveredTarget::new(canonical.as_str()))?;
                        new_leaves += 1;
                    }
                }
                crate::url::LinkKind::Browse => {
                    self.state.enqueue_browse(canonical.as_str(), entry.depth + 1);
                }
                crate::url::LinkKind::Other => {}
            }
        }

        Ok(new_leaves)
    }

    /// Persists a checkpoint when enough new leaves accumulated since the last
    fn maybe_checkpoint(&mut self) -> Result<()> {
        let discovered = self.state.discovered_count();
        if discovered.saturating_sub(self.discovered_at_last_checkpoint)
            >= self.config.crawler.checkpoint_every
        {
            self.save_checkpoint()?;
        }
        Ok(())
    }

    /// Persists the current crawl state atomically
    fn save_checkpoint(&mut self) -> Result<()> {
        let checkpoint = self.state.snapshot(self.config_hash.clone());
        checkpoint.save(&self.checkpoint_path)?;
        self.discovered_at_last_checkpoint = checkpoint.discovered_count;
        tracing::debug!(
            "Checkpoint saved: {} visited, {} queued, {} discovered",
            checkpoint.visited.len(),
            checkpoint.frontier.len(),
            checkpoint.discovered_count
        );
        Ok(())
    }

    /// Fetched-page count currently in the visited set (for callers that
    /// report on a finished engine)
    pub fn visited_count(&self) -> u64 {
        self.state.visited_count()
    }
}

/// Runs a full discovery pass with the given configuration
pub async fn run_discovery(config: Config, config_hash: Option<String>) -> Result<DiscoveryStats> {
    let mut engine = DiscoveryEngine::new(config, config_hash)?;
    engine.run().await
}
