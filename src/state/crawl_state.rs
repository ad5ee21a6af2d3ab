use crate::storage::{Checkpoint, FrontierEntry};
use chrono::Utc;
use std::collections::{HashSet, VecDeque};

/// Mutable discovery state: visited set, frontier, and the discovered-leaf set
///
/// One engine instance owns this; worker tasks never touch it directly. All
/// mutation goes through these methods, and checkpointing serializes the
/// object wholesale.
#[derive(Debug, Default)]
pub struct CrawlState {
    /// Browse pages already fetched; guarantees termination on cyclic links
    visited: HashSet<String>,

    /// Browse pages queued for fetching, in breadth-first order
    frontier: VecDeque<FrontierEntry>,

    /// URLs currently in the frontier, to keep entries unique
    queued: HashSet<String>,

    /// Canonical leaf URLs already recorded as discovered targets
    discovered: HashSet<String>,
}

impl CrawlState {
    /// Creates empty crawl state
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds visited set and frontier from a checkpoint
    ///
    /// The discovered set is not part of the checkpoint; it is reloaded from
    /// the discovered-targets store via [`CrawlState::load_discovered`].
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        let mut state = Self::new();
        state.visited = checkpoint.visited.iter().cloned().collect();
        for entry in &checkpoint.frontier {
            if state.queued.insert(entry.url.clone()) {
                state.frontier.push_back(entry.clone());
            }
        }
        state
    }

    /// Seeds the discovered set from the store so already-discovered leaves
    /// are not re-emitted on resume
    pub fn load_discovered(&mut self, urls: impl IntoIterator<Item = String>) {
        self.discovered.extend(urls);
    }

    /// Queues a browse page unless it was already visited or is already queued
    ///
    /// Returns true if the page was enqueued.
    pub fn enqueue_browse(&mut self, url: &str, depth: u32) -> bool {
        if self.visited.contains(url) || self.queued.contains(url) {
            return false;
        }
        self.queued.insert(url.to_string());
        self.frontier.push_back(FrontierEntry::new(url, depth));
        true
    }

    /// Removes and returns up to `n` frontier entries for fetching
    pub fn next_batch(&mut self, n: usize) -> Vec<FrontierEntry> {
        let mut batch = Vec::new();
        while batch.len() < n {
            match self.frontier.pop_front() {
                Some(entry) => {
                    self.queued.remove(&entry.url);
                    batch.push(entry);
                }
                None => break,
            }
        }
        batch
    }

    /// Marks a browse page as fetched
    pub fn mark_visited(&mut self, url: &str) {
        self.visited.insert(url.to_string());
    }

    /// Returns true if a browse page was already fetched
    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    /// Records a leaf URL; returns true the first time a URL is seen
    pub fn record_discovered(&mut self, url: &str) -> bool {
        self.discovered.insert(url.to_string())
    }

    /// Returns true if the leaf URL has already been discovered
    pub fn is_discovered(&self, url: &str) -> bool {
        self.discovered.contains(url)
    }

    pub fn visited_count(&self) -> u64 {
        self.visited.len() as u64
    }

    pub fn discovered_count(&self) -> u64 {
        self.discovered.len() as u64
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    pub fn frontier_is_empty(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Serializes the state into a checkpoint document
    pub fn snapshot(&self, config_hash: Option<String>) -> Checkpoint {
        let mut visited: Vec<String> = self.visited.iter().cloned().collect();
        visited.sort();

        Checkpoint {
            visited,
            frontier: self.frontier.iter().cloned().collect(),
            discovered_count: self.discovered_count(),
            config_hash,
            timestamp: Utc::now(),
        }
    }
}
