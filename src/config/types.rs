use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub coverage: CoverageConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
}

/// Target portal configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Base URL of the regulations portal
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Browse pages the discovery traversal starts from
    pub seeds: Vec<String>,
}

/// Crawler behavior configuration, shared by discovery and extraction
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of in-flight HTTP requests
    #[serde(rename = "max-concurrent-requests")]
    pub max_concurrent_requests: u32,

    /// Minimum delay before each request, per worker (milliseconds)
    #[serde(rename = "request-delay")]
    pub request_delay_ms: u64,

    /// Persist a discovery checkpoint every N newly discovered URLs
    #[serde(rename = "checkpoint-every", default = "default_checkpoint_every")]
    pub checkpoint_every: u64,

    /// Stop discovery after visiting this many browse pages (smoke runs)
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u64>,

    /// Stop discovery after this many leaf URLs (smoke runs)
    #[serde(rename = "max-leaf-urls", default)]
    pub max_leaf_urls: Option<u64>,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-seconds", default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Retry/backoff configuration for the section extractor
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Maximum fetch attempts per URL, including the first
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay (milliseconds)
    #[serde(rename = "base-delay", default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Backoff delay ceiling (milliseconds)
    #[serde(rename = "max-delay", default = "default_max_delay")]
    pub max_delay_ms: u64,
}

/// Locations of the durable stores
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the stores, the checkpoint, and the coverage report
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,
}

/// Coverage status thresholds, as percentages of discovered URLs extracted
#[derive(Debug, Clone, Deserialize)]
pub struct CoverageConfig {
    #[serde(default = "default_excellent")]
    pub excellent: f64,
    #[serde(default = "default_good")]
    pub good: f64,
    #[serde(default = "default_acceptable")]
    pub acceptable: f64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl StorageConfig {
    /// Path of the discovered-targets store
    pub fn discovered_path(&self) -> PathBuf {
        self.data_dir.join("discovered_targets.jsonl")
    }

    /// Path of the extracted-records store
    pub fn sections_path(&self) -> PathBuf {
        self.data_dir.join("extracted_sections.jsonl")
    }

    /// Path of the failed-targets store
    pub fn failed_path(&self) -> PathBuf {
        self.data_dir.join("failed_targets.jsonl")
    }

    /// Path of the discovery checkpoint snapshot
    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir.join("discovery_checkpoint.json")
    }

    /// Path of the rendered coverage report
    pub fn report_path(&self) -> PathBuf {
        self.data_dir.join("coverage_report.md")
    }

    /// Creates the data directory if it does not exist yet
    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        if !Path::new(&self.data_dir).exists() {
            std::fs::create_dir_all(&self.data_dir)?;
        }
        Ok(())
    }
}

impl UserAgentConfig {
    /// Formats the full user agent string:
    /// `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn user_agent_string(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            excellent: default_excellent(),
            good: default_good(),
            acceptable: default_acceptable(),
        }
    }
}

fn default_checkpoint_every() -> u64 {
    50
}

fn default_timeout_seconds() -> u64 {
    45
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    16_000
}

fn default_excellent() -> f64 {
    95.0
}

fn default_good() -> f64 {
    90.0
}

fn default_acceptable() -> f64 {
    80.0
}
