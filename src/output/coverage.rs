//! Coverage reconciliation: set algebra over the three stores
//!
//! Pure function of the store contents - no network, no side effects - so it
//! can be recomputed at any time. Extraction is authoritative: a URL with both
//! a section record and a failure entry counts as extracted, and the stale
//! failure is excluded from the failed count.

use crate::config::CoverageConfig;
use crate::storage::{
    DiscoveredStore, DiscoveredTarget, FailedStore, FailedTarget, SectionRecord, SectionStore,
    StorageResult,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Health classification of a crawl, by extraction percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageStatus {
    /// At or above the excellent threshold - deployment ready
    Excellent,
    /// Minor gaps acceptable
    Good,
    /// Worth investigating the missing sections
    Acceptable,
    /// Significant gaps exist
    Insufficient,
}

impl CoverageStatus {
    /// Classifies a coverage percentage against the configured thresholds
    pub fn from_percentage(percentage: f64, thresholds: &CoverageConfig) -> Self {
        if percentage >= thresholds.excellent {
            Self::Excellent
        } else if percentage >= thresholds.good {
            Self::Good
        } else if percentage >= thresholds.acceptable {
            Self::Acceptable
        } else {
            Self::Insufficient
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "EXCELLENT",
            Self::Good => "GOOD",
            Self::Acceptable => "ACCEPTABLE",
            Self::Insufficient => "INSUFFICIENT",
        }
    }
}

/// Completeness report over the three stores
///
/// Invariant: `discovered_count == extracted_count + failed_count +
/// missing_count` - every count is taken within the discovered set, so
/// records a store gained out of band cannot break the arithmetic.
#[derive(Debug, Clone)]
pub struct CoverageReport {
    pub discovered_count: u64,
    pub extracted_count: u64,
    pub failed_count: u64,
    pub missing_count: u64,

    /// Extracted share of discovered, as a percentage (0 when nothing was
    /// discovered)
    pub coverage_percentage: f64,

    /// Share of discovered URLs with a definite outcome - extracted or
    /// terminally failed. This drives the status: a failure is a known
    /// result, a missing URL is a gap
    pub accounted_percentage: f64,

    pub status: CoverageStatus,

    /// Discovered URLs with neither a record nor a live failure, sorted -
    /// exactly the set a targeted retry pass should fetch
    pub missing: Vec<String>,

    /// Live failures (latest entry per URL, superseded ones dropped)
    pub failures: Vec<FailedTarget>,

    pub generated_at: DateTime<Utc>,
}

/// Computes a coverage report from in-memory store contents
pub fn reconcile(
    discovered: &[DiscoveredTarget],
    records: &[SectionRecord],
    failures: &[FailedTarget],
    thresholds: &CoverageConfig,
) -> CoverageReport {
    let discovered_set: HashSet<&str> = discovered
        .iter()
        .map(|target| target.canonical_url.as_str())
        .collect();
    let extracted_set: HashSet<&str> = records
        .iter()
        .map(|record| record.source_url.as_str())
        .collect();

    // Latest failure entry per URL; an extracted URL's failures are stale
    let mut live_failures: HashMap<&str, &FailedTarget> = HashMap::new();
    for failure in failures {
        if extracted_set.contains(failure.canonical_url.as_str()) {
            continue;
        }
        live_failures.insert(failure.canonical_url.as_str(), failure);
    }

    let extracted_count = discovered_set
        .iter()
        .filter(|url| extracted_set.contains(*url))
        .count() as u64;
    let failed_in_discovered: Vec<&FailedTarget> = discovered_set
        .iter()
        .filter_map(|url| live_failures.get(*url).copied())
        .collect();

    let mut missing: Vec<String> = discovered_set
        .iter()
        .filter(|url| !extracted_set.contains(*url) && !live_failures.contains_key(*url))
        .map(|url| url.to_string())
        .collect();
    missing.sort();

    let discovered_count = discovered_set.len() as u64;
    let failed_count = failed_in_discovered.len() as u64;
    let missing_count = missing.len() as u64;

    let (coverage_percentage, accounted_percentage) = if discovered_count > 0 {
        (
            extracted_count as f64 / discovered_count as f64 * 100.0,
            (extracted_count + failed_count) as f64 / discovered_count as f64 * 100.0,
        )
    } else {
        (0.0, 0.0)
    };

    let mut failures_out: Vec<FailedTarget> =
        failed_in_discovered.into_iter().cloned().collect();
    failures_out.sort_by(|a, b| a.canonical_url.cmp(&b.canonical_url));

    CoverageReport {
        discovered_count,
        extracted_count,
        failed_count,
        missing_count,
        coverage_percentage,
        accounted_percentage,
        status: CoverageStatus::from_percentage(accounted_percentage, thresholds),
        missing,
        failures: failures_out,
        generated_at: Utc::now(),
    }
}

/// Loads the three stores and computes a fresh report
pub fn reconcile_stores(
    discovered: &DiscoveredStore,
    sections: &SectionStore,
    failed: &FailedStore,
    thresholds: &CoverageConfig,
) -> StorageResult<CoverageReport> {
    let discovered = discovered.load()?;
    let records = sections.load()?;
    let failures = failed.load()?;
    Ok(reconcile(&discovered, &records, &failures, thresholds))
}
