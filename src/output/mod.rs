//! Coverage reconciliation and report output

mod coverage;
mod report;

pub use coverage::{reconcile, reconcile_stores, CoverageReport, CoverageStatus};
pub use report::{render_report, write_report};
