//! Markdown rendering of the coverage report
//!
//! The rendered document is for humans (or a retry driver reading the missing
//! list); nothing downstream machine-parses it.

use crate::output::coverage::CoverageReport;
use crate::storage::FailedTarget;
use std::collections::BTreeMap;
use std::path::Path;

/// How many failures to list per error kind before truncating
const MAX_FAILURES_SHOWN: usize = 10;

/// How many missing URLs to list before truncating
const MAX_MISSING_SHOWN: usize = 20;

/// Renders the full coverage report as Markdown
pub fn render_report(report: &CoverageReport) -> String {
    let denominator = report.discovered_count.max(1) as f64;
    let failed_pct = report.failed_count as f64 / denominator * 100.0;
    let missing_pct = report.missing_count as f64 / denominator * 100.0;

    let mut out = String::new();

    out.push_str("# CCR Harvester - Coverage Report\n\n");
    out.push_str(&format!(
        "**Generated:** {}\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    out.push_str("## Summary Statistics\n\n");
    out.push_str("| Metric | Count | Percentage |\n");
    out.push_str("|--------|-------|------------|\n");
    out.push_str(&format!(
        "| Total Discovered URLs | {} | 100.0% |\n",
        report.discovered_count
    ));
    out.push_str(&format!(
        "| Successfully Extracted | {} | {:.2}% |\n",
        report.extracted_count, report.coverage_percentage
    ));
    out.push_str(&format!(
        "| Failed Extractions | {} | {:.2}% |\n",
        report.failed_count, failed_pct
    ));
    out.push_str(&format!(
        "| Missing/Unprocessed | {} | {:.2}% |\n\n",
        report.missing_count, missing_pct
    ));

    out.push_str("## Coverage Status\n\n");
    out.push_str(&format!(
        "**{}**: {:.2}% of discovered URLs accounted for ({:.2}% extracted)\n\n",
        report.status.label(),
        report.accounted_percentage,
        report.coverage_percentage
    ));

    if !report.failures.is_empty() {
        out.push_str("## Failed Extractions\n\n");
        for (kind, failures) in group_failures(&report.failures) {
            out.push_str(&format!("### {} ({} URLs)\n\n", kind, failures.len()));
            for failure in failures.iter().take(MAX_FAILURES_SHOWN) {
                out.push_str(&format!(
                    "- [{url}]({url})\n  - Error: `{msg}` (after {n} attempt(s))\n",
                    url = failure.canonical_url,
                    msg = failure.last_error_message,
                    n = failure.attempt_count
                ));
            }
            if failures.len() > MAX_FAILURES_SHOWN {
                out.push_str(&format!(
                    "- _(and {} more)_\n",
                    failures.len() - MAX_FAILURES_SHOWN
                ));
            }
            out.push('\n');
        }
    }

    if !report.missing.is_empty() {
        out.push_str("## Missing/Unprocessed URLs\n\n");
        out.push_str(&format!("Total: {} URLs\n\n", report.missing.len()));
        for url in report.missing.iter().take(MAX_MISSING_SHOWN) {
            out.push_str(&format!("- [{url}]({url})\n", url = url));
        }
        if report.missing.len() > MAX_MISSING_SHOWN {
            out.push_str(&format!(
                "- _(and {} more)_\n",
                report.missing.len() - MAX_MISSING_SHOWN
            ));
        }
        out.push('\n');
    }

    out.push_str("## Recommendations\n\n");
    let mut step = 1;
    if report.failed_count > 0 {
        out.push_str(&format!(
            "{}. **Retry failed URLs** through the recovery pass\n",
            step
        ));
        step += 1;
    }
    if report.missing_count > 0 {
        out.push_str(&format!(
            "{}. **Process missing URLs** by re-running the extraction pipeline\n",
            step
        ));
        step += 1;
    }
    if report.coverage_percentage < 100.0 {
        out.push_str(&format!(
            "{}. **Manual review** recommended for URLs that consistently fail\n",
            step
        ));
    } else {
        out.push_str("**No action needed** - full coverage achieved\n");
    }

    out
}

/// Renders the report and writes it to `path`
pub fn write_report(report: &CoverageReport, path: &Path) -> std::io::Result<()> {
    std::fs::write(path, render_report(report))
}

/// Groups failures by error kind, ordered by kind label
fn group_failures(failures: &[FailedTarget]) -> BTreeMap<&'static str, Vec<&FailedTarget>> {
    let mut groups: BTreeMap<&'static str, Vec<&FailedTarget>> = BTreeMap::new();
    for failure in failures {
        groups
            .entry(failure.error_kind.label())
            .or_default()
            .push(failure);
    }
    groups
}
