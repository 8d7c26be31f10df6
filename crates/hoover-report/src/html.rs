//! HTML report.

use std::path::Path;

use askama::Template;
use hoover_core::RunResult;
use tracing::info;

use crate::error::{ReportError, ReportResult};
use crate::rows::{CandidateRow, candidate_rows, format_elapsed, format_gb};

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate {
    mode: &'static str,
    project: String,
    run_id: String,
    started_at: String,
    elapsed: String,
    cancelled: bool,
    repositories_found: u64,
    repositories_in_scope: u64,
    repositories_processed: u64,
    artifacts_checked: u64,
    artifacts_to_delete: u64,
    artifacts_deleted: u64,
    errors: u64,
    checked_gb: String,
    decisions: Vec<DecisionView>,
    rows: Vec<CandidateRow>,
    has_rows: bool,
    total_label: &'static str,
    total_gb: String,
    failures: Vec<FailureView>,
    has_failures: bool,
}

struct DecisionView {
    kind: String,
    count: u64,
}

struct FailureView {
    repository: String,
    error: String,
}

impl ReportTemplate {
    fn from_result(result: &RunResult) -> Self {
        let stats = &result.stats;
        let rows = candidate_rows(result);
        let failures: Vec<FailureView> = result
            .repository_failures
            .iter()
            .map(|f| FailureView {
                repository: f.repository.clone(),
                error: f.error.clone(),
            })
            .collect();

        // Dry runs report what would be freed; real runs report what was.
        let (total_label, total_bytes) = if result.dry_run {
            ("Total space that would be cleared", stats.bytes_to_delete)
        } else {
            ("Total space cleared", stats.bytes_reclaimed)
        };

        Self {
            mode: if result.dry_run { "Dry Run" } else { "Actual Run" },
            project: result.project.clone(),
            run_id: result.run_id.to_string(),
            started_at: result.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            elapsed: format_elapsed(result),
            cancelled: result.cancelled,
            repositories_found: stats.repositories_found,
            repositories_in_scope: stats.repositories_in_scope,
            repositories_processed: stats.repositories_processed,
            artifacts_checked: stats.artifacts_checked,
            artifacts_to_delete: stats.artifacts_to_delete,
            artifacts_deleted: stats.artifacts_deleted,
            errors: stats.errors,
            checked_gb: format_gb(stats.bytes_checked),
            decisions: stats
                .decisions
                .iter()
                .map(|(kind, count)| DecisionView {
                    kind: kind.to_string(),
                    count: *count,
                })
                .collect(),
            has_rows: !rows.is_empty(),
            rows,
            total_label,
            total_gb: format_gb(total_bytes),
            has_failures: !failures.is_empty(),
            failures,
        }
    }
}

/// Render the run as a standalone HTML page.
pub fn render_html(result: &RunResult) -> ReportResult<String> {
    Ok(ReportTemplate::from_result(result).render()?)
}

/// Render and write the HTML report, creating parent directories as needed.
pub fn write_html(path: &Path, result: &RunResult) -> ReportResult<()> {
    let html = render_html(result)?;
    write_file(path, html.as_bytes())?;
    info!(path = %path.display(), "HTML report saved");
    Ok(())
}

pub(crate) fn write_file(path: &Path, contents: &[u8]) -> ReportResult<()> {
    let io_err = |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, contents).map_err(io_err)
}
