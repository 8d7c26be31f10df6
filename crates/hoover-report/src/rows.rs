//! Display rows shared by the HTML and console renderers.

use hoover_core::{DecisionRecord, RunResult};

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = MIB * 1024.0;

pub(crate) struct CandidateRow {
    pub repository: String,
    pub digest: String,
    pub last_pull: String,
    pub size_mb: String,
    pub outcome: String,
    pub is_latest: bool,
    pub failed: bool,
}

impl CandidateRow {
    fn from_record(record: &DecisionRecord) -> Self {
        let artifact = &record.artifact;
        Self {
            repository: artifact.repository.clone(),
            digest: artifact.short_digest().to_string(),
            last_pull: artifact
                .pulled_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "Never pulled".to_string()),
            size_mb: format_mb(artifact.size_bytes),
            outcome: record.outcome.to_string(),
            is_latest: artifact.is_latest,
            failed: record.outcome.is_failure(),
        }
    }
}

/// Deletion candidates ordered by repository, then digest.
pub(crate) fn candidate_rows(result: &RunResult) -> Vec<CandidateRow> {
    let mut records: Vec<&DecisionRecord> = result.deletion_candidates().collect();
    records.sort_by(|a, b| {
        (&a.artifact.repository, &a.artifact.digest)
            .cmp(&(&b.artifact.repository, &b.artifact.digest))
    });
    records.into_iter().map(CandidateRow::from_record).collect()
}

pub(crate) fn format_mb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / MIB)
}

pub(crate) fn format_gb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / GIB)
}

pub(crate) fn format_elapsed(result: &RunResult) -> String {
    match result.elapsed() {
        Some(d) if d.num_minutes() > 0 => {
            format!("{}m {}s", d.num_minutes(), d.num_seconds() % 60)
        }
        Some(d) => format!("{:.1}s", d.num_milliseconds() as f64 / 1000.0),
        None => "-".to_string(),
    }
}
