//! JSON dump of a run.

use std::path::Path;

use hoover_core::RunResult;
use tracing::info;

use crate::error::ReportResult;
use crate::html::write_file;

pub fn render_json(result: &RunResult) -> ReportResult<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Write the full run, every decision included, as pretty-printed JSON.
pub fn write_json(path: &Path, result: &RunResult) -> ReportResult<()> {
    let json = render_json(result)?;
    write_file(path, json.as_bytes())?;
    info!(path = %path.display(), "JSON report saved");
    Ok(())
}
