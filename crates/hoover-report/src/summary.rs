//! Plain-text summary for the terminal.

use std::fmt::Write;

use hoover_core::RunResult;

use crate::rows::{candidate_rows, format_elapsed, format_gb, format_mb};

const HEADERS: [&str; 6] = [
    "Repository",
    "Digest",
    "Last Pull Time",
    "Size (MB)",
    "Outcome",
    "Latest",
];

/// Aligned table of deletion candidates followed by the run totals.
pub fn console_summary(result: &RunResult) -> String {
    let stats = &result.stats;
    let mode = if result.dry_run { "dry run" } else { "cleanup" };
    let mut out = String::new();

    let table: Vec<[String; 6]> = candidate_rows(result)
        .into_iter()
        .map(|row| {
            [
                row.repository,
                row.digest,
                row.last_pull,
                row.size_mb,
                row.outcome,
                if row.is_latest { "yes".into() } else { String::new() },
            ]
        })
        .collect();

    if table.is_empty() {
        let _ = writeln!(out, "\n{}: no artifacts to delete.", mode);
    } else {
        let _ = writeln!(
            out,
            "\n{}: {} artifact(s) marked for deletion\n",
            mode,
            table.len()
        );

        let mut widths = HEADERS.map(str::len);
        for row in &table {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let headers = HEADERS.map(String::from);
        write_row(&mut out, &headers, &widths);
        let rule = widths.map(|w| "-".repeat(w));
        write_row(&mut out, &rule, &widths);
        for row in &table {
            write_row(&mut out, row, &widths);
        }
    }

    let freed_label = if result.dry_run {
        "would be freed"
    } else {
        "freed"
    };
    let freed = if result.dry_run {
        stats.bytes_to_delete
    } else {
        stats.bytes_reclaimed
    };

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Repositories: {} processed ({} found, {} in scope)",
        stats.repositories_processed, stats.repositories_found, stats.repositories_in_scope
    );
    let _ = writeln!(
        out,
        "Artifacts:    {} checked, {} to delete, {} deleted",
        stats.artifacts_checked, stats.artifacts_to_delete, stats.artifacts_deleted
    );
    let _ = writeln!(out, "Errors:       {}", stats.errors);
    let _ = writeln!(
        out,
        "Space {}: {} MB ({} GB)",
        freed_label,
        format_mb(freed),
        format_gb(freed)
    );
    let _ = writeln!(out, "Elapsed:      {}", format_elapsed(result));
    if result.cancelled {
        let _ = writeln!(out, "Run was cancelled; results are partial.");
    }
    out
}

fn write_row(out: &mut String, cells: &[String; 6], widths: &[usize; 6]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .collect();
    let _ = writeln!(out, "| {} |", line.join(" | "));
}
