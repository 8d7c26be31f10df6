//! Rendering of cleanup run results.
//!
//! Takes a finished [`hoover_core::RunResult`] and produces an HTML report,
//! a JSON dump and a plain-text console summary.

pub mod error;
pub mod html;
pub mod json;
mod rows;
pub mod summary;

pub use error::{ReportError, ReportResult};
pub use html::{render_html, write_html};
pub use json::{render_json, write_json};
pub use summary::console_summary;

#[cfg(test)]
pub(crate) mod fixtures;
