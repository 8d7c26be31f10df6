//! Artifact metadata as reported by the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::AgeBasis;

/// Tag that marks an artifact as the repository's current image.
pub const LATEST_TAG: &str = "latest";

/// A single content-addressed image within a repository.
///
/// Identity is the `(repository, digest)` pair. Artifacts are fetched fresh
/// on every run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Repository name, relative to the project.
    pub repository: String,
    /// Content digest, e.g. `sha256:0f3a...`.
    pub digest: String,
    /// Tag names in registry order.
    pub tags: Vec<String>,
    /// Storage size in bytes.
    pub size_bytes: u64,
    /// When the artifact was pushed or built, if known.
    pub created_at: Option<DateTime<Utc>>,
    /// When the artifact was last pulled. `None` means never pulled or unknown.
    pub pulled_at: Option<DateTime<Utc>>,
    /// Whether the artifact carries the `latest` tag.
    pub is_latest: bool,
}

impl Artifact {
    pub fn new(repository: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            digest: digest.into(),
            tags: Vec::new(),
            size_bytes: 0,
            created_at: None,
            pulled_at: None,
            is_latest: false,
        }
    }

    /// Replace the tag list, deduplicating while keeping the first occurrence.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.clear();
        for tag in tags {
            let tag = tag.into();
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        self.is_latest = self.tags.iter().any(|t| t == LATEST_TAG);
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_pulled_at(mut self, pulled_at: Option<DateTime<Utc>>) -> Self {
        self.pulled_at = pulled_at;
        self
    }

    /// The timestamp retention is measured from: last pull, else creation.
    pub fn reference_time(&self) -> (Option<DateTime<Utc>>, AgeBasis) {
        match (self.pulled_at, self.created_at) {
            (Some(pulled), _) => (Some(pulled), AgeBasis::LastPull),
            (None, Some(created)) => (Some(created), AgeBasis::Created),
            (None, None) => (None, AgeBasis::Unknown),
        }
    }

    /// First 12 hex characters of the digest, without the algorithm prefix.
    pub fn short_digest(&self) -> &str {
        let hex = self
            .digest
            .split_once(':')
            .map(|(_, hex)| hex)
            .unwrap_or(&self.digest);
        match hex.char_indices().nth(12) {
            Some((idx, _)) => &hex[..idx],
            None => hex,
        }
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.repository, self.short_digest())
    }
}
