//! Harbor v2 API payloads and their mapping onto core types.

use chrono::{DateTime, Datelike, Utc};
use hoover_core::Artifact;
use serde::Deserialize;

/// Repository entry from `GET /projects/{project}/repositories`.
#[derive(Debug, Clone, Deserialize)]
pub struct HarborRepository {
    /// Fully qualified name, `project/repo`.
    pub name: String,
}

impl HarborRepository {
    /// Name relative to `project`.
    pub fn relative_name(&self, project: &str) -> String {
        self.name
            .strip_prefix(project)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(&self.name)
            .to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarborTag {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HarborExtraAttrs {
    /// Image build time from the image config.
    #[serde(default)]
    pub created: Option<String>,
}

/// Artifact entry from `GET .../repositories/{repo}/artifacts`.
#[derive(Debug, Clone, Deserialize)]
pub struct HarborArtifact {
    pub digest: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub tags: Option<Vec<HarborTag>>,
    #[serde(default)]
    pub pull_time: Option<String>,
    #[serde(default)]
    pub push_time: Option<String>,
    #[serde(default)]
    pub extra_attrs: Option<HarborExtraAttrs>,
}

impl HarborArtifact {
    pub fn into_artifact(self, repository: &str) -> Artifact {
        let tags: Vec<String> = self
            .tags
            .unwrap_or_default()
            .into_iter()
            .filter_map(|t| t.name)
            .filter(|name| !name.is_empty())
            .collect();

        // Push time is when the registry first saw the image; fall back to
        // the build time recorded in the image config.
        let created_at = self.push_time.as_deref().and_then(parse_timestamp).or_else(|| {
            self.extra_attrs
                .as_ref()
                .and_then(|attrs| attrs.created.as_deref())
                .and_then(parse_timestamp)
        });

        Artifact::new(repository, self.digest)
            .with_tags(tags)
            .with_size(self.size.unwrap_or(0))
            .with_pulled_at(self.pull_time.as_deref().and_then(parse_timestamp))
            .with_created_at(created_at)
    }
}

/// Parse a Harbor timestamp. Harbor reports "never" as `0001-01-01T00:00:00Z`,
/// so anything at or before the Unix epoch year counts as absent, as does
/// anything unparseable.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
        .filter(|t| t.year() > 1970)
}
