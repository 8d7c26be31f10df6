//! Registry client contract.
//!
//! Implementations talk to a concrete registry (Harbor, or an in-memory
//! double in tests). Retry policy, pagination and authentication live in
//! the implementation; callers see one call per operation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::artifact::Artifact;

/// A repository inside a registry project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Repository {
    pub project: String,
    /// Name relative to the project, e.g. `cdp-api` or `team/cdp-api`.
    pub name: String,
}

impl Repository {
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.project, self.name)
    }
}

/// Trait for registry backends.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Name of this backend, for logs.
    fn name(&self) -> &'static str;

    /// List every repository in a project.
    ///
    /// Fails with [`crate::Error::Transport`] on network failure and
    /// [`crate::Error::Permission`] when the credentials are rejected.
    async fn list_repositories(&self, project: &str) -> Result<Vec<Repository>>;

    /// List every artifact in a repository, with tags and timestamps.
    async fn list_artifacts(&self, repository: &Repository) -> Result<Vec<Artifact>>;

    /// Delete one artifact by digest.
    async fn delete_artifact(&self, repository: &Repository, digest: &str) -> Result<()>;
}
