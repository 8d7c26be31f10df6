//! In-memory registry for scheduler tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hoover_core::{Artifact, Error, RegistryClient, Repository, Result};

use crate::cancel::CancelHandle;

#[derive(Default)]
pub struct InMemoryRegistry {
    project: String,
    artifacts: BTreeMap<String, Vec<Artifact>>,
    fail_listing_repositories: bool,
    failing_repositories: HashSet<String>,
    failing_deletes: HashSet<String>,
    delete_delay: Option<Duration>,
    cancel_after_deletes: Mutex<Option<(usize, CancelHandle)>>,
    deleted: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl InMemoryRegistry {
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            ..Default::default()
        }
    }

    pub fn with_repository(mut self, name: &str, artifacts: Vec<Artifact>) -> Self {
        self.artifacts.insert(name.to_string(), artifacts);
        self
    }

    pub fn failing_repository_listing(mut self) -> Self {
        self.fail_listing_repositories = true;
        self
    }

    pub fn failing_artifact_listing(mut self, repository: &str) -> Self {
        self.failing_repositories.insert(repository.to_string());
        self
    }

    pub fn failing_delete(mut self, digest: &str) -> Self {
        self.failing_deletes.insert(digest.to_string());
        self
    }

    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = Some(delay);
        self
    }

    /// Fire `handle` while the `n`th delete is in flight.
    pub fn cancel_during_delete(self, n: usize, handle: CancelHandle) -> Self {
        *self.cancel_after_deletes.lock().unwrap() = Some((n, handle));
        self
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn peak_concurrent_deletes(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryClient for InMemoryRegistry {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn list_repositories(&self, project: &str) -> Result<Vec<Repository>> {
        if self.fail_listing_repositories {
            return Err(Error::Permission("401 Unauthorized".into()));
        }
        if project != self.project {
            return Err(Error::NotFound(format!("project {}", project)));
        }
        Ok(self
            .artifacts
            .keys()
            .map(|name| Repository::new(project, name.as_str()))
            .collect())
    }

    async fn list_artifacts(&self, repository: &Repository) -> Result<Vec<Artifact>> {
        if self.failing_repositories.contains(&repository.name) {
            return Err(Error::Transport(format!("listing {} timed out", repository)));
        }
        self.artifacts
            .get(&repository.name)
            .cloned()
            .ok_or_else(|| Error::NotFound(repository.to_string()))
    }

    async fn delete_artifact(&self, _repository: &Repository, digest: &str) -> Result<()> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        let attempt = self.deleted.lock().unwrap().len() + 1;
        if let Some((n, handle)) = self.cancel_after_deletes.lock().unwrap().as_ref() {
            if attempt >= *n {
                handle.cancel();
            }
        }

        match self.delete_delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing_deletes.contains(digest) {
            return Err(Error::Permission(format!("{} is immutable", digest)));
        }
        self.deleted.lock().unwrap().push(digest.to_string());
        Ok(())
    }
}
