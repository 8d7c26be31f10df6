//! Per-repository artifact processing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hoover_core::{
    ActionOutcome, Artifact, DecisionRecord, Policy, RegistryClient, Repository, Result, evaluate,
};
use tracing::{debug, error, info};

use crate::aggregator::ResultAggregator;
use crate::cancel::CancelSignal;
use crate::pool::run_bounded;

/// Summary of one repository's artifact pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryReport {
    pub artifacts_found: usize,
    /// Artifacts evaluated before the pass ended. Lower than `artifacts_found`
    /// only when the run was cancelled.
    pub artifacts_processed: usize,
}

/// Evaluates and acts on the artifacts of one repository at a time, with a
/// bounded number of artifacts in flight.
#[derive(Clone)]
pub struct ArtifactWorkerPool {
    registry: Arc<dyn RegistryClient>,
    policy: Arc<Policy>,
    aggregator: Arc<ResultAggregator>,
    max_concurrent: usize,
    dry_run: bool,
}

/// Everything an artifact worker needs, shared across the pool's tasks.
struct ArtifactTask {
    registry: Arc<dyn RegistryClient>,
    policy: Arc<Policy>,
    aggregator: Arc<ResultAggregator>,
    repository: Repository,
    dry_run: bool,
    now: DateTime<Utc>,
}

impl ArtifactWorkerPool {
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        policy: Arc<Policy>,
        aggregator: Arc<ResultAggregator>,
        max_concurrent: usize,
        dry_run: bool,
    ) -> Self {
        Self {
            registry,
            policy,
            aggregator,
            max_concurrent,
            dry_run,
        }
    }

    /// List a repository's artifacts and handle each one.
    ///
    /// Only a listing failure is returned as an error. Delete failures are
    /// recorded per artifact and do not fail the repository.
    pub async fn process_repository(
        &self,
        repository: &Repository,
        now: DateTime<Utc>,
        cancel: &CancelSignal,
    ) -> Result<RepositoryReport> {
        let artifacts = self.registry.list_artifacts(repository).await?;
        let found = artifacts.len();
        debug!(%repository, artifacts = found, "Listed artifacts");

        let task = Arc::new(ArtifactTask {
            registry: Arc::clone(&self.registry),
            policy: Arc::clone(&self.policy),
            aggregator: Arc::clone(&self.aggregator),
            repository: repository.clone(),
            dry_run: self.dry_run,
            now,
        });

        let dispatch = run_bounded(
            "artifacts",
            artifacts,
            self.max_concurrent,
            cancel,
            move |artifact| {
                let task = Arc::clone(&task);
                async move { task.process(artifact).await }
            },
        )
        .await;

        if dispatch.skipped() > 0 {
            info!(
                %repository,
                skipped = dispatch.skipped(),
                "Cancelled before every artifact was processed"
            );
        }

        Ok(RepositoryReport {
            artifacts_found: found,
            artifacts_processed: dispatch.processed,
        })
    }
}

impl ArtifactTask {
    async fn process(&self, artifact: Artifact) {
        let decision = evaluate(&artifact, &self.policy, self.now);

        let outcome = if !decision.is_delete() {
            debug!(%artifact, decision = %decision.kind(), reason = %decision.reason(), "Retaining artifact");
            ActionOutcome::Retained
        } else if self.dry_run {
            info!(
                %artifact,
                tags = ?artifact.tags,
                size_bytes = artifact.size_bytes,
                reason = %decision.reason(),
                "[dry run] Would delete artifact"
            );
            ActionOutcome::DryRun
        } else {
            match self
                .registry
                .delete_artifact(&self.repository, &artifact.digest)
                .await
            {
                Ok(()) => {
                    info!(
                        %artifact,
                        size_bytes = artifact.size_bytes,
                        reason = %decision.reason(),
                        "Deleted artifact"
                    );
                    ActionOutcome::Deleted
                }
                Err(e) => {
                    error!(%artifact, error = %e, "Failed to delete artifact");
                    ActionOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            }
        };

        self.aggregator
            .record(DecisionRecord::new(artifact, decision, outcome))
            .await;
    }
}
