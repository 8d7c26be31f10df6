//! Repository-level scheduling for a cleanup run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hoover_core::{Policy, RegistryClient, Repository, RepositoryFilter, Result, RunResult};
use tracing::{debug, error, info};

use crate::aggregator::{RepositoryOutcome, ResultAggregator};
use crate::cancel::CancelSignal;
use crate::pool::run_bounded;
use crate::worker::ArtifactWorkerPool;

/// Per-run knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub project: String,
    pub dry_run: bool,
    /// Repositories processed at once.
    pub max_concurrent_repositories: usize,
    /// Artifacts in flight per repository.
    pub max_concurrent_artifacts: usize,
}

impl RunOptions {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            dry_run: false,
            max_concurrent_repositories: 10,
            max_concurrent_artifacts: 5,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn concurrency(mut self, repositories: usize, artifacts: usize) -> Self {
        self.max_concurrent_repositories = repositories;
        self.max_concurrent_artifacts = artifacts;
        self
    }
}

/// Drives a whole cleanup run: lists repositories, filters them and hands
/// each in-scope repository to an [`ArtifactWorkerPool`].
///
/// At most `max_concurrent_repositories * max_concurrent_artifacts`
/// artifacts are in flight at any moment.
pub struct RepositoryScheduler {
    registry: Arc<dyn RegistryClient>,
    policy: Arc<Policy>,
    filter: RepositoryFilter,
    options: RunOptions,
}

impl RepositoryScheduler {
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        policy: Policy,
        filter: RepositoryFilter,
        options: RunOptions,
    ) -> Self {
        Self {
            registry,
            policy: Arc::new(policy),
            filter,
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run a cleanup, evaluating ages against the current time.
    pub async fn run(&self, cancel: CancelSignal) -> Result<RunResult> {
        self.run_at(Utc::now(), cancel).await
    }

    /// Run a cleanup, evaluating ages against `now`.
    ///
    /// Fails only if the repository list cannot be fetched. Everything after
    /// that is recorded in the returned result, including repositories whose
    /// artifacts could not be listed. On cancellation the partial result is
    /// returned with `cancelled` set.
    pub async fn run_at(&self, now: DateTime<Utc>, cancel: CancelSignal) -> Result<RunResult> {
        let project = self.options.project.as_str();
        info!(
            registry = self.registry.name(),
            project,
            dry_run = self.options.dry_run,
            retention_days = self.policy.retention.num_days(),
            max_repositories = self.options.max_concurrent_repositories,
            max_artifacts = self.options.max_concurrent_artifacts,
            "Starting cleanup run"
        );

        let aggregator = Arc::new(ResultAggregator::new(
            project,
            self.options.dry_run,
            Utc::now(),
        ));

        let repositories = self
            .registry
            .list_repositories(project)
            .await
            .inspect_err(|e| error!(project, error = %e, "Failed to list repositories"))?;
        let found = repositories.len();

        let in_scope: Vec<Repository> = repositories
            .into_iter()
            .filter(|repository| {
                let keep = self.filter.is_in_scope(&repository.name);
                if !keep {
                    debug!(%repository, "Repository out of scope");
                }
                keep
            })
            .collect();
        info!(found, in_scope = in_scope.len(), "Filtered repositories");
        aggregator.set_repository_counts(found, in_scope.len()).await;

        let pool = ArtifactWorkerPool::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.policy),
            Arc::clone(&aggregator),
            self.options.max_concurrent_artifacts,
            self.options.dry_run,
        );
        let repo_aggregator = Arc::clone(&aggregator);
        let repo_cancel = cancel.clone();

        let dispatch = run_bounded(
            "repositories",
            in_scope,
            self.options.max_concurrent_repositories,
            &cancel,
            move |repository| {
                let pool = pool.clone();
                let aggregator = Arc::clone(&repo_aggregator);
                let cancel = repo_cancel.clone();
                async move {
                    process_repository(&pool, &aggregator, repository, now, &cancel).await;
                }
            },
        )
        .await;

        let cancelled = cancel.is_cancelled();
        if cancelled {
            info!(
                repositories_skipped = dispatch.skipped(),
                "Run cancelled, returning partial results"
            );
        }

        let result = aggregator.finish(Utc::now(), cancelled).await;
        let stats = &result.stats;
        info!(
            run_id = %result.run_id,
            repositories = stats.repositories_processed,
            artifacts_checked = stats.artifacts_checked,
            artifacts_to_delete = stats.artifacts_to_delete,
            artifacts_deleted = stats.artifacts_deleted,
            bytes_reclaimed = stats.bytes_reclaimed,
            errors = stats.errors,
            cancelled,
            "Cleanup run finished"
        );
        Ok(result)
    }
}

async fn process_repository(
    pool: &ArtifactWorkerPool,
    aggregator: &ResultAggregator,
    repository: Repository,
    now: DateTime<Utc>,
    cancel: &CancelSignal,
) {
    info!(%repository, "Processing repository");
    let outcome = match pool.process_repository(&repository, now, cancel).await {
        Ok(report) => {
            info!(
                %repository,
                found = report.artifacts_found,
                processed = report.artifacts_processed,
                "Repository done"
            );
            RepositoryOutcome::Completed
        }
        Err(e) => {
            error!(%repository, error = %e, "Failed to process repository");
            RepositoryOutcome::Failed {
                error: e.to_string(),
            }
        }
    };
    aggregator.record_repository(&repository, outcome).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancellation;
    use crate::testing::InMemoryRegistry;
    use chrono::Duration;
    use hoover_core::{ActionOutcome, Artifact, DecisionKind, Error, RunStats};

    fn now() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    fn stale(repository: &str, n: usize) -> Artifact {
        Artifact::new(repository, format!("sha256:{}-{}", repository, n))
            .with_tags([format!("v{}", n)])
            .with_size(100 * (n as u64 + 1))
            .with_pulled_at(Some(now() - Duration::days(20)))
    }

    fn recent(repository: &str, n: usize) -> Artifact {
        Artifact::new(repository, format!("sha256:{}-recent-{}", repository, n))
            .with_size(10)
            .with_created_at(Some(now() - Duration::hours(3)))
    }

    /// Three in-scope repositories, one out of scope, a mix of artifacts.
    fn registry() -> InMemoryRegistry {
        InMemoryRegistry::new("platform")
            .with_repository(
                "cdp-api",
                vec![
                    stale("cdp-api", 0),
                    stale("cdp-api", 1),
                    recent("cdp-api", 0),
                    stale("cdp-api", 2).with_tags(["prod"]),
                ],
            )
            .with_repository(
                "sdp-worker",
                vec![
                    stale("sdp-worker", 0),
                    stale("sdp-worker", 1).with_tags(["release-1", "rc-1"]),
                ],
            )
            .with_repository("cdp-web", vec![stale("cdp-web", 0), recent("cdp-web", 1)])
            .with_repository("billing", vec![stale("billing", 0)])
    }

    fn scheduler(registry: Arc<InMemoryRegistry>, options: RunOptions) -> RepositoryScheduler {
        let policy = Policy::new(Duration::days(14))
            .with_protected_tags(["latest", "prod"])
            .with_excluded_tag_patterns(["rc-*"])
            .unwrap();
        RepositoryScheduler::new(registry, policy, RepositoryFilter::default(), options)
    }

    async fn run(registry: Arc<InMemoryRegistry>, options: RunOptions) -> RunResult {
        scheduler(registry, options)
            .run_at(now(), CancelSignal::never())
            .await
            .unwrap()
    }

    fn counters(stats: &RunStats) -> (u64, u64, u64, u64, u64, u64) {
        (
            stats.repositories_processed,
            stats.artifacts_checked,
            stats.artifacts_to_delete,
            stats.errors,
            stats.bytes_checked,
            stats.bytes_to_delete,
        )
    }

    #[tokio::test]
    async fn test_full_run_deletes_eligible_artifacts() {
        let registry = Arc::new(registry());
        let result = run(Arc::clone(&registry), RunOptions::new("platform")).await;
        let stats = &result.stats;

        assert_eq!(stats.repositories_found, 4);
        assert_eq!(stats.repositories_in_scope, 3);
        assert_eq!(stats.repositories_processed, 3);
        assert_eq!(stats.artifacts_checked, 8);
        assert_eq!(stats.artifacts_to_delete, 4);
        assert_eq!(stats.artifacts_deleted, 4);
        assert_eq!(stats.errors, 0);
        assert_eq!(result.count(DecisionKind::Keep), 2);
        assert_eq!(result.count(DecisionKind::SkipProtected), 1);
        assert_eq!(result.count(DecisionKind::SkipExcludedTag), 1);
        assert_eq!(stats.bytes_reclaimed, stats.bytes_to_delete);
        assert!(!result.cancelled);
        assert!(result.finished_at.is_some());

        let mut deleted = registry.deleted();
        deleted.sort();
        assert_eq!(
            deleted,
            vec![
                "sha256:cdp-api-0",
                "sha256:cdp-api-1",
                "sha256:cdp-web-0",
                "sha256:sdp-worker-0"
            ]
        );
        assert!(!deleted.iter().any(|d| d.contains("billing")));
    }

    #[tokio::test]
    async fn test_dry_run_matches_real_run_except_deletions() {
        let dry_registry = Arc::new(registry());
        let dry = run(
            Arc::clone(&dry_registry),
            RunOptions::new("platform").dry_run(true),
        )
        .await;
        let real = run(Arc::new(registry()), RunOptions::new("platform")).await;

        assert!(dry_registry.deleted().is_empty());
        assert_eq!(counters(&dry.stats), counters(&real.stats));
        assert_eq!(dry.stats.decisions, real.stats.decisions);
        assert_eq!(dry.stats.artifacts_deleted, 0);
        assert_eq!(dry.stats.bytes_reclaimed, 0);
        assert_eq!(real.stats.artifacts_deleted, real.stats.artifacts_to_delete);
        assert!(dry.dry_run);
        assert!(
            dry.deletion_candidates()
                .all(|r| r.outcome == ActionOutcome::DryRun)
        );
    }

    #[tokio::test]
    async fn test_results_do_not_depend_on_concurrency() {
        let serial = run(
            Arc::new(registry()),
            RunOptions::new("platform").concurrency(1, 1),
        )
        .await;
        let parallel = run(
            Arc::new(registry()),
            RunOptions::new("platform").concurrency(8, 8),
        )
        .await;

        assert_eq!(counters(&serial.stats), counters(&parallel.stats));
        assert_eq!(serial.stats.decisions, parallel.stats.decisions);
        assert_eq!(
            serial.stats.artifacts_deleted,
            parallel.stats.artifacts_deleted
        );

        let digests = |r: &RunResult| {
            let mut d: Vec<_> = r.records.iter().map(|r| r.artifact.digest.clone()).collect();
            d.sort();
            d
        };
        assert_eq!(digests(&serial), digests(&parallel));
    }

    #[tokio::test]
    async fn test_repository_listing_failure_is_isolated() {
        let registry = Arc::new(registry().failing_artifact_listing("sdp-worker"));
        let result = run(Arc::clone(&registry), RunOptions::new("platform")).await;

        assert_eq!(result.stats.repositories_processed, 3);
        assert_eq!(result.stats.errors, 1);
        assert_eq!(result.repository_failures.len(), 1);
        assert_eq!(result.repository_failures[0].repository, "sdp-worker");
        // cdp-api (4) + cdp-web (2)
        assert_eq!(result.stats.artifacts_checked, 6);
        assert!(
            result
                .records
                .iter()
                .all(|r| r.artifact.repository != "sdp-worker")
        );
    }

    #[tokio::test]
    async fn test_delete_failures_are_counted() {
        let registry = Arc::new(
            registry()
                .failing_delete("sha256:cdp-api-0")
                .failing_delete("sha256:cdp-web-0"),
        );
        let result = run(Arc::clone(&registry), RunOptions::new("platform")).await;

        assert_eq!(result.stats.artifacts_to_delete, 4);
        assert_eq!(result.stats.artifacts_deleted, 2);
        assert_eq!(result.stats.errors, 2);
        assert_eq!(registry.deleted().len(), 2);
        assert_eq!(
            result.records.iter().filter(|r| r.outcome.is_failure()).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_repository_list_failure_is_fatal() {
        let registry = Arc::new(registry().failing_repository_listing());
        let err = scheduler(registry, RunOptions::new("platform"))
            .run_at(now(), CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Permission(_)));
    }

    #[tokio::test]
    async fn test_empty_project() {
        let result = run(
            Arc::new(InMemoryRegistry::new("platform")),
            RunOptions::new("platform"),
        )
        .await;
        assert_eq!(result.stats, RunStats::default());
        assert!(result.records.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_returns_partial_result() {
        let (handle, signal) = cancellation();
        let artifacts = (0..10).map(|n| stale("cdp-api", n)).collect();
        let registry = Arc::new(
            InMemoryRegistry::new("platform")
                .with_repository("cdp-api", artifacts)
                .cancel_during_delete(3, handle),
        );

        let result = scheduler(
            Arc::clone(&registry),
            RunOptions::new("platform").concurrency(1, 1),
        )
        .run_at(now(), signal)
        .await
        .unwrap();

        assert!(result.cancelled);
        // The delete in flight when cancel fired still completes and is recorded.
        assert_eq!(registry.deleted().len(), 3);
        assert_eq!(result.stats.artifacts_deleted, 3);
        assert_eq!(result.stats.artifacts_checked, 3);
        assert_eq!(result.records.len(), 3);
        assert_eq!(result.stats.repositories_processed, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_processes_nothing() {
        let (handle, signal) = cancellation();
        handle.cancel();
        let registry = Arc::new(registry());

        let result = scheduler(Arc::clone(&registry), RunOptions::new("platform"))
            .run_at(now(), signal)
            .await
            .unwrap();

        assert!(result.cancelled);
        assert_eq!(result.stats.repositories_in_scope, 3);
        assert_eq!(result.stats.repositories_processed, 0);
        assert!(registry.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_total_in_flight_is_bounded() {
        let mut registry = InMemoryRegistry::new("platform")
            .with_delete_delay(std::time::Duration::from_millis(5));
        for repo in ["cdp-a", "cdp-b", "cdp-c", "cdp-d"] {
            registry = registry.with_repository(repo, (0..6).map(|n| stale(repo, n)).collect());
        }
        let registry = Arc::new(registry);

        let result = run(
            Arc::clone(&registry),
            RunOptions::new("platform").concurrency(2, 3),
        )
        .await;

        assert_eq!(result.stats.artifacts_deleted, 24);
        assert!(registry.peak_concurrent_deletes() <= 6);
    }
}
