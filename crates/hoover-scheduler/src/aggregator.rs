//! Folds per-artifact and per-repository outcomes into one run result.

use chrono::{DateTime, Utc};
use hoover_core::{ActionOutcome, DecisionRecord, Repository, RepositoryFailure, RunResult};
use tokio::sync::Mutex;
use tracing::warn;

/// How a repository's processing ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryOutcome {
    /// Artifacts were listed and every dispatched artifact was handled.
    Completed,
    /// The repository could not be processed at all.
    Failed { error: String },
}

struct State {
    result: RunResult,
    finished: bool,
}

/// Shared, thread-safe accumulator for a single run.
///
/// Every update is applied under one lock, so counters are always consistent
/// with the recorded decisions no matter how many workers report at once.
pub struct ResultAggregator {
    state: Mutex<State>,
}

impl ResultAggregator {
    pub fn new(project: impl Into<String>, dry_run: bool, started_at: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(State {
                result: RunResult::new(project, dry_run, started_at),
                finished: false,
            }),
        }
    }

    pub async fn set_repository_counts(&self, found: usize, in_scope: usize) {
        let mut state = self.state.lock().await;
        state.result.stats.repositories_found = found as u64;
        state.result.stats.repositories_in_scope = in_scope as u64;
    }

    /// Record one examined artifact.
    pub async fn record(&self, record: DecisionRecord) {
        let mut state = self.state.lock().await;
        if state.finished {
            warn!(artifact = %record.artifact, "Ignoring outcome recorded after the run finished");
            return;
        }

        let size = record.artifact.size_bytes;
        let stats = &mut state.result.stats;
        stats.artifacts_checked += 1;
        stats.bytes_checked += size;
        *stats.decisions.entry(record.decision.kind()).or_insert(0) += 1;

        if record.decision.is_delete() {
            stats.artifacts_to_delete += 1;
            stats.bytes_to_delete += size;
        }

        match &record.outcome {
            ActionOutcome::Deleted => {
                stats.artifacts_deleted += 1;
                stats.bytes_reclaimed += size;
            }
            ActionOutcome::Failed { .. } => stats.errors += 1,
            ActionOutcome::Retained | ActionOutcome::DryRun => {}
        }

        state.result.records.push(record);
    }

    /// Record the end of a repository. Failed repositories still count as processed.
    pub async fn record_repository(&self, repository: &Repository, outcome: RepositoryOutcome) {
        let mut state = self.state.lock().await;
        if state.finished {
            warn!(%repository, "Ignoring repository outcome recorded after the run finished");
            return;
        }

        state.result.stats.repositories_processed += 1;
        if let RepositoryOutcome::Failed { error } = outcome {
            state.result.stats.errors += 1;
            state.result.repository_failures.push(RepositoryFailure {
                repository: repository.name.clone(),
                error,
            });
        }
    }

    /// Current state of the run.
    pub async fn snapshot(&self) -> RunResult {
        self.state.lock().await.result.clone()
    }

    /// Stamp the end time and freeze the result. Later updates are dropped.
    pub async fn finish(&self, finished_at: DateTime<Utc>, cancelled: bool) -> RunResult {
        let mut state = self.state.lock().await;
        state.finished = true;
        state.result.finished_at = Some(finished_at);
        state.result.cancelled = cancelled;
        state.result.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoover_core::{AgeBasis, Artifact, Decision, DecisionKind};
    use std::sync::Arc;

    fn record(digest: &str, size: u64, decision: Decision, outcome: ActionOutcome) -> DecisionRecord {
        DecisionRecord::new(
            Artifact::new("cdp-api", digest).with_size(size),
            decision,
            outcome,
        )
    }

    fn delete() -> Decision {
        Decision::Delete {
            basis: AgeBasis::LastPull,
        }
    }

    #[tokio::test]
    async fn test_counters_follow_outcomes() {
        let aggregator = ResultAggregator::new("platform", false, Utc::now());
        aggregator
            .record(record("sha256:1", 100, delete(), ActionOutcome::Deleted))
            .await;
        aggregator
            .record(record(
                "sha256:2",
                50,
                delete(),
                ActionOutcome::Failed {
                    error: "denied".into(),
                },
            ))
            .await;
        aggregator
            .record(record(
                "sha256:3",
                10,
                Decision::Keep {
                    basis: AgeBasis::Created,
                },
                ActionOutcome::Retained,
            ))
            .await;

        let result = aggregator.snapshot().await;
        let stats = &result.stats;
        assert_eq!(stats.artifacts_checked, 3);
        assert_eq!(stats.artifacts_to_delete, 2);
        assert_eq!(stats.artifacts_deleted, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.bytes_checked, 160);
        assert_eq!(stats.bytes_to_delete, 150);
        assert_eq!(stats.bytes_reclaimed, 100);
        assert_eq!(result.count(DecisionKind::Delete), 2);
        assert_eq!(result.count(DecisionKind::Keep), 1);
        assert_eq!(result.records.len(), 3);
    }

    #[tokio::test]
    async fn test_dry_run_outcome_reclaims_nothing() {
        let aggregator = ResultAggregator::new("platform", true, Utc::now());
        aggregator
            .record(record("sha256:1", 100, delete(), ActionOutcome::DryRun))
            .await;

        let stats = aggregator.snapshot().await.stats;
        assert_eq!(stats.artifacts_to_delete, 1);
        assert_eq!(stats.artifacts_deleted, 0);
        assert_eq!(stats.bytes_reclaimed, 0);
        assert_eq!(stats.errors, 0);
    }

    #[tokio::test]
    async fn test_failed_repository_counts_as_processed() {
        let aggregator = ResultAggregator::new("platform", false, Utc::now());
        let ok = Repository::new("platform", "cdp-a");
        let bad = Repository::new("platform", "cdp-b");

        aggregator
            .record_repository(&ok, RepositoryOutcome::Completed)
            .await;
        aggregator
            .record_repository(
                &bad,
                RepositoryOutcome::Failed {
                    error: "timeout".into(),
                },
            )
            .await;

        let result = aggregator.snapshot().await;
        assert_eq!(result.stats.repositories_processed, 2);
        assert_eq!(result.stats.errors, 1);
        assert_eq!(
            result.repository_failures,
            vec![RepositoryFailure {
                repository: "cdp-b".into(),
                error: "timeout".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_concurrent_records_are_not_lost() {
        let aggregator = Arc::new(ResultAggregator::new("platform", false, Utc::now()));
        let mut handles = Vec::new();
        for i in 0..50u64 {
            let aggregator = Arc::clone(&aggregator);
            handles.push(tokio::spawn(async move {
                aggregator
                    .record(record(
                        &format!("sha256:{}", i),
                        i,
                        delete(),
                        ActionOutcome::Deleted,
                    ))
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = aggregator.snapshot().await.stats;
        assert_eq!(stats.artifacts_checked, 50);
        assert_eq!(stats.artifacts_deleted, 50);
        assert_eq!(stats.bytes_reclaimed, (0..50).sum::<u64>());
    }

    #[tokio::test]
    async fn test_finish_freezes_result() {
        let aggregator = ResultAggregator::new("platform", false, Utc::now());
        let finished = aggregator.finish(Utc::now(), true).await;
        assert!(finished.cancelled);
        assert!(finished.finished_at.is_some());

        aggregator
            .record(record("sha256:late", 1, delete(), ActionOutcome::Deleted))
            .await;
        assert_eq!(aggregator.snapshot().await.stats.artifacts_checked, 0);
    }
}
