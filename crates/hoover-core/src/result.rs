//! Run results handed to the reporting layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::decision::{Decision, DecisionKind};
use crate::id::RunId;

/// What actually happened to an artifact after its decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// No action was required (keep or skip).
    Retained,
    /// The registry confirmed the delete.
    Deleted,
    /// Would have been deleted; dry-run suppressed the call.
    DryRun,
    /// The delete call failed; the artifact is still in place.
    Failed { error: String },
}

impl ActionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ActionOutcome::Failed { .. })
    }
}

impl std::fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionOutcome::Retained => write!(f, "retained"),
            ActionOutcome::Deleted => write!(f, "deleted"),
            ActionOutcome::DryRun => write!(f, "would delete"),
            ActionOutcome::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// One examined artifact, its decision and the resulting action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub artifact: Artifact,
    pub decision: Decision,
    pub outcome: ActionOutcome,
}

impl DecisionRecord {
    pub fn new(artifact: Artifact, decision: Decision, outcome: ActionOutcome) -> Self {
        Self {
            artifact,
            decision,
            outcome,
        }
    }
}

/// A repository whose artifacts could not be listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryFailure {
    pub repository: String,
    pub error: String,
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Repositories returned by the registry.
    pub repositories_found: u64,
    /// Repositories that passed the repository filter.
    pub repositories_in_scope: u64,
    /// Repositories attempted, including those that failed.
    pub repositories_processed: u64,
    pub artifacts_checked: u64,
    pub artifacts_to_delete: u64,
    pub artifacts_deleted: u64,
    pub errors: u64,
    pub bytes_checked: u64,
    pub bytes_to_delete: u64,
    pub bytes_reclaimed: u64,
    pub decisions: BTreeMap<DecisionKind, u64>,
}

/// The frozen outcome of a cleanup run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub project: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// The run stopped early; counters cover only dispatched work.
    pub cancelled: bool,
    pub stats: RunStats,
    /// Records in completion order.
    pub records: Vec<DecisionRecord>,
    pub repository_failures: Vec<RepositoryFailure>,
}

impl RunResult {
    pub fn new(project: impl Into<String>, dry_run: bool, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: RunId::new(),
            project: project.into(),
            dry_run,
            started_at,
            finished_at: None,
            cancelled: false,
            stats: RunStats::default(),
            records: Vec::new(),
            repository_failures: Vec::new(),
        }
    }

    /// Records whose decision was `Delete`, whatever happened afterwards.
    pub fn deletion_candidates(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.records.iter().filter(|r| r.decision.is_delete())
    }

    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }

    pub fn count(&self, kind: DecisionKind) -> u64 {
        self.stats.decisions.get(&kind).copied().unwrap_or(0)
    }
}
