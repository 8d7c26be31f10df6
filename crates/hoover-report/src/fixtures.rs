//! Sample run results for renderer tests.

use chrono::{Duration, TimeZone, Utc};
use hoover_core::{
    ActionOutcome, AgeBasis, Artifact, Decision, DecisionKind, DecisionRecord, RepositoryFailure,
    RunResult,
};

/// Two deletion candidates (one deleted, one failed), one kept, one
/// protected, and one repository that could not be listed.
pub fn sample_result(dry_run: bool) -> RunResult {
    let started = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let mut result = RunResult::new("platform", dry_run, started);
    result.finished_at = Some(started + Duration::seconds(42));

    let delete = Decision::Delete {
        basis: AgeBasis::LastPull,
    };
    let (deleted, failed) = if dry_run {
        (ActionOutcome::DryRun, ActionOutcome::DryRun)
    } else {
        (
            ActionOutcome::Deleted,
            ActionOutcome::Failed {
                error: "403 Forbidden".into(),
            },
        )
    };

    result.records = vec![
        DecisionRecord::new(
            Artifact::new(
                "cdp-api",
                "sha256:4f53cda18c2baa0c0354bb5f9a3ecbe5ed12ab4d8e11ba873c2f11161202b945",
            )
            .with_tags(["v1.0.0"])
            .with_size(52_428_800),
            delete.clone(),
            deleted,
        ),
        DecisionRecord::new(
            Artifact::new("cdp-api", "sha256:0123456789abcdef0123")
                .with_size(10_485_760)
                .with_pulled_at(Some(started - Duration::days(30))),
            delete,
            failed,
        ),
        DecisionRecord::new(
            Artifact::new("cdp-web", "sha256:keepme0000000000").with_size(1_024),
            Decision::Keep {
                basis: AgeBasis::Created,
            },
            ActionOutcome::Retained,
        ),
        DecisionRecord::new(
            Artifact::new("cdp-web", "sha256:feedfacecafe0000")
                .with_tags(["latest"])
                .with_size(2_048),
            Decision::SkipProtected {
                tag: "latest".into(),
            },
            ActionOutcome::Retained,
        ),
    ];
    result.repository_failures = vec![RepositoryFailure {
        repository: "sdp-worker".into(),
        error: "listing timed out".into(),
    }];

    let stats = &mut result.stats;
    stats.repositories_found = 4;
    stats.repositories_in_scope = 3;
    stats.repositories_processed = 3;
    stats.artifacts_checked = 4;
    stats.artifacts_to_delete = 2;
    stats.artifacts_deleted = if dry_run { 0 } else { 1 };
    stats.errors = if dry_run { 1 } else { 2 };
    stats.bytes_checked = 52_428_800 + 10_485_760 + 1_024 + 2_048;
    stats.bytes_to_delete = 52_428_800 + 10_485_760;
    stats.bytes_reclaimed = if dry_run { 0 } else { 52_428_800 };
    stats.decisions.insert(DecisionKind::Delete, 2);
    stats.decisions.insert(DecisionKind::Keep, 1);
    stats.decisions.insert(DecisionKind::SkipProtected, 1);
    result
}
