//! Integration tests for the sync state machine

use std::sync::Arc;

use drivemirror_core::domain::{RunPhase, SyncMode};
use drivemirror_sync::{orchestrator::SyncRequest, SyncError};
use tokio::sync::mpsc;

use crate::common::{self, FakeMirrorTool};

fn incremental() -> SyncRequest {
    SyncRequest::new(false, false)
}

// ============================================================================
// Successful runs
// ============================================================================

#[tokio::test]
async fn test_fresh_incremental_sync_mirrors_everything() {
    let tool = Arc::new(FakeMirrorTool::new().with_source_files(120, 5_000_000));
    let config = common::config_with_critical(&["file_000.csv", "file_119.csv"]);
    let orchestrator = common::orchestrator(&tool, config);

    let result = orchestrator.run(incremental()).await.unwrap();

    assert!(result.success());
    assert_eq!(result.mode(), SyncMode::Incremental);
    assert_eq!(result.source_files(), 120);
    assert_eq!(result.source_size_bytes(), 5_000_000);
    assert_eq!(result.destination_files(), 120);
    assert_eq!(result.destination_size_bytes(), 5_000_000);
    assert!(result.errors().is_empty());
    assert_eq!(result.verified_files().len(), 2);
    assert!(result.verified_files().values().all(|ok| *ok));
    assert!(result.finished_at() >= result.started_at());
    assert!(result.duration_seconds() >= 0.0);
    assert_eq!(result.log_output(), "Transferred: 120\n");

    let summary = result.to_summary();
    assert_eq!(summary.source_size_mb, 4.77);
}

#[tokio::test]
async fn test_consecutive_incremental_runs_are_idempotent() {
    let tool = Arc::new(FakeMirrorTool::new().with_source_files(12, 48_000));
    let orchestrator = common::orchestrator(&tool, common::config());

    let first = orchestrator.run(incremental()).await.unwrap();
    assert_eq!(tool.last_copied(), 12);

    let second = orchestrator.run(incremental()).await.unwrap();
    assert_eq!(tool.last_copied(), 0, "second run must not re-transfer");

    assert_eq!(first.destination_files(), second.destination_files());
    assert_eq!(
        first.destination_size_bytes(),
        second.destination_size_bytes()
    );
}

#[tokio::test]
async fn test_request_flags_fall_back_to_config_defaults() {
    let tool = Arc::new(FakeMirrorTool::new().with_source_files(3, 300));
    let mut config = common::config();
    config.sync.dry_run = true;
    let orchestrator = common::orchestrator(&tool, config);

    let result = orchestrator.run(SyncRequest::default()).await.unwrap();
    assert_eq!(result.mode(), SyncMode::DryRun);

    let result = orchestrator
        .run(SyncRequest {
            dry_run: Some(false),
            force_full: None,
        })
        .await
        .unwrap();
    assert_eq!(result.mode(), SyncMode::Incremental);
}

#[tokio::test]
async fn test_setup_runs_before_any_tool_call() {
    let tool = Arc::new(FakeMirrorTool::new().with_source_files(1, 10));
    let orchestrator = common::orchestrator(&tool, common::config());

    orchestrator.run(incremental()).await.unwrap();
    assert_eq!(tool.calls().first().map(String::as_str), Some("setup"));
}

// ============================================================================
// Dry run and force full
// ============================================================================

#[tokio::test]
async fn test_dry_run_never_purges_or_verifies() {
    let tool = Arc::new(
        FakeMirrorTool::new()
            .with_source_files(5, 500)
            .with_destination_file("stale.csv", 1),
    );
    let config = common::config_with_critical(&["file_000.csv"]);
    let orchestrator = common::orchestrator(&tool, config);

    // force_full is ignored alongside dry_run
    let result = orchestrator
        .run(SyncRequest::new(true, true))
        .await
        .unwrap();

    assert_eq!(result.mode(), SyncMode::DryRun);
    assert!(result.success());
    assert!(result.verified_files().is_empty());
    assert_eq!(tool.count_calls("purge"), 0);
    assert_eq!(tool.count_calls("list_files"), 0);
    assert_eq!(tool.destination_names(), vec!["stale.csv"]);

    let args = &tool.transfer_args()[0];
    assert!(args.contains(&"--dry-run".to_string()));
}

#[tokio::test]
async fn test_force_full_purges_exactly_once_before_transfer() {
    let tool = Arc::new(
        FakeMirrorTool::new()
            .with_source_files(4, 400)
            .with_destination_file("stale.csv", 1),
    );
    let orchestrator = common::orchestrator(&tool, common::config());

    let result = orchestrator
        .run(SyncRequest::new(false, true))
        .await
        .unwrap();

    assert!(result.success());
    assert_eq!(result.mode(), SyncMode::ForceFull);
    assert_eq!(tool.count_calls("purge"), 1);

    let calls = tool.calls();
    let purge = calls.iter().position(|c| c.starts_with("purge")).unwrap();
    let transfer = calls.iter().position(|c| c == "transfer").unwrap();
    assert!(purge < transfer);

    assert!(!tool.destination_names().contains(&"stale.csv".to_string()));
    assert_eq!(result.destination_files(), 4);
}

#[tokio::test]
async fn test_purge_failure_is_recorded_and_transfer_still_runs() {
    let tool = Arc::new(
        FakeMirrorTool::new()
            .with_source_files(4, 400)
            .with_purge_error("rclone delete failed with exit code 1: AccessDenied"),
    );
    let orchestrator = common::orchestrator(&tool, common::config());

    let result = orchestrator
        .run(SyncRequest::new(false, true))
        .await
        .unwrap();

    assert_eq!(
        result.errors(),
        &["Purge failed: rclone delete failed with exit code 1: AccessDenied"]
    );
    assert_eq!(tool.count_calls("transfer"), 1);
    // A purge failure alone does not flip the verdict
    assert!(result.success());
}

// ============================================================================
// Failure classification
// ============================================================================

#[tokio::test]
async fn test_non_zero_exit_fails_the_run() {
    let tool = Arc::new(
        FakeMirrorTool::new()
            .with_source_files(4, 400)
            .with_destination_file("file_000.csv", 100)
            .with_transfer_exit(3),
    );
    let config = common::config_with_critical(&["file_000.csv"]);
    let orchestrator = common::orchestrator(&tool, config);

    let result = orchestrator.run(incremental()).await.unwrap();

    assert!(!result.success());
    assert_eq!(result.errors(), &["Sync failed with exit code 3"]);
    assert!(result.verified_files().is_empty());
    assert_eq!(tool.count_calls("list_files"), 0);
    // The destination is still probed after a failed transfer
    assert_eq!(tool.count_calls("probe:s3:reports-mirror"), 1);
    assert_eq!(result.destination_files(), 1);
    assert!(result.log_output().contains("ERROR: transfer failed"));
}

#[tokio::test]
async fn test_spawn_failure_is_a_failed_transfer() {
    let tool = Arc::new(
        FakeMirrorTool::new()
            .with_source_files(2, 20)
            .with_spawn_error("rclone binary not found: rclone"),
    );
    let orchestrator = common::orchestrator(&tool, common::config());

    let result = orchestrator.run(incremental()).await.unwrap();

    assert!(!result.success());
    assert_eq!(
        result.errors(),
        &["Sync exception: rclone binary not found: rclone"]
    );
    assert_eq!(result.log_output(), "");
}

#[tokio::test]
async fn test_missing_critical_file_overrides_transfer_success() {
    let tool = Arc::new(
        FakeMirrorTool::new()
            .with_source_files(3, 300)
            .with_skipped_file("file_002.csv"),
    );
    let config = common::config_with_critical(&["file_000.csv", "file_002.csv"]);
    let orchestrator = common::orchestrator(&tool, config);

    let result = orchestrator.run(incremental()).await.unwrap();

    assert!(!result.success());
    assert_eq!(result.verified_files().get("file_000.csv"), Some(&true));
    assert_eq!(result.verified_files().get("file_002.csv"), Some(&false));
    assert_eq!(
        result.errors(),
        &["Critical files missing from destination: file_002.csv"]
    );
}

#[tokio::test]
async fn test_listing_failure_marks_every_critical_file_missing() {
    let tool = Arc::new(
        FakeMirrorTool::new()
            .with_source_files(3, 300)
            .with_list_error(),
    );
    let config = common::config_with_critical(&["file_001.csv", "file_000.csv"]);
    let orchestrator = common::orchestrator(&tool, config);

    let result = orchestrator.run(incremental()).await.unwrap();

    assert!(!result.success());
    assert!(result.verified_files().values().all(|ok| !*ok));
    assert_eq!(
        result.errors(),
        &["Critical files missing from destination: file_000.csv, file_001.csv"]
    );
    assert_eq!(tool.count_calls("list_files"), 1);
}

#[tokio::test]
async fn test_probe_failure_degrades_to_zero() {
    let tool = Arc::new(
        FakeMirrorTool::new()
            .with_source_files(3, 300)
            .with_probe_error(),
    );
    let orchestrator = common::orchestrator(&tool, common::config());

    let result = orchestrator.run(incremental()).await.unwrap();

    assert!(result.success());
    assert_eq!(result.source_files(), 0);
    assert_eq!(result.source_size_bytes(), 0);
    assert_eq!(result.destination_files(), 0);
    assert!(result.errors().is_empty());
}

#[tokio::test]
async fn test_setup_failure_produces_no_result() {
    let tool = Arc::new(FakeMirrorTool::new().with_setup_error("S3 credentials not configured"));
    let orchestrator = common::orchestrator(&tool, common::config());

    let err = orchestrator.run(incremental()).await.unwrap_err();

    assert!(matches!(err, SyncError::Setup(_)));
    assert_eq!(
        err.to_string(),
        "Tool setup failed: S3 credentials not configured"
    );
    assert_eq!(tool.count_calls("transfer"), 0);
}

// ============================================================================
// Phase events
// ============================================================================

async fn phases_for(request: SyncRequest) -> Vec<RunPhase> {
    let tool = Arc::new(FakeMirrorTool::new().with_source_files(2, 20));
    let orchestrator = common::orchestrator(&tool, common::config_with_critical(&["file_000.csv"]));
    let (tx, mut rx) = mpsc::unbounded_channel();

    orchestrator
        .run_with_events(request, Some(&tx))
        .await
        .unwrap();
    drop(tx);

    let mut phases = Vec::new();
    while let Some(phase) = rx.recv().await {
        phases.push(phase);
    }
    phases
}

#[tokio::test]
async fn test_phase_events_for_incremental_run() {
    assert_eq!(
        phases_for(incremental()).await,
        vec![
            RunPhase::ProbingSource,
            RunPhase::Transferring,
            RunPhase::ProbingDestination,
            RunPhase::Verifying,
            RunPhase::Done,
        ]
    );
}

#[tokio::test]
async fn test_phase_events_for_force_full_and_dry_run() {
    assert_eq!(
        phases_for(SyncRequest::new(false, true)).await,
        vec![
            RunPhase::ProbingSource,
            RunPhase::Purging,
            RunPhase::Transferring,
            RunPhase::ProbingDestination,
            RunPhase::Verifying,
            RunPhase::Done,
        ]
    );
    assert_eq!(
        phases_for(SyncRequest::new(true, false)).await,
        vec![
            RunPhase::ProbingSource,
            RunPhase::Transferring,
            RunPhase::ProbingDestination,
            RunPhase::Done,
        ]
    );
}
