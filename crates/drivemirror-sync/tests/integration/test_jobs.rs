//! Integration tests for the job runner and task registry

use std::{sync::Arc, time::Duration};

use drivemirror_core::domain::RunPhase;
use drivemirror_sync::{
    health::HealthStatus,
    jobs::{JobKind, JobRunner, TaskId, TaskOutput, TaskState, SOFT_LIMIT_STATUS},
    orchestrator::SyncRequest,
    JobError,
};
use tokio::sync::mpsc;

use crate::common::{self, FakeMirrorTool};

fn sync_summary(state: &TaskState) -> &drivemirror_core::domain::SyncSummary {
    match state {
        TaskState::Succeeded {
            result: TaskOutput::Sync(summary),
        } => summary,
        other => panic!("expected a sync result, got {other:?}"),
    }
}

// ============================================================================
// Direct runs
// ============================================================================

#[tokio::test]
async fn test_run_sync_reports_job_and_run_phases() {
    let tool = Arc::new(FakeMirrorTool::new().with_source_files(3, 300));
    let runner = common::runner(&tool, common::config());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let summary = runner
        .run_sync(SyncRequest::new(false, false), Some(tx))
        .await
        .unwrap();
    assert!(summary.success);
    assert_eq!(summary.destination_files, 3);

    let mut phases = Vec::new();
    while let Ok(phase) = rx.try_recv() {
        phases.push(phase);
    }
    assert_eq!(
        &phases[..3],
        &[
            RunPhase::Initializing,
            RunPhase::TestingConnections,
            RunPhase::Syncing
        ]
    );
    assert_eq!(phases.last(), Some(&RunPhase::Done));
}

#[tokio::test]
async fn test_unreachable_destination_never_transfers() {
    let tool = Arc::new(
        FakeMirrorTool::new()
            .with_source_files(3, 300)
            .with_unreachable_destination(),
    );
    let runner = common::runner(&tool, common::config());

    let err = runner
        .run_sync(SyncRequest::new(false, false), None)
        .await
        .unwrap_err();

    match err {
        JobError::Unreachable(report) => {
            assert!(report.source_reachable);
            assert!(!report.destination_reachable);
        }
        other => panic!("expected Unreachable, got {other:?}"),
    }
    assert_eq!(tool.count_calls("transfer"), 0);
    assert_eq!(tool.count_calls("probe"), 0);
}

#[tokio::test]
async fn test_unreachable_source_still_checks_destination() {
    let tool = Arc::new(FakeMirrorTool::new().with_unreachable_source());
    let runner = common::runner(&tool, common::config());

    let err = runner
        .run_sync(SyncRequest::default(), None)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Connection test failed: source unreachable, destination reachable"
    );
    assert_eq!(tool.count_calls("lsf:"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_hard_time_limit_cancels_the_run() {
    let tool = Arc::new(
        FakeMirrorTool::new()
            .with_source_files(3, 300)
            .with_transfer_delay(Duration::from_secs(600)),
    );
    let mut config = common::config();
    config.jobs.soft_time_limit_secs = 30;
    config.jobs.time_limit_secs = 60;
    let runner = common::runner(&tool, config);

    let err = runner
        .run_sync(SyncRequest::default(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, JobError::TimedOut(60)));
}

// ============================================================================
// Queued runs and the task registry
// ============================================================================

#[tokio::test]
async fn test_submitted_sync_succeeds() {
    let tool = Arc::new(FakeMirrorTool::new().with_source_files(3, 300));
    let runner = common::runner(&tool, common::config());

    let id = runner.submit_sync(SyncRequest::default(), None);
    assert_eq!(runner.kind(&id), Some(JobKind::Sync));

    let (state, _) = common::wait_finished(&runner, &id).await;
    assert_eq!(state.label(), "SUCCESS");
    assert!(sync_summary(&state).success);
}

#[tokio::test]
async fn test_three_outcomes_are_distinguishable() {
    // Completed and succeeded
    let ok_tool = Arc::new(FakeMirrorTool::new().with_source_files(2, 20));
    let ok_runner = common::runner(&ok_tool, common::config());
    let id = ok_runner.submit_sync(SyncRequest::default(), None);
    let (state, _) = common::wait_finished(&ok_runner, &id).await;
    assert!(sync_summary(&state).success);

    // Completed but reported failure
    let failing_tool = Arc::new(
        FakeMirrorTool::new()
            .with_source_files(2, 20)
            .with_transfer_exit(1),
    );
    let failing_runner = common::runner(&failing_tool, common::config());
    let id = failing_runner.submit_sync(SyncRequest::default(), None);
    let (state, _) = common::wait_finished(&failing_runner, &id).await;
    let summary = sync_summary(&state);
    assert!(!summary.success);
    assert_eq!(summary.errors, vec!["Sync failed with exit code 1"]);

    // Could not be executed at all
    let down_tool = Arc::new(FakeMirrorTool::new().with_unreachable_destination());
    let down_runner = common::runner(&down_tool, common::config());
    let id = down_runner.submit_sync(SyncRequest::default(), None);
    let (state, _) = common::wait_finished(&down_runner, &id).await;
    match state {
        TaskState::Failed { error } => assert!(error.starts_with("Connection test failed")),
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_setup_failure_fails_the_task() {
    let tool = Arc::new(FakeMirrorTool::new().with_setup_error("GOOGLE_SERVICE_ACCOUNT_JSON not configured"));
    let runner = common::runner(&tool, common::config());

    let id = runner.submit_sync(SyncRequest::default(), None);
    let (state, _) = common::wait_finished(&runner, &id).await;

    assert_eq!(
        state,
        TaskState::Failed {
            error: "Tool setup failed: GOOGLE_SERVICE_ACCOUNT_JSON not configured".into()
        }
    );
}

#[tokio::test]
async fn test_unknown_task_is_pending() {
    let tool = Arc::new(FakeMirrorTool::new());
    let runner = common::runner(&tool, common::config());

    assert_eq!(runner.status(&TaskId::new()), TaskState::Pending);
    assert_eq!(runner.kind(&TaskId::new()), None);
}

#[tokio::test]
async fn test_finished_results_expire() {
    let tool = Arc::new(FakeMirrorTool::new().with_source_files(1, 10));
    let mut config = common::config();
    config.jobs.result_ttl_secs = 0;
    let runner = common::runner(&tool, config);

    let id = runner.submit_sync(SyncRequest::default(), None);
    for _ in 0..500 {
        if runner.stats().finished == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(runner.stats().finished, 1);

    // With a zero TTL the stored result is dropped on the next lookup
    assert_eq!(runner.status(&id), TaskState::Pending);
    assert_eq!(runner.stats().finished, 0);
}

#[tokio::test(start_paused = true)]
async fn test_jobs_run_one_at_a_time() {
    let tool = Arc::new(
        FakeMirrorTool::new()
            .with_source_files(2, 20)
            .with_transfer_delay(Duration::from_secs(5)),
    );
    let runner = common::runner(&tool, common::config());

    let first = runner.submit_sync(SyncRequest::default(), None);
    let second = runner.submit_sync(SyncRequest::default(), None);

    let (a, _) = common::wait_finished(&runner, &first).await;
    let (b, _) = common::wait_finished(&runner, &second).await;

    assert_eq!(a.label(), "SUCCESS");
    assert_eq!(b.label(), "SUCCESS");
    assert_eq!(tool.count_calls("transfer"), 2);
    assert_eq!(tool.max_active_transfers(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_queued_job_expires_when_slot_stays_busy() {
    let tool = Arc::new(
        FakeMirrorTool::new()
            .with_source_files(2, 20)
            .with_transfer_delay(Duration::from_secs(120)),
    );
    let runner = common::runner(&tool, common::config());

    let long = runner.submit_sync(SyncRequest::default(), None);
    // Let the first job take the slot
    tokio::time::sleep(Duration::from_millis(10)).await;
    let late = runner.submit_sync(SyncRequest::default(), Some(Duration::from_secs(60)));

    let (late_state, _) = common::wait_finished(&runner, &late).await;
    assert_eq!(
        late_state,
        TaskState::Failed {
            error: "Job expired after waiting 60s to start".into()
        }
    );

    let (long_state, _) = common::wait_finished(&runner, &long).await;
    assert_eq!(long_state.label(), "SUCCESS");
    assert_eq!(tool.count_calls("transfer"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_soft_time_limit_is_reported_before_completion() {
    let tool = Arc::new(
        FakeMirrorTool::new()
            .with_source_files(2, 20)
            .with_transfer_delay(Duration::from_secs(20)),
    );
    let mut config = common::config();
    config.jobs.soft_time_limit_secs = 5;
    config.jobs.time_limit_secs = 600;
    let runner = common::runner(&tool, config);

    let id = runner.submit_sync(SyncRequest::default(), None);
    let (state, seen) = common::wait_finished(&runner, &id).await;

    assert!(seen.contains(&TaskState::Progress {
        status: SOFT_LIMIT_STATUS.to_string()
    }));
    assert!(seen.contains(&TaskState::Progress {
        status: "transferring".to_string()
    }));
    assert!(sync_summary(&state).success);
}

#[tokio::test]
async fn test_stats_count_finished_tasks() {
    let tool = Arc::new(FakeMirrorTool::new().with_source_files(1, 10));
    let runner = common::runner(&tool, common::config());

    let id = runner.submit_sync(SyncRequest::default(), None);
    common::wait_finished(&runner, &id).await;

    let stats = runner.stats();
    assert_eq!(stats.finished, 1);
    assert_eq!(stats.pending + stats.running, 0);
}

// ============================================================================
// Health checks
// ============================================================================

#[tokio::test]
async fn test_health_check_reports_counts() {
    let tool = Arc::new(
        FakeMirrorTool::new()
            .with_source_files(7, 700)
            .with_destination_file("file_000.csv", 100),
    );
    let runner = common::runner(&tool, common::config());

    let report = runner.run_health_check().await.unwrap();

    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.source.as_ref().map(|s| s.files), Some(7));
    assert_eq!(report.destination.as_ref().map(|d| d.files), Some(1));
    assert_eq!(
        report.destination.as_ref().map(|d| d.remote.as_str()),
        Some("s3:reports-mirror")
    );
    assert!(report.error.is_none());
}

#[tokio::test]
async fn test_health_check_unhealthy_when_remote_down() {
    let tool = Arc::new(FakeMirrorTool::new().with_unreachable_source());
    let runner = common::runner(&tool, common::config());

    let report = runner.run_health_check().await.unwrap();
    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert_eq!(report.connections.map(|c| c.source_reachable), Some(false));
}

#[tokio::test]
async fn test_health_check_error_on_setup_failure() {
    let tool = Arc::new(FakeMirrorTool::new().with_setup_error("S3 credentials not configured"));
    let runner: JobRunner = common::runner(&tool, common::config());

    let id = runner.submit_health_check(None);
    let (state, _) = common::wait_finished(&runner, &id).await;

    match state {
        TaskState::Succeeded {
            result: TaskOutput::Health(report),
        } => {
            assert_eq!(report.status, HealthStatus::Error);
            assert!(report.connections.is_none());
            assert_eq!(
                report.error.as_deref(),
                Some("Tool setup failed: S3 credentials not configured")
            );
        }
        other => panic!("expected a health report, got {other:?}"),
    }
    assert_eq!(runner.kind(&id), Some(JobKind::HealthCheck));
}
