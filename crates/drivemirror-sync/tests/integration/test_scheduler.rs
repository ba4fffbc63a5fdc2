//! Integration tests for the cron scheduler

use std::{sync::Arc, time::Duration};

use chrono::{TimeZone, Utc};
use drivemirror_core::domain::{CronSchedule, DomainError};
use drivemirror_sync::{jobs::JobKind, scheduler::JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::common::{self, FakeMirrorTool};

fn scheduler(config: &drivemirror_core::config::Config) -> Result<JobScheduler, DomainError> {
    let tool = Arc::new(FakeMirrorTool::new());
    let runner = common::runner(&tool, config.clone());
    JobScheduler::new(runner, config, CancellationToken::new())
}

#[tokio::test]
async fn test_four_field_schedule_is_rejected_before_scheduling() {
    let mut config = common::config();
    config.sync.schedule = "0 6 * *".to_string();

    let err = scheduler(&config).err().expect("malformed schedule must fail");
    assert!(matches!(err, DomainError::InvalidCron { .. }));
    assert!(err.to_string().contains("expected 5 fields, found 4"));
}

#[tokio::test]
async fn test_malformed_health_schedule_is_rejected() {
    let mut config = common::config();
    config.jobs.health_check_schedule = "*/15 * * * * *".to_string();
    assert!(scheduler(&config).is_err());
}

#[tokio::test]
async fn test_next_fire_merges_jobs_due_at_the_same_minute() {
    let scheduler = scheduler(&common::config()).unwrap();

    let before_six = Utc.with_ymd_and_hms(2024, 3, 4, 5, 50, 0).unwrap();
    let (at, due) = scheduler.next_fire(before_six).unwrap();
    assert_eq!(at, Utc.with_ymd_and_hms(2024, 3, 4, 6, 0, 0).unwrap());
    assert_eq!(due, vec![JobKind::Sync, JobKind::HealthCheck]);

    let (at, due) = scheduler.next_fire(at).unwrap();
    assert_eq!(at, Utc.with_ymd_and_hms(2024, 3, 4, 6, 15, 0).unwrap());
    assert_eq!(due, vec![JobKind::HealthCheck]);
}

#[tokio::test]
async fn test_next_fire_with_sparse_sync_schedule() {
    let tool = Arc::new(FakeMirrorTool::new());
    let runner = common::runner(&tool, common::config());
    let scheduler = JobScheduler::from_schedules(
        runner,
        CronSchedule::parse("30 2 * * 1").unwrap(),
        CronSchedule::parse("0 0 1 1 *").unwrap(),
        CancellationToken::new(),
    );

    // Sunday evening; next Monday 02:30 comes before 1 January
    let sunday = Utc.with_ymd_and_hms(2024, 3, 3, 20, 0, 0).unwrap();
    let (at, due) = scheduler.next_fire(sunday).unwrap();
    assert_eq!(at, Utc.with_ymd_and_hms(2024, 3, 4, 2, 30, 0).unwrap());
    assert_eq!(due, vec![JobKind::Sync]);
}

#[tokio::test]
async fn test_late_wakeup_skips_missed_fire_times() {
    let scheduler = scheduler(&common::config()).unwrap();

    // Fired the 06:00 jobs but only got here at 09:07
    let fired = Utc.with_ymd_and_hms(2024, 3, 4, 6, 0, 0).unwrap();
    let woke = Utc.with_ymd_and_hms(2024, 3, 4, 9, 7, 30).unwrap();
    let cursor = JobScheduler::resume_after(fired, woke);

    let (at, due) = scheduler.next_fire(cursor).unwrap();
    assert_eq!(at, Utc.with_ymd_and_hms(2024, 3, 4, 9, 15, 0).unwrap());
    assert_eq!(due, vec![JobKind::HealthCheck]);
}

#[tokio::test]
async fn test_on_time_wakeup_continues_from_fire_time() {
    let fired = Utc.with_ymd_and_hms(2024, 3, 4, 6, 0, 0).unwrap();
    let early = Utc.with_ymd_and_hms(2024, 3, 4, 5, 59, 59).unwrap();
    assert_eq!(JobScheduler::resume_after(fired, early), fired);
}

#[tokio::test]
async fn test_run_stops_on_cancellation() {
    let tool = Arc::new(FakeMirrorTool::new());
    let config = common::config();
    let runner = common::runner(&tool, config.clone());
    let shutdown = CancellationToken::new();
    let scheduler = JobScheduler::new(runner, &config, shutdown.clone()).unwrap();

    let handle = tokio::spawn(async move { scheduler.run().await });
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler should stop promptly")
        .unwrap();
    assert!(tool.calls().is_empty());
}
