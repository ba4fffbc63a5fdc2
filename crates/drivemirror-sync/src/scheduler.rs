//! Cron scheduler - submits periodic jobs to the [`JobRunner`]
//!
//! Two entries are scheduled: the sync cadence from configuration and the
//! periodic health check. The loop sleeps until the earliest next fire time,
//! submits every job due at that minute, and repeats until cancelled.
//!
//! ## Flow
//!
//! ```text
//! CronSchedule ──→ JobScheduler::run ──→ JobRunner::submit_*  (with expiry)
//!                        │
//!                 CancellationToken
//! ```
//!
//! Both expressions are parsed at construction, so a malformed schedule is
//! reported before anything is scheduled.

use std::time::Duration;

use chrono::{DateTime, Utc};
use drivemirror_core::{
    config::Config,
    domain::{CronSchedule, DomainError},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    jobs::{JobKind, JobRunner},
    orchestrator::SyncRequest,
};

/// Schedules sync and health-check jobs from cron expressions
pub struct JobScheduler {
    runner: JobRunner,
    sync: CronSchedule,
    health: CronSchedule,
    shutdown: CancellationToken,
}

impl JobScheduler {
    /// Creates a scheduler from `config`'s sync and health-check schedules.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidCron`] for a malformed expression
    pub fn new(
        runner: JobRunner,
        config: &Config,
        shutdown: CancellationToken,
    ) -> Result<Self, DomainError> {
        let sync = CronSchedule::parse(&config.sync.schedule)?;
        let health = CronSchedule::parse(&config.jobs.health_check_schedule)?;
        Ok(Self::from_schedules(runner, sync, health, shutdown))
    }

    pub fn from_schedules(
        runner: JobRunner,
        sync: CronSchedule,
        health: CronSchedule,
        shutdown: CancellationToken,
    ) -> Self {
        info!(
            sync = %sync,
            health_check = %health,
            "Creating job scheduler"
        );
        Self {
            runner,
            sync,
            health,
            shutdown,
        }
    }

    pub fn sync_schedule(&self) -> &CronSchedule {
        &self.sync
    }

    /// Earliest fire time strictly after `after`, with every job due then
    pub fn next_fire(&self, after: DateTime<Utc>) -> Option<(DateTime<Utc>, Vec<JobKind>)> {
        let candidates = [
            (JobKind::Sync, self.sync.next_after(after)),
            (JobKind::HealthCheck, self.health.next_after(after)),
        ];

        let earliest = candidates.iter().filter_map(|(_, at)| *at).min()?;
        let due = candidates
            .iter()
            .filter(|(_, at)| *at == Some(earliest))
            .map(|(kind, _)| *kind)
            .collect();
        Some((earliest, due))
    }

    /// Where the search for the next fire time continues after firing.
    ///
    /// Fire times missed while the process was suspended or the clock
    /// jumped forward are skipped rather than replayed.
    pub fn resume_after(fired_at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        fired_at.max(now)
    }

    /// Main loop; returns when the shutdown token is cancelled.
    pub async fn run(&self) {
        info!("Job scheduler starting");
        let mut cursor = Utc::now();

        loop {
            let Some((fire_at, due)) = self.next_fire(cursor) else {
                warn!("No future fire times, scheduler stopping");
                break;
            };

            let wait = (fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            debug!(next = %fire_at, jobs = ?due, wait_secs = wait.as_secs(), "Sleeping until next job");

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, scheduler stopping");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            for kind in due {
                self.submit(kind);
            }
            self.runner.purge_expired();

            let now = Utc::now();
            if now - fire_at > chrono::Duration::minutes(1) {
                warn!(fired = %fire_at, now = %now, "Scheduler woke late, skipping missed runs");
            }
            cursor = Self::resume_after(fire_at, now);
        }

        info!("Job scheduler stopped");
    }

    fn submit(&self, kind: JobKind) {
        match kind {
            JobKind::Sync => {
                let id = self
                    .runner
                    .submit_sync(SyncRequest::default(), Some(self.runner.sync_expiry()));
                info!(task_id = %id, "Scheduled sync submitted");
            }
            JobKind::HealthCheck => {
                let id = self
                    .runner
                    .submit_health_check(Some(self.runner.health_check_expiry()));
                debug!(task_id = %id, "Scheduled health check submitted");
            }
        }
    }
}
