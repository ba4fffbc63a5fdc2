//! Job runner
//!
//! Executes sync and health-check jobs one at a time, on demand or from the
//! scheduler, and keeps their outcome in an in-memory task registry.
//!
//! ## Outcomes
//!
//! A finished sync job is one of:
//!
//! 1. [`TaskState::Succeeded`] whose summary has `success == true`
//! 2. [`TaskState::Succeeded`] whose summary has `success == false` (the run
//!    happened and reported failure)
//! 3. [`TaskState::Failed`] (the run could not be executed at all; no result)
//!
//! ## Limits
//!
//! - A single-permit semaphore admits one job at a time.
//! - A job that cannot start within its expiry window is dropped.
//! - Past the soft time limit the task is marked `soft_time_limit_exceeded`;
//!   past the hard limit the job future is dropped, which kills the tool's
//!   child process.

use std::{
    fmt,
    future::Future,
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use drivemirror_core::{
    config::JobsConfig,
    domain::{RunPhase, SyncSummary},
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    health::{health_check, HealthReport},
    orchestrator::{PhaseSender, SyncOrchestrator, SyncRequest},
    JobError,
};

/// Progress status recorded once the soft time limit has passed
pub const SOFT_LIMIT_STATUS: &str = "soft_time_limit_exceeded";

// ============================================================================
// Task identity and state
// ============================================================================

/// Identifier handed out for every submitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Kind of work a task performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Sync,
    HealthCheck,
}

/// Result payload of a finished task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskOutput {
    Sync(SyncSummary),
    Health(HealthReport),
}

/// Externally visible state of a task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    /// Queued, or unknown to this runner
    Pending,
    Progress { status: String },
    Succeeded { result: TaskOutput },
    Failed { error: String },
}

impl TaskState {
    /// Status label used by the HTTP API
    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Progress { .. } => "PROGRESS",
            TaskState::Succeeded { .. } => "SUCCESS",
            TaskState::Failed { .. } => "FAILURE",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, TaskState::Succeeded { .. } | TaskState::Failed { .. })
    }
}

#[derive(Debug, Clone)]
struct TaskRecord {
    kind: JobKind,
    state: TaskState,
    finished_at: Option<DateTime<Utc>>,
}

/// Counts over the task registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerStats {
    /// A job currently holds the execution slot
    pub busy: bool,
    pub pending: usize,
    pub running: usize,
    pub finished: usize,
}

// ============================================================================
// JobRunner
// ============================================================================

struct RunnerInner {
    orchestrator: Arc<SyncOrchestrator>,
    limits: JobsConfig,
    slot: Semaphore,
    tasks: DashMap<TaskId, TaskRecord>,
    shutdown: CancellationToken,
}

/// Serialized executor for sync and health-check jobs
///
/// Cheap to clone; clones share the slot and the registry.
#[derive(Clone)]
pub struct JobRunner {
    inner: Arc<RunnerInner>,
}

impl JobRunner {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, limits: JobsConfig) -> Self {
        Self::with_shutdown(orchestrator, limits, CancellationToken::new())
    }

    /// Creates a runner whose jobs are cancelled when `shutdown` fires
    pub fn with_shutdown(
        orchestrator: Arc<SyncOrchestrator>,
        limits: JobsConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                orchestrator,
                limits,
                slot: Semaphore::new(1),
                tasks: DashMap::new(),
                shutdown,
            }),
        }
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.inner.orchestrator
    }

    pub fn limits(&self) -> &JobsConfig {
        &self.inner.limits
    }

    /// Expiry window for scheduled syncs
    pub fn sync_expiry(&self) -> Duration {
        Duration::from_secs(self.inner.limits.sync_expires_secs)
    }

    /// Expiry window for scheduled health checks
    pub fn health_check_expiry(&self) -> Duration {
        Duration::from_secs(self.inner.limits.health_check_expires_secs)
    }

    // ------------------------------------------------------------------------
    // Direct execution
    // ------------------------------------------------------------------------

    /// Runs a sync job in the caller's task and returns its summary.
    ///
    /// Waits for the execution slot without expiry. Phase events are
    /// forwarded to `events` when given.
    pub async fn run_sync(
        &self,
        request: SyncRequest,
        events: Option<PhaseSender>,
    ) -> Result<SyncSummary, JobError> {
        let _permit = self.acquire(None).await?;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let job = self.sync_job(request, tx);

        self.limited(job, &mut rx, |status| {
            if let Some(events) = &events {
                if let Some(phase) = status.phase {
                    let _ = events.send(phase);
                }
            }
        })
        .await
    }

    /// Runs a health check in the caller's task.
    pub async fn run_health_check(&self) -> Result<HealthReport, JobError> {
        let _permit = self.acquire(None).await?;
        let (_tx, mut rx) = mpsc::unbounded_channel();
        let job = async { Ok(health_check(&self.inner.orchestrator).await) };
        self.limited(job, &mut rx, |_| {}).await
    }

    // ------------------------------------------------------------------------
    // Queued execution
    // ------------------------------------------------------------------------

    /// Queues a sync job and returns its id immediately.
    ///
    /// With `expires`, the job is dropped as [`JobError::Expired`] if it
    /// cannot start within that window.
    pub fn submit_sync(&self, request: SyncRequest, expires: Option<Duration>) -> TaskId {
        let id = self.register(JobKind::Sync);
        let runner = self.clone();

        tokio::spawn(async move {
            let outcome = async {
                let _permit = runner.acquire(expires).await?;
                runner.mark_progress(&id, RunPhase::Initializing.as_str());
                let (tx, mut rx) = mpsc::unbounded_channel();
                let job = runner.sync_job(request, tx);
                runner
                    .limited(job, &mut rx, |status| {
                        runner.mark_progress(&id, &status.label);
                    })
                    .await
            }
            .await;

            runner.finish(&id, outcome.map(TaskOutput::Sync));
        });

        info!(task_id = %id, ?request, "Sync job queued");
        id
    }

    /// Queues a health-check job and returns its id immediately.
    pub fn submit_health_check(&self, expires: Option<Duration>) -> TaskId {
        let id = self.register(JobKind::HealthCheck);
        let runner = self.clone();

        tokio::spawn(async move {
            let outcome = async {
                let _permit = runner.acquire(expires).await?;
                runner.mark_progress(&id, "checking");
                let (_tx, mut rx) = mpsc::unbounded_channel();
                let job = async { Ok(health_check(&runner.inner.orchestrator).await) };
                runner
                    .limited(job, &mut rx, |status| {
                        runner.mark_progress(&id, &status.label);
                    })
                    .await
            }
            .await;

            runner.finish(&id, outcome.map(TaskOutput::Health));
        });

        info!(task_id = %id, "Health check queued");
        id
    }

    // ------------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------------

    /// Current state of `id`. Unknown and expired ids report `Pending`.
    pub fn status(&self, id: &TaskId) -> TaskState {
        self.purge_expired();
        self.inner
            .tasks
            .get(id)
            .map(|record| record.state.clone())
            .unwrap_or(TaskState::Pending)
    }

    /// Kind of work behind `id`, if it is known
    pub fn kind(&self, id: &TaskId) -> Option<JobKind> {
        self.inner.tasks.get(id).map(|record| record.kind)
    }

    pub fn stats(&self) -> RunnerStats {
        let mut stats = RunnerStats {
            busy: self.inner.slot.available_permits() == 0,
            ..Default::default()
        };
        for record in self.inner.tasks.iter() {
            match record.state {
                TaskState::Pending => stats.pending += 1,
                TaskState::Progress { .. } => stats.running += 1,
                _ => stats.finished += 1,
            }
        }
        stats
    }

    /// Drops finished records older than the result TTL
    pub fn purge_expired(&self) {
        let ttl_secs = i64::try_from(self.inner.limits.result_ttl_secs).unwrap_or(i64::MAX);
        let now = Utc::now();
        self.inner.tasks.retain(|_, record| match record.finished_at {
            Some(finished_at) => now.signed_duration_since(finished_at).num_seconds() < ttl_secs,
            None => true,
        });
    }

    fn register(&self, kind: JobKind) -> TaskId {
        let id = TaskId::new();
        self.inner.tasks.insert(
            id,
            TaskRecord {
                kind,
                state: TaskState::Pending,
                finished_at: None,
            },
        );
        id
    }

    fn mark_progress(&self, id: &TaskId, status: &str) {
        if let Some(mut record) = self.inner.tasks.get_mut(id) {
            record.state = TaskState::Progress {
                status: status.to_string(),
            };
        }
    }

    fn finish(&self, id: &TaskId, outcome: Result<TaskOutput, JobError>) {
        let state = match outcome {
            Ok(result) => TaskState::Succeeded { result },
            Err(e) => {
                error!(task_id = %id, error = %e, "Job failed");
                TaskState::Failed {
                    error: e.to_string(),
                }
            }
        };
        if let Some(mut record) = self.inner.tasks.get_mut(id) {
            record.state = state;
            record.finished_at = Some(Utc::now());
        }
    }

    // ------------------------------------------------------------------------
    // Job bodies and limits
    // ------------------------------------------------------------------------

    /// Waits for the execution slot, giving up after `expires`
    async fn acquire(&self, expires: Option<Duration>) -> Result<SemaphorePermit<'_>, JobError> {
        let acquire = self.inner.slot.acquire();
        let permit = match expires {
            Some(window) => tokio::select! {
                permit = tokio::time::timeout(window, acquire) => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!(expires_secs = window.as_secs(), "Job expired before it could start");
                        return Err(JobError::Expired(window.as_secs()));
                    }
                },
                _ = self.inner.shutdown.cancelled() => return Err(JobError::Cancelled),
            },
            None => tokio::select! {
                permit = acquire => permit,
                _ = self.inner.shutdown.cancelled() => return Err(JobError::Cancelled),
            },
        };
        permit.map_err(|_| JobError::Cancelled)
    }

    /// The sync task body: setup, pre-flight check, orchestrated run
    fn sync_job(
        &self,
        request: SyncRequest,
        events: PhaseSender,
    ) -> impl Future<Output = Result<SyncSummary, JobError>> + '_ {
        async move {
            let orchestrator = &self.inner.orchestrator;
            info!(
                dry_run = ?request.dry_run,
                force_full = ?request.force_full,
                "Starting sync task"
            );

            let _ = events.send(RunPhase::Initializing);
            orchestrator.setup().await?;

            let _ = events.send(RunPhase::TestingConnections);
            let connections = orchestrator.connectivity().check().await;
            if !connections.all_reachable() {
                error!(%connections, "Connection test failed");
                return Err(JobError::Unreachable(connections));
            }

            let _ = events.send(RunPhase::Syncing);
            let result = orchestrator
                .run_with_events(request, Some(&events))
                .await?;

            if result.success() {
                info!("Sync completed successfully");
            } else {
                error!(errors = ?result.errors(), "Sync completed with errors");
            }

            Ok(result.to_summary())
        }
    }

    /// Drives `job` under the soft and hard time limits and shutdown,
    /// reporting phases and the soft-limit mark through `on_status`.
    async fn limited<T, F, S>(
        &self,
        job: F,
        phases: &mut mpsc::UnboundedReceiver<RunPhase>,
        mut on_status: S,
    ) -> Result<T, JobError>
    where
        F: Future<Output = Result<T, JobError>>,
        S: FnMut(StatusUpdate),
    {
        let limits = &self.inner.limits;
        let soft = tokio::time::sleep(Duration::from_secs(limits.soft_time_limit_secs));
        let hard = tokio::time::sleep(Duration::from_secs(limits.time_limit_secs));
        tokio::pin!(job, soft, hard);

        let mut soft_exceeded = false;
        let mut phases_open = true;

        loop {
            tokio::select! {
                biased;

                outcome = &mut job => {
                    // Phases sent right before completion are still queued
                    while let Ok(phase) = phases.try_recv() {
                        if !soft_exceeded {
                            on_status(StatusUpdate {
                                label: phase.as_str().to_string(),
                                phase: Some(phase),
                            });
                        }
                    }
                    return outcome;
                }

                _ = &mut hard => {
                    error!(limit_secs = limits.time_limit_secs, "Hard time limit exceeded, cancelling job");
                    return Err(JobError::TimedOut(limits.time_limit_secs));
                }

                _ = self.inner.shutdown.cancelled() => {
                    warn!("Shutdown requested, cancelling job");
                    return Err(JobError::Cancelled);
                }

                _ = &mut soft, if !soft_exceeded => {
                    soft_exceeded = true;
                    warn!(limit_secs = limits.soft_time_limit_secs, "Soft time limit exceeded");
                    on_status(StatusUpdate {
                        label: SOFT_LIMIT_STATUS.to_string(),
                        phase: None,
                    });
                }

                phase = phases.recv(), if phases_open => match phase {
                    Some(phase) if !soft_exceeded => on_status(StatusUpdate {
                        label: phase.as_str().to_string(),
                        phase: Some(phase),
                    }),
                    Some(_) => {}
                    None => phases_open = false,
                },
            }
        }
    }
}

/// Progress report from [`JobRunner::limited`]
struct StatusUpdate {
    label: String,
    phase: Option<RunPhase>,
}
