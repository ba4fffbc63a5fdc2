//! DriveMirror Sync - Sync orchestration engine
//!
//! Provides:
//! - A linear sync state machine wrapping an external mirroring tool
//! - Pre-flight connectivity checks and post-sync verification
//! - A single-slot job runner with time limits and a task registry
//! - A cron-driven scheduler for periodic syncs and health checks
//!
//! ## Modules
//!
//! - [`probe`] - File count / byte size probing that never fails
//! - [`connectivity`] - Independent reachability checks for both remotes
//! - [`transfer`] - Transfer argument construction and execution
//! - [`verifier`] - Critical-file presence check on the destination
//! - [`orchestrator`] - The per-run state machine producing a `SyncResult`
//! - [`jobs`] - Job runner, task registry, time limits
//! - [`health`] - Health report for the status API and scheduler
//! - [`scheduler`] - Cron loop submitting jobs until cancelled

pub mod connectivity;
pub mod health;
pub mod jobs;
pub mod orchestrator;
pub mod probe;
pub mod scheduler;
pub mod transfer;
pub mod verifier;

use thiserror::Error;

use crate::connectivity::ConnectivityReport;

/// Errors that abort a sync run before a `SyncResult` exists
#[derive(Debug, Error)]
pub enum SyncError {
    /// The tool's connection profile could not be established
    #[error("Tool setup failed: {0}")]
    Setup(String),

    /// A domain-level error propagated from drivemirror-core
    #[error("Domain error: {0}")]
    DomainError(#[from] drivemirror_core::domain::DomainError),
}

/// Errors that make a job fail without producing a result
#[derive(Debug, Error)]
pub enum JobError {
    /// Pre-flight connectivity check failed for at least one remote
    #[error("Connection test failed: {0}")]
    Unreachable(ConnectivityReport),

    /// The job ran past its hard time limit and was cancelled
    #[error("Job exceeded hard time limit of {0}s")]
    TimedOut(u64),

    /// The job waited in the queue longer than its expiry window
    #[error("Job expired after waiting {0}s to start")]
    Expired(u64),

    /// The runner is shutting down
    #[error("Job cancelled")]
    Cancelled,

    /// The sync could not be executed
    #[error(transparent)]
    Sync(#[from] SyncError),
}
