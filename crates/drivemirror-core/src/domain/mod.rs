//! Domain entities and business logic
//!
//! This module contains the core domain types for DriveMirror:
//! - Sync modes and the per-run result record
//! - Remote locations addressed by the mirroring tool
//! - Phase-transition events emitted during a run
//! - Cron schedules for periodic runs
//! - Domain-specific error types

pub mod errors;
pub mod mode;
pub mod phase;
pub mod remote;
pub mod result;
pub mod schedule;

// Re-export commonly used types
pub use errors::DomainError;
pub use mode::SyncMode;
pub use phase::RunPhase;
pub use remote::{Remote, RemoteSize, SHARED_WITH_ME_FLAG};
pub use result::{SyncResult, SyncRun, SyncSummary};
pub use schedule::CronSchedule;
