//! DriveMirror Core - Domain types and configuration
//!
//! This crate contains the pieces every other DriveMirror crate depends on:
//! - **Domain entities** - `SyncMode`, `SyncResult`, `SyncSummary`, `RunPhase`, `Remote`
//! - **Scheduling** - `CronSchedule`, a 5-field cron expression evaluator
//! - **Port definitions** - `IMirrorTool`, the capability interface over the
//!   external mirroring tool
//! - **Configuration** - typed YAML configuration with validation
//!
//! # Architecture
//!
//! The domain module is pure data and logic with no I/O. The port trait is
//! implemented by the rclone adapter crate and by test doubles, so the sync
//! orchestration can be exercised without a network or a real binary.

pub mod config;
pub mod domain;
pub mod ports;
