//! Mirroring tool port (driven/secondary port)
//!
//! This module defines the interface to the external remote-sync tool. The
//! production implementation shells out to rclone, but the orchestration
//! only ever sees these capabilities, so tests substitute deterministic
//! fixtures.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because failures at this boundary are
//!   adapter-specific (spawn errors, exit codes, parse errors).
//! - [`IMirrorTool::transfer`] is the only method that reports a non-zero
//!   exit as data instead of an error: a failed transfer is a normal,
//!   reportable outcome.

use crate::domain::{Remote, RemoteSize};

/// Captured result of a tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Process exit code; `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        let mut combined = String::with_capacity(self.stdout.len() + self.stderr.len());
        combined.push_str(&self.stdout);
        combined.push_str(&self.stderr);
        combined
    }
}

/// Port trait for the external mirroring tool
///
/// ## Implementation Notes
///
/// - `setup` must be idempotent; callers may invoke it before every run.
/// - Listing and probing methods return `Err` for any failure, including a
///   non-zero exit. Callers decide whether that is fatal.
/// - `transfer` receives the full argument list after the config flag and
///   returns `Err` only when the process could not be run at all.
#[async_trait::async_trait]
pub trait IMirrorTool: Send + Sync {
    /// Establishes the tool's connection profile (once per process)
    async fn setup(&self) -> anyhow::Result<()>;

    /// File count and total bytes under `remote`
    async fn probe_size(&self, remote: &Remote) -> anyhow::Result<RemoteSize>;

    /// Depth-limited listing, used to prove the remote is reachable
    async fn list_shallow(&self, remote: &Remote) -> anyhow::Result<()>;

    /// Names of the files directly under `remote` (no directories, no recursion)
    async fn list_files(&self, remote: &Remote) -> anyhow::Result<Vec<String>>;

    /// Runs one transfer invocation with the given arguments
    async fn transfer(&self, args: &[String]) -> anyhow::Result<ToolOutput>;

    /// Recursively deletes everything under `remote`
    async fn purge(&self, remote: &Remote) -> anyhow::Result<()>;
}
