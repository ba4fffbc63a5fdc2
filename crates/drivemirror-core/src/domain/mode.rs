//! Sync mode selection

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// How a single run moves data
///
/// Exactly one mode applies to a run. It is decided before any tool
/// invocation and never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Transfer only files newer than their destination counterpart
    Incremental,
    /// Purge the destination, then transfer everything
    ForceFull,
    /// Report what a transfer would do without moving data
    DryRun,
}

impl SyncMode {
    /// Resolves the mode from the two request flags.
    ///
    /// Dry-run takes precedence: a dry run never purges, so `force_full`
    /// is meaningless alongside it.
    pub fn resolve(dry_run: bool, force_full: bool) -> Self {
        if dry_run {
            SyncMode::DryRun
        } else if force_full {
            SyncMode::ForceFull
        } else {
            SyncMode::Incremental
        }
    }

    pub fn is_dry_run(self) -> bool {
        matches!(self, SyncMode::DryRun)
    }

    /// Whether the destination is purged before transferring
    pub fn purges_destination(self) -> bool {
        matches!(self, SyncMode::ForceFull)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncMode::Incremental => "incremental",
            SyncMode::ForceFull => "force_full",
            SyncMode::DryRun => "dry_run",
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incremental" => Ok(SyncMode::Incremental),
            "force_full" => Ok(SyncMode::ForceFull),
            "dry_run" => Ok(SyncMode::DryRun),
            other => Err(DomainError::InvalidMode(other.to_string())),
        }
    }
}
