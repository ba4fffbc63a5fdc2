//! Phase-transition events
//!
//! The orchestrator and job runner emit a [`RunPhase`] every time a run
//! moves to its next step. Consumers (the job runner's task registry, the
//! CLI) turn these into externally visible progress.

use serde::{Deserialize, Serialize};

/// One step of a sync job, in the order they occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Job accepted; connection profile being prepared
    Initializing,
    /// Pre-flight connectivity check against both remotes
    TestingConnections,
    /// Orchestrator handed control of the run
    Syncing,
    ProbingSource,
    Purging,
    Transferring,
    ProbingDestination,
    Verifying,
    Done,
}

impl RunPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Initializing => "initializing",
            RunPhase::TestingConnections => "testing_connections",
            RunPhase::Syncing => "syncing",
            RunPhase::ProbingSource => "probing_source",
            RunPhase::Purging => "purging",
            RunPhase::Transferring => "transferring",
            RunPhase::ProbingDestination => "probing_destination",
            RunPhase::Verifying => "verifying",
            RunPhase::Done => "done",
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
