//! Sync orchestrator
//!
//! One [`SyncOrchestrator::run`] call is one linear pass through
//!
//! ```text
//! INIT → PROBING_SOURCE → (PURGING)? → TRANSFERRING → PROBING_DESTINATION → (VERIFYING)? → DONE
//! ```
//!
//! ## Failure policy
//!
//! Every step after setup is allowed to fail without aborting the run: probes
//! degrade to zero, a failed purge or transfer is appended to the result's
//! errors. Only a setup failure escapes as [`SyncError`], in which case no
//! `SyncResult` exists. Connectivity is checked by the caller before entering
//! the state machine.

use std::sync::Arc;

use drivemirror_core::{
    config::Config,
    domain::{Remote, RunPhase, SyncMode, SyncResult, SyncRun},
    ports::IMirrorTool,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::{
    connectivity::ConnectivityCheck,
    probe::RemoteProbe,
    transfer::TransferExecutor,
    verifier::{missing_files, CriticalFileVerifier},
    SyncError,
};

/// Run parameters; unset flags fall back to configuration defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub dry_run: Option<bool>,
    #[serde(default)]
    pub force_full: Option<bool>,
}

impl SyncRequest {
    pub fn new(dry_run: bool, force_full: bool) -> Self {
        Self {
            dry_run: Some(dry_run),
            force_full: Some(force_full),
        }
    }
}

/// Sender half for phase-transition events
pub type PhaseSender = mpsc::UnboundedSender<RunPhase>;

/// Composes probe, purge, transfer and verification into one run
pub struct SyncOrchestrator {
    config: Arc<Config>,
    tool: Arc<dyn IMirrorTool>,
    source: Remote,
    destination: Remote,
    probe: RemoteProbe,
    transfer: TransferExecutor,
    verifier: CriticalFileVerifier,
}

impl SyncOrchestrator {
    /// Creates an orchestrator over `tool`.
    ///
    /// Fails when the configured remotes are malformed.
    pub fn new(config: Arc<Config>, tool: Arc<dyn IMirrorTool>) -> Result<Self, SyncError> {
        let source = config.source_remote()?;
        let destination = config.destination_remote()?;

        Ok(Self {
            probe: RemoteProbe::new(Arc::clone(&tool)),
            transfer: TransferExecutor::new(
                Arc::clone(&tool),
                source.clone(),
                destination.clone(),
                config.transfer.clone(),
            ),
            verifier: CriticalFileVerifier::new(Arc::clone(&tool), destination.clone()),
            config,
            tool,
            source,
            destination,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source(&self) -> &Remote {
        &self.source
    }

    pub fn destination(&self) -> &Remote {
        &self.destination
    }

    pub fn probe(&self) -> &RemoteProbe {
        &self.probe
    }

    /// Connectivity check over the same tool and remotes
    pub fn connectivity(&self) -> ConnectivityCheck {
        ConnectivityCheck::new(
            Arc::clone(&self.tool),
            self.source.clone(),
            self.destination.clone(),
        )
    }

    /// Establishes the tool's connection profile (idempotent)
    pub async fn setup(&self) -> Result<(), SyncError> {
        self.tool
            .setup()
            .await
            .map_err(|e| SyncError::Setup(format!("{e:#}")))
    }

    /// Effective mode for `request`; dry-run wins over force-full
    pub fn resolve_mode(&self, request: &SyncRequest) -> SyncMode {
        SyncMode::resolve(
            request.dry_run.unwrap_or(self.config.sync.dry_run),
            request.force_full.unwrap_or(self.config.sync.force_full),
        )
    }

    pub async fn run(&self, request: SyncRequest) -> Result<SyncResult, SyncError> {
        self.run_with_events(request, None).await
    }

    /// Runs one sync, emitting each phase on `events` when given.
    #[tracing::instrument(skip(self, events))]
    pub async fn run_with_events(
        &self,
        request: SyncRequest,
        events: Option<&PhaseSender>,
    ) -> Result<SyncResult, SyncError> {
        let emit = |phase: RunPhase| {
            if let Some(tx) = events {
                // A dropped receiver only means nobody is watching
                let _ = tx.send(phase);
            }
        };

        // INIT
        let mode = self.resolve_mode(&request);
        let mut run = SyncRun::start(mode);
        info!(mode = %mode, "Starting sync");
        self.setup().await?;

        // PROBING_SOURCE
        emit(RunPhase::ProbingSource);
        run.record_source(self.probe.probe(&self.source).await);

        // PURGING
        if mode.purges_destination() {
            emit(RunPhase::Purging);
            warn!(destination = %self.destination, "Purging destination before full sync");
            if let Err(e) = self.tool.purge(&self.destination).await {
                // The transfer still runs against whatever the bucket holds
                error!(error = %e, "Purge failed");
                run.push_error(format!("Purge failed: {e}"));
            }
        }

        // TRANSFERRING
        emit(RunPhase::Transferring);
        let outcome = self.transfer.execute(mode).await;
        if let Some(message) = outcome.error_message() {
            error!(%message);
            run.push_error(message);
        }
        run.record_transfer(outcome.succeeded(), outcome.combined_output().to_string());

        // PROBING_DESTINATION
        emit(RunPhase::ProbingDestination);
        run.record_destination(self.probe.probe(&self.destination).await);

        // VERIFYING
        if !mode.is_dry_run() && run.transfer_succeeded() {
            emit(RunPhase::Verifying);
            let verified = self.verifier.verify(&self.config.sync.critical_files).await;
            let missing = missing_files(&verified);
            if !missing.is_empty() {
                let message = format!(
                    "Critical files missing from destination: {}",
                    missing.join(", ")
                );
                error!(%message);
                run.push_error(message);
            }
            run.record_verification(verified);
        }

        // DONE
        emit(RunPhase::Done);
        let result = run.finish();

        if result.success() {
            info!(
                mode = %mode,
                duration = result.duration_seconds(),
                source_files = result.source_files(),
                destination_files = result.destination_files(),
                "Sync completed successfully"
            );
        } else {
            warn!(
                mode = %mode,
                errors = ?result.errors(),
                "Sync completed with errors"
            );
        }

        Ok(result)
    }
}
