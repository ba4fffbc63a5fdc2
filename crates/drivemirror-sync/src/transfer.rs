//! Transfer executor
//!
//! Builds the argument list for one `sync` invocation and runs it. The exit
//! status of this step is the only tool outcome that decides whether a run
//! succeeded.

use std::sync::Arc;

use drivemirror_core::{
    config::TransferConfig,
    domain::{Remote, SyncMode},
    ports::IMirrorTool,
};
use tracing::{error, info};

/// Low-level (per-request) retries for transient network errors
pub const LOW_LEVEL_RETRIES: u32 = 15;
/// Streams used to download a single large file
pub const MULTI_THREAD_STREAMS: u32 = 4;
/// Parts uploaded concurrently for one multipart upload
pub const S3_UPLOAD_CONCURRENCY: u32 = 10;
/// Multipart chunk size
pub const S3_CHUNK_SIZE: &str = "25M";
/// Interval between progress stats lines
pub const STATS_INTERVAL: &str = "30s";

/// Builds the arguments for a sync from `source` to `destination`.
///
/// The list is a pure function of its inputs: the same mode, remotes and
/// tuning always produce the same arguments in the same order.
pub fn build_transfer_args(
    mode: SyncMode,
    source: &Remote,
    destination: &Remote,
    tuning: &TransferConfig,
) -> Vec<String> {
    let mut args = vec![
        "sync".to_string(),
        source.to_string(),
        destination.to_string(),
        "--update".to_string(),
        "--use-server-modtime".to_string(),
        format!("--transfers={}", tuning.transfers),
        format!("--checkers={}", tuning.checkers),
        format!("--retries={}", tuning.retries),
        format!("--low-level-retries={LOW_LEVEL_RETRIES}"),
        format!("--multi-thread-streams={MULTI_THREAD_STREAMS}"),
        format!("--s3-upload-concurrency={S3_UPLOAD_CONCURRENCY}"),
        format!("--s3-chunk-size={S3_CHUNK_SIZE}"),
        format!("--stats={STATS_INTERVAL}"),
        "-v".to_string(),
    ];

    if mode.is_dry_run() {
        args.push("--dry-run".to_string());
    }
    if let Some(flag) = source.scope_flag() {
        args.push(flag.to_string());
    }

    args
}

/// What happened when the transfer ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The tool ran to completion (with any exit status)
    Completed {
        exit_code: Option<i32>,
        combined_output: String,
    },
    /// The tool could not be started
    Failed { reason: String },
}

impl TransferOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(
            self,
            TransferOutcome::Completed {
                exit_code: Some(0),
                ..
            }
        )
    }

    /// Error string to record, if the transfer did not succeed
    pub fn error_message(&self) -> Option<String> {
        match self {
            TransferOutcome::Completed {
                exit_code: Some(0), ..
            } => None,
            TransferOutcome::Completed {
                exit_code: Some(code),
                ..
            } => Some(format!("Sync failed with exit code {code}")),
            TransferOutcome::Completed {
                exit_code: None, ..
            } => Some("Sync terminated by signal".to_string()),
            TransferOutcome::Failed { reason } => Some(format!("Sync exception: {reason}")),
        }
    }

    pub fn combined_output(&self) -> &str {
        match self {
            TransferOutcome::Completed {
                combined_output, ..
            } => combined_output,
            TransferOutcome::Failed { .. } => "",
        }
    }
}

/// Runs the single `sync` invocation of a run
#[derive(Clone)]
pub struct TransferExecutor {
    tool: Arc<dyn IMirrorTool>,
    source: Remote,
    destination: Remote,
    tuning: TransferConfig,
}

impl TransferExecutor {
    pub fn new(
        tool: Arc<dyn IMirrorTool>,
        source: Remote,
        destination: Remote,
        tuning: TransferConfig,
    ) -> Self {
        Self {
            tool,
            source,
            destination,
            tuning,
        }
    }

    pub fn arguments(&self, mode: SyncMode) -> Vec<String> {
        build_transfer_args(mode, &self.source, &self.destination, &self.tuning)
    }

    pub async fn execute(&self, mode: SyncMode) -> TransferOutcome {
        let args = self.arguments(mode);
        info!(
            mode = %mode,
            source = %self.source,
            destination = %self.destination,
            "Running sync"
        );

        match self.tool.transfer(&args).await {
            Ok(output) => TransferOutcome::Completed {
                exit_code: output.exit_code,
                combined_output: output.combined(),
            },
            Err(e) => {
                error!(error = %e, "Sync process could not be started");
                TransferOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
