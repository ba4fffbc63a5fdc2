//! Sync command - Run one mirror pass in the foreground
//!
//! Goes through the same job runner as the daemon, so connectivity is
//! tested first and the hard time limit applies. Exits non-zero when the
//! run fails or reports failure.

use anyhow::Result;
use clap::Args;
use drivemirror_core::domain::SyncSummary;
use drivemirror_sync::orchestrator::SyncRequest;
use tokio::sync::mpsc;

use super::CommandContext;
use crate::output::{plural, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Purge the destination and copy everything again
    #[arg(long)]
    pub full: bool,

    /// Show what would be transferred without changing the destination
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncCommand {
    /// Flags left off fall back to the configured defaults
    fn request(&self) -> SyncRequest {
        SyncRequest {
            dry_run: self.dry_run.then_some(true),
            force_full: self.full.then_some(true),
        }
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let runner = ctx.runner()?;

        let request = self.request();
        let mode = runner.orchestrator().resolve_mode(&request);
        let show_progress = !ctx.quiet && !ctx.is_json();

        if show_progress {
            formatter.info(&format!(
                "Syncing {} -> {} ({} mode)",
                runner.orchestrator().source(),
                runner.orchestrator().destination(),
                mode
            ));
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let progress = async {
            while let Some(phase) = rx.recv().await {
                if show_progress {
                    formatter.info(&format!("... {phase}"));
                }
            }
        };

        let (result, ()) = tokio::join!(runner.run_sync(request, Some(tx)), progress);
        let summary = result?;

        if ctx.is_json() {
            formatter.print_json(&serde_json::to_value(&summary)?);
        } else {
            print_summary(formatter.as_ref(), &summary);
        }

        if !summary.success {
            anyhow::bail!(
                "Sync reported failure with {} error{}",
                summary.errors.len(),
                plural(summary.errors.len() as u64)
            );
        }
        Ok(())
    }
}

fn print_summary(formatter: &dyn OutputFormatter, summary: &SyncSummary) {
    if summary.success {
        formatter.success(&format!(
            "Sync completed in {:.1}s",
            summary.duration_seconds
        ));
    } else {
        formatter.error(&format!(
            "Sync finished with errors after {:.1}s",
            summary.duration_seconds
        ));
    }

    formatter.field("Mode", summary.mode.as_str());
    formatter.field(
        "Source",
        &format!(
            "{} file{}, {:.2} MB",
            summary.source_files,
            plural(summary.source_files),
            summary.source_size_mb
        ),
    );
    formatter.field(
        "Destination",
        &format!(
            "{} file{}, {:.2} MB",
            summary.destination_files,
            plural(summary.destination_files),
            summary.destination_size_mb
        ),
    );

    for (name, present) in &summary.verified_files {
        let mark = if *present { "present" } else { "MISSING" };
        formatter.field(name, mark);
    }

    for err in &summary.errors {
        formatter.warn(err);
    }
}
