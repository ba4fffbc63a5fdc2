//! Check command - Connectivity test against both remotes
//!
//! Prepares the rclone profile, then lists each remote shallowly. Nothing is
//! transferred.

use anyhow::Result;
use clap::Args;

use super::CommandContext;

#[derive(Debug, Args)]
pub struct CheckCommand {}

impl CheckCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let runner = ctx.runner()?;
        let orchestrator = runner.orchestrator();

        orchestrator.setup().await?;
        let report = orchestrator.connectivity().check().await;

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "source": orchestrator.source().to_string(),
                "destination": orchestrator.destination().to_string(),
                "source_reachable": report.source_reachable,
                "destination_reachable": report.destination_reachable,
            }));
        } else {
            let state = |ok: bool| if ok { "reachable" } else { "UNREACHABLE" };
            formatter.field(
                &orchestrator.source().to_string(),
                state(report.source_reachable),
            );
            formatter.field(
                &orchestrator.destination().to_string(),
                state(report.destination_reachable),
            );
            if report.all_reachable() {
                formatter.success("Both remotes are reachable");
            }
        }

        if !report.all_reachable() {
            anyhow::bail!("Connection test failed: {report}");
        }
        Ok(())
    }
}
