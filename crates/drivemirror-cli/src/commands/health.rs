//! Health command - Connectivity plus file counts, as the daemon reports it

use anyhow::Result;
use clap::Args;
use drivemirror_sync::health::{HealthReport, HealthStatus};

use super::CommandContext;
use crate::output::{plural, OutputFormatter};

#[derive(Debug, Args)]
pub struct HealthCommand {}

impl HealthCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let runner = ctx.runner()?;

        let report = runner.run_health_check().await?;

        if ctx.is_json() {
            formatter.print_json(&serde_json::to_value(&report)?);
        } else {
            print_report(formatter.as_ref(), &report);
        }

        match report.status {
            HealthStatus::Healthy => Ok(()),
            HealthStatus::Unhealthy => anyhow::bail!("At least one remote is unreachable"),
            HealthStatus::Error => anyhow::bail!(
                "Health check could not run: {}",
                report.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

fn print_report(formatter: &dyn OutputFormatter, report: &HealthReport) {
    match report.status {
        HealthStatus::Healthy => formatter.success("Healthy"),
        HealthStatus::Unhealthy => formatter.error("Unhealthy"),
        HealthStatus::Error => {
            formatter.error(report.error.as_deref().unwrap_or("Health check failed"));
        }
    }

    for side in [&report.source, &report.destination].into_iter().flatten() {
        formatter.field(
            &side.remote,
            &format!("{} file{}", side.files, plural(side.files)),
        );
    }
    formatter.field("Checked at", &report.timestamp.to_rfc3339());
}
