//! Schedule command - Preview upcoming sync and health-check runs

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use drivemirror_core::domain::CronSchedule;

use super::CommandContext;

#[derive(Debug, Args)]
pub struct ScheduleCommand {
    /// Number of upcoming runs to list
    #[arg(short = 'n', long, default_value_t = 5)]
    pub count: usize,
}

impl ScheduleCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;

        let sync = CronSchedule::parse(&config.sync.schedule).context("Invalid sync.schedule")?;
        let health = CronSchedule::parse(&config.jobs.health_check_schedule)
            .context("Invalid jobs.health_check_schedule")?;

        let now = Utc::now();
        let sync_runs = sync.upcoming(now, self.count);
        let health_runs = health.upcoming(now, self.count);

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "timezone": "UTC",
                "sync": {
                    "schedule": sync.expression(),
                    "next_runs": sync_runs,
                },
                "health_check": {
                    "schedule": health.expression(),
                    "next_runs": health_runs,
                },
            }));
            return Ok(());
        }

        formatter.success(&format!("Sync schedule: {sync} (UTC)"));
        for at in &sync_runs {
            formatter.info(&at.format("%a %Y-%m-%d %H:%M").to_string());
        }
        if sync_runs.is_empty() {
            formatter.warn("Sync schedule never fires");
        }

        formatter.info("");
        formatter.success(&format!("Health check schedule: {health} (UTC)"));
        for at in &health_runs {
            formatter.info(&at.format("%a %Y-%m-%d %H:%M").to_string());
        }
        Ok(())
    }
}
