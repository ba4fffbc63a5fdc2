//! CLI subcommands and the wiring they share

pub mod check;
pub mod completions;
pub mod config;
pub mod health;
pub mod schedule;
pub mod sync;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use drivemirror_core::config::Config;
use drivemirror_rclone::RcloneTool;
use drivemirror_sync::{jobs::JobRunner, orchestrator::SyncOrchestrator};
use tracing::info;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Global options resolved once in `main`
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub format: OutputFormat,
    pub config_path: PathBuf,
    pub quiet: bool,
}

impl CommandContext {
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.is_json())
    }

    /// Loads the config file (if present) plus environment overrides.
    pub fn load_config(&self) -> Result<Config> {
        let config = Config::resolve(&self.config_path)
            .with_context(|| format!("Failed to load {}", self.config_path.display()))?;
        info!(config_path = %self.config_path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Loads and validates configuration, then builds a job runner over rclone.
    pub fn runner(&self) -> Result<JobRunner> {
        let config = self.load_config()?;

        let errors = config.validate();
        if !errors.is_empty() {
            let formatter = self.formatter();
            for e in &errors {
                formatter.error(&e.to_string());
            }
            anyhow::bail!(
                "Invalid configuration in {}: {} error(s)",
                self.config_path.display(),
                errors.len()
            );
        }

        let config = Arc::new(config);
        let tool = Arc::new(RcloneTool::new(Arc::clone(&config)));
        let orchestrator = SyncOrchestrator::new(Arc::clone(&config), tool)
            .context("Failed to create sync orchestrator")?;
        Ok(JobRunner::new(Arc::new(orchestrator), config.jobs.clone()))
    }
}
