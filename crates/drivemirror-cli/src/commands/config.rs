//! Config command - View and validate DriveMirror configuration
//!
//! Provides the `drivemirror config` CLI command which:
//! 1. Shows the effective configuration (file plus environment) with
//!    secrets masked
//! 2. Validates it and reports every problem
//! 3. Prints the path of the file in use

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use drivemirror_core::config::Config;
use tracing::info;

use super::CommandContext;
use crate::output::plural;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration with secrets masked
    Show,
    /// Validate the effective configuration
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Validate => self.execute_validate(ctx),
            ConfigCommand::Path => self.execute_path(ctx),
        }
    }

    fn execute_show(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?.redacted();

        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if ctx.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", source_label(&ctx.config_path)));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    fn execute_validate(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let errors = validation_messages(&ctx.config_path)?;

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": ctx.config_path.display().to_string(),
                "errors": errors,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", source_label(&ctx.config_path)));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                plural(errors.len() as u64)
            ));
            formatter.info(&format!("File: {}", source_label(&ctx.config_path)));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {error}"));
            }
        }

        if !errors.is_empty() {
            anyhow::bail!("Configuration is invalid");
        }
        Ok(())
    }

    fn execute_path(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "config_path": ctx.config_path.display().to_string(),
                "exists": ctx.config_path.exists(),
            }));
        } else {
            println!("{}", ctx.config_path.display());
        }
        Ok(())
    }
}

/// File path, noting when only defaults and environment are in effect
fn source_label(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} not found, using defaults and environment", path.display())
    }
}

/// Resolves the configuration at `path` and lists every validation problem.
///
/// A file that exists but cannot be parsed is an error, not an empty list.
fn validation_messages(path: &Path) -> Result<Vec<String>> {
    let config = Config::resolve(path)
        .with_context(|| format!("Failed to parse configuration at {}", path.display()))?;
    Ok(config.validate().iter().map(|e| e.to_string()).collect())
}
