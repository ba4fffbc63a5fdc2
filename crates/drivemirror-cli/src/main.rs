//! DriveMirror CLI - Command-line interface for DriveMirror
//!
//! Provides commands for:
//! - Running a sync in the foreground
//! - Checking connectivity and health of both remotes
//! - Previewing the cron schedule
//! - Inspecting and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use drivemirror_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    check::CheckCommand, completions::CompletionsCommand, config::ConfigCommand,
    health::HealthCommand, schedule::ScheduleCommand, sync::SyncCommand, CommandContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "drivemirror",
    version,
    about = "Mirror a Google Drive folder into an S3 bucket"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one sync in the foreground
    Sync(SyncCommand),
    /// Test that both remotes are reachable
    Check(CheckCommand),
    /// Run a health check and report file counts
    Health(HealthCommand),
    /// Show upcoming scheduled runs
    Schedule(ScheduleCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

impl Cli {
    fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    fn context(&self) -> CommandContext {
        CommandContext {
            format: if self.json {
                OutputFormat::Json
            } else {
                OutputFormat::Human
            },
            config_path: self
                .config
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_path),
            quiet: self.quiet,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays parseable
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = cli.context();

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Check(cmd) => cmd.execute(&ctx).await,
        Commands::Health(cmd) => cmd.execute(&ctx).await,
        Commands::Schedule(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::Completions(cmd) => cmd.execute(&ctx).await,
    }
}
