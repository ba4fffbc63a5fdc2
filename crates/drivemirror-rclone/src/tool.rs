//! rclone subprocess adapter
//!
//! Every invocation has the shape `rclone --config=<path> <verb> <args...>`.
//! Output is captured in full; the child is killed if the awaiting future is
//! dropped, which is how a cancelled job stops a long transfer.

use std::{io, path::PathBuf, process::Stdio, sync::Arc};

use drivemirror_core::{
    config::Config,
    domain::{Remote, RemoteSize},
    ports::{IMirrorTool, ToolOutput},
};
use serde::Deserialize;
use tokio::{process::Command, sync::OnceCell};
use tracing::{debug, error, info, warn};

use crate::{profile, RcloneError};

/// [`IMirrorTool`] implementation backed by the rclone binary
pub struct RcloneTool {
    config: Arc<Config>,
    binary: PathBuf,
    config_path: PathBuf,
    profile: OnceCell<()>,
}

impl RcloneTool {
    pub fn new(config: Arc<Config>) -> Self {
        let binary = config.tool.binary.clone();
        let config_path = config.tool.config_path.clone();
        Self {
            config,
            binary,
            config_path,
            profile: OnceCell::new(),
        }
    }

    /// Whether the connection profile has been written by this instance
    pub fn is_configured(&self) -> bool {
        self.profile.initialized()
    }

    /// Runs rclone and captures its output. A non-zero exit is not an error.
    async fn run(&self, args: &[String]) -> Result<ToolOutput, RcloneError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(format!("--config={}", self.config_path.display()))
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(cmd = %args.join(" "), "Running rclone command");

        let output = cmd.output().await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => RcloneError::NotInstalled(self.binary.clone()),
            _ => RcloneError::Io(e),
        })?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Runs rclone and turns a non-zero exit into [`RcloneError::CommandFailed`]
    async fn run_checked(&self, args: Vec<String>) -> Result<ToolOutput, RcloneError> {
        let output = self.run(&args).await?;
        if output.success() {
            return Ok(output);
        }

        let verb = args.first().cloned().unwrap_or_default();
        let code = output.exit_code.unwrap_or(-1);
        error!(verb = %verb, returncode = code, "Rclone command failed");
        Err(RcloneError::CommandFailed {
            verb,
            code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}

/// Base arguments for a verb on a remote, with the shared-items flag when
/// the remote needs it.
fn remote_args(verb: &str, remote: &Remote, extra: &[&str]) -> Vec<String> {
    let mut args = vec![verb.to_string(), remote.to_string()];
    args.extend(extra.iter().map(|s| s.to_string()));
    if let Some(flag) = remote.scope_flag() {
        args.push(flag.to_string());
    }
    args
}

#[derive(Debug, Deserialize)]
struct SizeReport {
    #[serde(default)]
    count: i64,
    #[serde(default)]
    bytes: i64,
}

/// Parses `rclone size --json` output.
///
/// rclone reports `-1` bytes for objects of unknown size; negative values
/// are clamped to zero.
pub fn parse_size_output(stdout: &str) -> Result<RemoteSize, RcloneError> {
    let report: SizeReport = serde_json::from_str(stdout.trim())
        .map_err(|e| RcloneError::InvalidOutput(format!("size: {e}")))?;
    Ok(RemoteSize::new(
        report.count.max(0) as u64,
        report.bytes.max(0) as u64,
    ))
}

/// Parses `rclone lsf` output into file names, skipping directories.
pub fn parse_listing(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty() && !line.ends_with('/'))
        .map(str::to_string)
        .collect()
}

#[async_trait::async_trait]
impl IMirrorTool for RcloneTool {
    async fn setup(&self) -> anyhow::Result<()> {
        self.profile
            .get_or_try_init(|| async {
                info!("Setting up rclone configuration");
                profile::write_profile(&self.config).await
            })
            .await?;
        Ok(())
    }

    async fn probe_size(&self, remote: &Remote) -> anyhow::Result<RemoteSize> {
        let output = self
            .run_checked(remote_args("size", remote, &["--json"]))
            .await?;
        Ok(parse_size_output(&output.stdout)?)
    }

    async fn list_shallow(&self, remote: &Remote) -> anyhow::Result<()> {
        self.run_checked(remote_args("lsf", remote, &["--max-depth", "1"]))
            .await?;
        Ok(())
    }

    async fn list_files(&self, remote: &Remote) -> anyhow::Result<Vec<String>> {
        let output = self
            .run_checked(remote_args(
                "lsf",
                remote,
                &["--files-only", "--max-depth", "1"],
            ))
            .await?;
        Ok(parse_listing(&output.stdout))
    }

    async fn transfer(&self, args: &[String]) -> anyhow::Result<ToolOutput> {
        Ok(self.run(args).await?)
    }

    async fn purge(&self, remote: &Remote) -> anyhow::Result<()> {
        warn!(remote = %remote, "Purging destination");
        self.run_checked(remote_args("delete", remote, &["--rmdirs", "-v"]))
            .await?;
        Ok(())
    }
}
