//! DriveMirror rclone - Mirroring tool adapter
//!
//! Provides:
//! - [`RcloneTool`], the `IMirrorTool` implementation that shells out to rclone
//! - Connection profile generation from service-account and S3 credentials
//! - Parsers for `rclone size --json` and `rclone lsf` output
//!
//! ## Modules
//!
//! - [`profile`] - Writes `rclone.conf` and the decoded service account key
//! - [`tool`] - Subprocess execution and output parsing

pub mod profile;
pub mod tool;

use std::path::PathBuf;

use thiserror::Error;

pub use tool::RcloneTool;

/// Errors raised by the rclone adapter
#[derive(Debug, Error)]
pub enum RcloneError {
    /// The rclone executable could not be started
    #[error("rclone binary not found: {0}")]
    NotInstalled(PathBuf),

    /// rclone ran but exited unsuccessfully
    #[error("rclone {verb} failed with exit code {code}: {stderr}")]
    CommandFailed {
        /// The rclone subcommand, e.g. `size`
        verb: String,
        /// Exit code, or `-1` when terminated by a signal
        code: i32,
        /// Trimmed standard error
        stderr: String,
    },

    /// rclone output did not have the expected shape
    #[error("Unexpected rclone output: {0}")]
    InvalidOutput(String),

    /// A credential required to build the connection profile is missing
    #[error("{0} not configured")]
    MissingCredentials(&'static str),

    /// The service account key is neither base64 nor raw JSON
    #[error("Invalid service account JSON: {0}")]
    InvalidServiceAccount(String),

    /// Writing the profile or spawning the process failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
