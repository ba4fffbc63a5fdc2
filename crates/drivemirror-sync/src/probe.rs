//! Remote probe
//!
//! Size probes are informational: they feed the file and byte counts of a
//! `SyncResult` but never decide its outcome, so a failed probe degrades to
//! zero instead of propagating.

use std::sync::Arc;

use drivemirror_core::{
    domain::{Remote, RemoteSize},
    ports::IMirrorTool,
};
use tracing::{debug, warn};

/// Queries file count and byte size of a remote
#[derive(Clone)]
pub struct RemoteProbe {
    tool: Arc<dyn IMirrorTool>,
}

impl RemoteProbe {
    pub fn new(tool: Arc<dyn IMirrorTool>) -> Self {
        Self { tool }
    }

    /// Returns the size of `remote`, or [`RemoteSize::zero`] on any failure.
    pub async fn probe(&self, remote: &Remote) -> RemoteSize {
        match self.tool.probe_size(remote).await {
            Ok(size) => {
                debug!(
                    remote = %remote,
                    files = size.count,
                    bytes = size.bytes,
                    "Probed remote size"
                );
                size
            }
            Err(e) => {
                warn!(remote = %remote, error = %e, "Failed to get remote size");
                RemoteSize::zero()
            }
        }
    }
}
