//! Pre-flight connectivity check
//!
//! Each remote is listed independently; a failure on the source never skips
//! the destination check, so the report always says which side is down.

use std::{fmt, sync::Arc};

use drivemirror_core::{domain::Remote, ports::IMirrorTool};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Reachability of both remotes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub source_reachable: bool,
    pub destination_reachable: bool,
}

impl ConnectivityReport {
    pub fn all_reachable(&self) -> bool {
        self.source_reachable && self.destination_reachable
    }
}

impl fmt::Display for ConnectivityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = |ok: bool| if ok { "reachable" } else { "unreachable" };
        write!(
            f,
            "source {}, destination {}",
            state(self.source_reachable),
            state(self.destination_reachable)
        )
    }
}

/// Shallow listing against source and destination
#[derive(Clone)]
pub struct ConnectivityCheck {
    tool: Arc<dyn IMirrorTool>,
    source: Remote,
    destination: Remote,
}

impl ConnectivityCheck {
    pub fn new(tool: Arc<dyn IMirrorTool>, source: Remote, destination: Remote) -> Self {
        Self {
            tool,
            source,
            destination,
        }
    }

    pub async fn check(&self) -> ConnectivityReport {
        let source_reachable = self.reachable(&self.source, "Source").await;
        let destination_reachable = self.reachable(&self.destination, "Destination").await;

        let report = ConnectivityReport {
            source_reachable,
            destination_reachable,
        };
        info!(
            source = report.source_reachable,
            destination = report.destination_reachable,
            "Connection test completed"
        );
        report
    }

    async fn reachable(&self, remote: &Remote, side: &str) -> bool {
        match self.tool.list_shallow(remote).await {
            Ok(()) => true,
            Err(e) => {
                error!(remote = %remote, error = %e, "{side} connection failed");
                false
            }
        }
    }
}
