//! Health check
//!
//! A lightweight probe of both remotes used by the periodic health job and
//! the status API. It never transfers anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{connectivity::ConnectivityReport, orchestrator::SyncOrchestrator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Both remotes reachable
    Healthy,
    /// At least one remote unreachable
    Unhealthy,
    /// The check itself could not run
    Error,
}

/// File count observed on one remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteHealth {
    pub remote: String,
    pub files: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<ConnectivityReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<RemoteHealth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<RemoteHealth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    fn failed(error: String) -> Self {
        Self {
            status: HealthStatus::Error,
            timestamp: Utc::now(),
            connections: None,
            source: None,
            destination: None,
            error: Some(error),
        }
    }
}

/// Sets up the tool, checks connectivity and counts files on both sides.
pub async fn health_check(orchestrator: &SyncOrchestrator) -> HealthReport {
    if let Err(e) = orchestrator.setup().await {
        error!(error = %e, "Health check failed");
        return HealthReport::failed(e.to_string());
    }

    let connections = orchestrator.connectivity().check().await;
    let source = orchestrator.probe().probe(orchestrator.source()).await;
    let destination = orchestrator.probe().probe(orchestrator.destination()).await;

    let status = if connections.all_reachable() {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    };
    info!(status = ?status, "Health check completed");

    HealthReport {
        status,
        timestamp: Utc::now(),
        connections: Some(connections),
        source: Some(RemoteHealth {
            remote: orchestrator.source().to_string(),
            files: source.count,
        }),
        destination: Some(RemoteHealth {
            remote: orchestrator.destination().to_string(),
            files: destination.count,
        }),
        error: None,
    }
}
