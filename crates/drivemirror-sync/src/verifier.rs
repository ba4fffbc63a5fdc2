//! Critical-file verifier
//!
//! A transfer can exit 0 and still leave out files a downstream consumer
//! depends on. After every real transfer the destination root is listed once
//! and each configured filename is checked for presence.

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use drivemirror_core::{domain::Remote, ports::IMirrorTool};
use tracing::{debug, error};

#[derive(Clone)]
pub struct CriticalFileVerifier {
    tool: Arc<dyn IMirrorTool>,
    destination: Remote,
}

impl CriticalFileVerifier {
    pub fn new(tool: Arc<dyn IMirrorTool>, destination: Remote) -> Self {
        Self { tool, destination }
    }

    /// Maps every name in `critical` to whether it exists at the destination.
    ///
    /// A failed listing maps every name to `false`.
    pub async fn verify(&self, critical: &[String]) -> BTreeMap<String, bool> {
        if critical.is_empty() {
            debug!("No critical files configured");
            return BTreeMap::new();
        }

        let present: HashSet<String> = match self.tool.list_files(&self.destination).await {
            Ok(names) => names.into_iter().collect(),
            Err(e) => {
                error!(
                    destination = %self.destination,
                    error = %e,
                    "Failed to list destination for verification"
                );
                HashSet::new()
            }
        };

        critical
            .iter()
            .map(|name| (name.clone(), present.contains(name)))
            .collect()
    }
}

/// Names that failed verification, in sorted order
pub fn missing_files(verified: &BTreeMap<String, bool>) -> Vec<&str> {
    verified
        .iter()
        .filter(|(_, ok)| !**ok)
        .map(|(name, _)| name.as_str())
        .collect()
}
