//! Remote locations addressed by the mirroring tool

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Tool flag that widens a drive listing to items shared with the service
/// account
pub const SHARED_WITH_ME_FLAG: &str = "--drive-shared-with-me";

/// A named storage location, e.g. `gdrive:Reports/` or `s3:my-bucket`
///
/// `name` is the section of the tool's connection profile; `path` is the
/// folder or bucket inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    name: String,
    path: String,
    /// Listing needs elevated scope (items shared with, not owned by, the
    /// service principal)
    shared_scope: bool,
}

impl Remote {
    /// Creates a remote, rejecting empty names and names containing `:`
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.is_empty() || name.contains(':') {
            return Err(DomainError::InvalidRemote(name));
        }
        Ok(Self {
            name,
            path: path.into(),
            shared_scope: false,
        })
    }

    pub fn with_shared_scope(mut self, shared: bool) -> Self {
        self.shared_scope = shared;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn requires_shared_scope(&self) -> bool {
        self.shared_scope
    }

    /// The flag every tool invocation touching this remote must carry
    pub fn scope_flag(&self) -> Option<&'static str> {
        self.shared_scope.then_some(SHARED_WITH_ME_FLAG)
    }
}

impl std::fmt::Display for Remote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.path)
    }
}

/// File count and total byte size reported for a remote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSize {
    pub count: u64,
    pub bytes: u64,
}

impl RemoteSize {
    pub fn new(count: u64, bytes: u64) -> Self {
        Self { count, bytes }
    }

    /// The degraded value used when a probe fails
    pub fn zero() -> Self {
        Self::default()
    }
}
