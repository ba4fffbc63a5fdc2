//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! such as malformed schedules and invalid remote identifiers.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Cron expression could not be parsed
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCron {
        /// The offending expression
        expression: String,
        /// What was wrong with it
        reason: String,
    },

    /// Remote identifier is empty or malformed
    #[error("Invalid remote: {0}")]
    InvalidRemote(String),

    /// Unknown sync mode name
    #[error("Invalid sync mode: {0}")]
    InvalidMode(String),
}

impl DomainError {
    pub(crate) fn cron(expression: &str, reason: impl Into<String>) -> Self {
        DomainError::InvalidCron {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}
