//! DriveMirror API - HTTP status and trigger endpoints
//!
//! A small HTTP/1 server over the job runner:
//!
//! | Route                | Purpose                                  |
//! |----------------------|------------------------------------------|
//! | `GET /`              | Service identity and configured targets  |
//! | `GET /health`        | Liveness plus runner statistics          |
//! | `POST /sync`         | Queue a sync (`{dry_run?, force_full?}`) |
//! | `POST /health-check` | Queue a health check                     |
//! | `GET /task/{id}`     | Task status and result                   |
//! | `GET /schedule`      | Cron expression and upcoming runs        |
//!
//! ## Modules
//!
//! - [`routes`] - Request routing and JSON response bodies
//! - [`server`] - hyper accept loop with graceful shutdown

pub mod routes;
pub mod server;

use hyper::StatusCode;
use thiserror::Error;

pub use routes::ApiState;
pub use server::ApiServer;

/// Errors mapped to non-2xx responses
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not Found")]
    NotFound,

    #[error("Method Not Allowed")]
    MethodNotAllowed,

    /// The request body could not be read or parsed
    #[error("Invalid request body: {0}")]
    BadRequest(String),

    /// A response body could not be produced
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
