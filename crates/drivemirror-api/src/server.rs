//! HTTP server for the status API
//!
//! Binds eagerly so callers learn about an unusable address at startup,
//! then serves HTTP/1 connections until the cancellation token fires.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use http_body_util::{BodyExt, Full, Limited};
use hyper::{
    body::{Bytes, Incoming},
    server::conn::http1,
    service::service_fn,
    Request, Response,
};
use hyper_util::rt::TokioIo;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{routes, routes::ApiState, ApiError};

/// Largest request body accepted
const MAX_BODY_BYTES: usize = 64 * 1024;

/// HTTP server for the status and trigger API.
pub struct ApiServer {
    state: Arc<ApiState>,
    listener: TcpListener,
}

impl ApiServer {
    /// Binds `endpoint`, e.g. `"127.0.0.1:8000"`.
    pub async fn bind(state: Arc<ApiState>, endpoint: &str) -> anyhow::Result<Self> {
        let addr: SocketAddr = endpoint.parse()?;
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { state, listener })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves connections until `shutdown` is cancelled.
    ///
    /// Should be spawned as a background task.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!(addr = %self.local_addr()?, "API server listening");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, _) = result?;
                    let io = TokioIo::new(stream);
                    let state = Arc::clone(&self.state);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { handle_request(req, &state).await }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!(error = %e, "API HTTP connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("API server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Collects the body and hands the request to the router.
async fn handle_request(
    req: Request<Incoming>,
    state: &ApiState,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let body = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let err = ApiError::BadRequest(e.to_string());
            let mut response = Response::new(Full::new(Bytes::from(
                json!({ "detail": err.to_string() }).to_string(),
            )));
            *response.status_mut() = err.status();
            return Ok(response);
        }
    };

    Ok(routes::route(&parts.method, parts.uri.path(), &body, state))
}
