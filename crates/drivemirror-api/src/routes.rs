//! Request routing
//!
//! [`route`] is a plain function of method, path and body so it can be
//! exercised without a socket; the server only collects the body and
//! forwards.

use std::sync::Arc;

use chrono::Utc;
use drivemirror_core::{
    config::Config,
    domain::{CronSchedule, DomainError},
};
use drivemirror_sync::{
    jobs::{JobRunner, TaskId, TaskOutput, TaskState},
    orchestrator::SyncRequest,
};
use http_body_util::Full;
use hyper::{
    body::Bytes,
    header::{HeaderValue, CONTENT_TYPE},
    Method, Response, StatusCode,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::ApiError;

const SERVICE_NAME: &str = "DriveMirror API";

/// Number of upcoming runs listed by `GET /schedule`
const NEXT_RUNS: usize = 5;

/// Shared state behind every request
pub struct ApiState {
    runner: JobRunner,
    config: Arc<Config>,
    schedule: CronSchedule,
}

impl ApiState {
    pub fn new(runner: JobRunner, config: Arc<Config>) -> Result<Self, DomainError> {
        let schedule = CronSchedule::parse(&config.sync.schedule)?;
        Ok(Self {
            runner,
            config,
            schedule,
        })
    }

    pub fn runner(&self) -> &JobRunner {
        &self.runner
    }
}

/// Routes one request and renders the response.
pub fn route(method: &Method, path: &str, body: &[u8], state: &ApiState) -> Response<Full<Bytes>> {
    debug!(%method, path, "API request");
    match dispatch(method, path, body, state) {
        Ok(value) => json_response(StatusCode::OK, &value),
        Err(e) => error_response(&e),
    }
}

fn error_response(e: &ApiError) -> Response<Full<Bytes>> {
    if let ApiError::Internal(reason) = e {
        error!(reason = %reason, "API request failed");
    }
    json_response(e.status(), &json!({ "detail": e.to_string() }))
}

fn dispatch(method: &Method, path: &str, body: &[u8], state: &ApiState) -> Result<Value, ApiError> {
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    match (method, path) {
        (&Method::GET, "/") => Ok(root(state)),
        (&Method::GET, "/health") => Ok(health(state)),
        (&Method::POST, "/sync") => trigger_sync(body, state),
        (&Method::POST, "/health-check") => Ok(trigger_health_check(state)),
        (&Method::GET, "/schedule") => Ok(schedule(state)),
        (&Method::GET, p) if p.starts_with("/task/") => task_status(&p["/task/".len()..], state),
        (_, "/" | "/health" | "/sync" | "/health-check" | "/schedule") => {
            Err(ApiError::MethodNotAllowed)
        }
        (_, p) if p.starts_with("/task/") => Err(ApiError::MethodNotAllowed),
        _ => Err(ApiError::NotFound),
    }
}

fn configuration(state: &ApiState) -> Value {
    json!({
        "source_folder": state.config.source.folder,
        "bucket": state.config.destination.bucket,
        "sync_schedule": state.schedule.expression(),
    })
}

fn root(state: &ApiState) -> Value {
    let mut value = json!({ "service": SERVICE_NAME });
    if let (Value::Object(map), Value::Object(config)) = (&mut value, configuration(state)) {
        map.extend(config);
    }
    value
}

fn health(state: &ApiState) -> Value {
    json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "runner_status": state.runner.stats(),
        "configuration": configuration(state),
    })
}

fn trigger_sync(body: &[u8], state: &ApiState) -> Result<Value, ApiError> {
    let request: SyncRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SyncRequest::default()
    } else {
        serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    let mode = state.runner.orchestrator().resolve_mode(&request);
    let id = state.runner.submit_sync(request, None);
    info!(task_id = %id, mode = %mode, "Sync triggered via API");

    Ok(json!({
        "task_id": id,
        "status": "queued",
        "message": format!("Sync queued in {mode} mode"),
    }))
}

fn trigger_health_check(state: &ApiState) -> Value {
    let id = state.runner.submit_health_check(None);
    info!(task_id = %id, "Health check triggered via API");
    json!({
        "task_id": id,
        "status": "queued",
        "message": "Health check queued",
    })
}

fn task_status(raw_id: &str, state: &ApiState) -> Result<Value, ApiError> {
    // Ids this runner never issued are reported as pending
    let task = raw_id
        .parse::<TaskId>()
        .map(|id| state.runner.status(&id))
        .unwrap_or(TaskState::Pending);

    let mut body = json!({ "task_id": raw_id, "status": task.label() });
    let detail = match task {
        TaskState::Pending => None,
        TaskState::Progress { status } => Some(("progress", json!({ "status": status }))),
        TaskState::Succeeded { result } => Some(("result", task_output(&result)?)),
        TaskState::Failed { error } => Some(("error", Value::String(error))),
    };
    if let (Some((key, value)), Value::Object(map)) = (detail, &mut body) {
        map.insert(key.to_string(), value);
    }
    Ok(body)
}

fn task_output(output: &TaskOutput) -> Result<Value, ApiError> {
    serde_json::to_value(output).map_err(|e| ApiError::Internal(e.to_string()))
}

fn schedule(state: &ApiState) -> Value {
    let next_runs = state.schedule.upcoming(Utc::now(), NEXT_RUNS);
    json!({
        "cron_expression": state.schedule.expression(),
        "timezone": "UTC",
        "next_runs": next_runs,
    })
}

fn json_response(status: StatusCode, value: &Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(value.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
