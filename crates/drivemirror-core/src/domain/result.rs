//! Per-run result record
//!
//! A [`SyncRun`] accumulates observations while a run is in flight and is
//! consumed by [`SyncRun::finish`] into an immutable [`SyncResult`]. The
//! overall verdict is computed in one place, at finish time, so the success
//! rule cannot be bypassed by a caller setting a flag.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{mode::SyncMode, remote::RemoteSize};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// In-flight record of a single sync run
#[derive(Debug, Clone)]
pub struct SyncRun {
    mode: SyncMode,
    started_at: DateTime<Utc>,
    source: RemoteSize,
    destination: RemoteSize,
    errors: Vec<String>,
    verified_files: BTreeMap<String, bool>,
    log_output: String,
    transfer_succeeded: bool,
}

impl SyncRun {
    /// Starts a run now
    pub fn start(mode: SyncMode) -> Self {
        Self::start_at(mode, Utc::now())
    }

    /// Starts a run with an explicit start time
    pub fn start_at(mode: SyncMode, started_at: DateTime<Utc>) -> Self {
        Self {
            mode,
            started_at,
            source: RemoteSize::zero(),
            destination: RemoteSize::zero(),
            errors: Vec::new(),
            verified_files: BTreeMap::new(),
            log_output: String::new(),
            transfer_succeeded: false,
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn record_source(&mut self, size: RemoteSize) {
        self.source = size;
    }

    pub fn record_destination(&mut self, size: RemoteSize) {
        self.destination = size;
    }

    /// Appends an error; errors are never removed or reordered
    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn record_transfer(&mut self, succeeded: bool, log_output: String) {
        self.transfer_succeeded = succeeded;
        self.log_output = log_output;
    }

    pub fn transfer_succeeded(&self) -> bool {
        self.transfer_succeeded
    }

    /// Records the critical-file check. Ignored for dry runs, whose
    /// verification map always stays empty.
    pub fn record_verification(&mut self, verified: BTreeMap<String, bool>) {
        if self.mode.is_dry_run() {
            return;
        }
        self.verified_files = verified;
    }

    /// Finishes the run now
    pub fn finish(self) -> SyncResult {
        self.finish_at(Utc::now())
    }

    /// Finishes the run at `finished_at`.
    ///
    /// A finish time earlier than the start (wall clock stepped backwards)
    /// is clamped to the start time.
    pub fn finish_at(self, finished_at: DateTime<Utc>) -> SyncResult {
        let finished_at = finished_at.max(self.started_at);
        let verified = self.mode.is_dry_run() || self.verified_files.values().all(|ok| *ok);

        SyncResult {
            success: self.transfer_succeeded && verified,
            started_at: self.started_at,
            finished_at,
            mode: self.mode,
            source_files: self.source.count,
            source_size_bytes: self.source.bytes,
            destination_files: self.destination.count,
            destination_size_bytes: self.destination.bytes,
            errors: self.errors,
            verified_files: self.verified_files,
            log_output: self.log_output,
        }
    }
}

/// Immutable outcome of one sync run
#[derive(Debug, Clone, PartialEq)]
pub struct SyncResult {
    success: bool,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    mode: SyncMode,
    source_files: u64,
    source_size_bytes: u64,
    destination_files: u64,
    destination_size_bytes: u64,
    errors: Vec<String>,
    verified_files: BTreeMap<String, bool>,
    log_output: String,
}

impl SyncResult {
    pub fn success(&self) -> bool {
        self.success
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn source_files(&self) -> u64 {
        self.source_files
    }

    pub fn source_size_bytes(&self) -> u64 {
        self.source_size_bytes
    }

    pub fn destination_files(&self) -> u64 {
        self.destination_files
    }

    pub fn destination_size_bytes(&self) -> u64 {
        self.destination_size_bytes
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn verified_files(&self) -> &BTreeMap<String, bool> {
        &self.verified_files
    }

    /// Raw combined output of the transfer step
    pub fn log_output(&self) -> &str {
        &self.log_output
    }

    /// Wall-clock duration in seconds, never negative
    pub fn duration_seconds(&self) -> f64 {
        let millis = (self.finished_at - self.started_at).num_milliseconds().max(0);
        millis as f64 / 1000.0
    }

    /// Serializable summary used as a task result and API response body
    pub fn to_summary(&self) -> SyncSummary {
        SyncSummary {
            success: self.success,
            started_at: self.started_at,
            finished_at: self.finished_at,
            duration_seconds: self.duration_seconds(),
            mode: self.mode,
            source_files: self.source_files,
            source_size_mb: bytes_to_mb(self.source_size_bytes),
            destination_files: self.destination_files,
            destination_size_mb: bytes_to_mb(self.destination_size_bytes),
            errors: self.errors.clone(),
            verified_files: self.verified_files.clone(),
        }
    }
}

/// Response-body view of a [`SyncResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub mode: SyncMode,
    pub source_files: u64,
    pub source_size_mb: f64,
    pub destination_files: u64,
    pub destination_size_mb: f64,
    pub errors: Vec<String>,
    pub verified_files: BTreeMap<String, bool>,
}

/// Bytes to MiB, rounded to two decimals
fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
}
