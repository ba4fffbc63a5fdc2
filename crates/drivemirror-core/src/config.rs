//! Configuration module for DriveMirror.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, environment overrides for secrets, validation, defaults, and a
//! builder pattern for programmatic use.

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::domain::{CronSchedule, DomainError, Remote};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for DriveMirror.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub sync: SyncConfig,
    pub transfer: TransferConfig,
    pub tool: ToolConfig,
    pub jobs: JobsConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

/// The cloud-drive folder being mirrored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Remote name in the tool's connection profile.
    pub remote_name: String,
    /// Folder inside the drive.
    pub folder: String,
    /// List items shared with the service account, not only items it owns.
    pub shared_with_me: bool,
    /// OAuth scope requested for the drive remote.
    pub scope: String,
    /// Service account key, either raw JSON or base64 of it.
    pub service_account_json: Option<String>,
}

/// The object-storage bucket receiving the mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    /// Remote name in the tool's connection profile.
    pub remote_name: String,
    pub bucket: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: String,
    /// S3 provider string passed through to the tool (`Other`, `AWS`, `Minio`, ...).
    pub provider: String,
    pub acl: String,
}

/// Run defaults and post-sync verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// 5-field cron expression (UTC) for scheduled runs.
    pub schedule: String,
    /// Default for runs that do not specify `dry_run`.
    pub dry_run: bool,
    /// Default for runs that do not specify `force_full`.
    pub force_full: bool,
    /// Filenames that must exist at the destination root after a real sync.
    pub critical_files: Vec<String>,
}

/// Tool parallelism and retry tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Parallel file transfers.
    pub transfers: u32,
    /// Parallel equality checkers.
    pub checkers: u32,
    /// Whole-sync retries performed by the tool.
    pub retries: u32,
}

/// Where the tool lives and where its connection profile is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub binary: PathBuf,
    /// Generated connection profile (rclone.conf).
    pub config_path: PathBuf,
    /// Decoded service account key file referenced by the profile.
    pub service_account_path: PathBuf,
}

/// Job runner limits and periodic health checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Hard wall-clock ceiling for a single job.
    pub time_limit_secs: u64,
    /// Warning threshold that fires before the hard limit.
    pub soft_time_limit_secs: u64,
    /// How long finished task results are retained.
    pub result_ttl_secs: u64,
    /// A scheduled sync that cannot start within this window is dropped.
    pub sync_expires_secs: u64,
    pub health_check_schedule: String,
    pub health_check_expires_secs: u64,
}

/// HTTP status API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Load `path` if it exists (parse errors propagate), otherwise start
    /// from defaults, then apply overrides from the process environment.
    pub fn resolve(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/drivemirror/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("drivemirror")
            .join("config.yaml")
    }

    /// The source folder as a tool remote, e.g. `gdrive:Reports/`.
    pub fn source_remote(&self) -> Result<Remote, DomainError> {
        let folder = self.source.folder.trim_end_matches('/');
        Ok(Remote::new(&self.source.remote_name, format!("{folder}/"))?
            .with_shared_scope(self.source.shared_with_me))
    }

    /// The destination bucket as a tool remote, e.g. `s3:archive`.
    pub fn destination_remote(&self) -> Result<Remote, DomainError> {
        Remote::new(&self.destination.remote_name, &self.destination.bucket)
    }

    /// Copy of this configuration with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        const MASK: &str = "********";
        let mask = |v: &Option<String>| v.as_ref().map(|_| MASK.to_string());

        let mut copy = self.clone();
        copy.source.service_account_json = mask(&self.source.service_account_json);
        copy.destination.access_key = mask(&self.destination.access_key);
        copy.destination.secret_key = mask(&self.destination.secret_key);
        copy
    }
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

impl Config {
    /// Apply deployment values and secrets from environment variables.
    ///
    /// `lookup` maps a variable name to its value; the daemon passes
    /// `std::env::var`, tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GOOGLE_SERVICE_ACCOUNT_JSON") {
            self.source.service_account_json = Some(v);
        }
        if let Some(v) = lookup("GDRIVE_FOLDER") {
            self.source.folder = v;
        }
        if let Some(v) = lookup("S3_ENDPOINT") {
            self.destination.endpoint = Some(v);
        }
        if let Some(v) = lookup("S3_ACCESS_KEY") {
            self.destination.access_key = Some(v);
        }
        if let Some(v) = lookup("S3_SECRET_KEY") {
            self.destination.secret_key = Some(v);
        }
        if let Some(v) = lookup("S3_BUCKET") {
            self.destination.bucket = v;
        }
        if let Some(v) = lookup("S3_REGION") {
            self.destination.region = v;
        }
        if let Some(v) = lookup("SYNC_CRON_SCHEDULE") {
            self.sync.schedule = v;
        }
        if let Some(v) = lookup("RCLONE_CONFIG_PATH") {
            self.tool.config_path = PathBuf::from(v);
        }
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("drivemirror")
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            remote_name: "gdrive".to_string(),
            folder: String::new(),
            shared_with_me: true,
            scope: "drive.readonly".to_string(),
            service_account_json: None,
        }
    }
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            remote_name: "s3".to_string(),
            bucket: String::new(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            region: "us-east-1".to_string(),
            provider: "Other".to_string(),
            acl: "private".to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            schedule: "0 6,18 * * *".to_string(),
            dry_run: false,
            force_full: false,
            critical_files: Vec::new(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            transfers: 10,
            checkers: 10,
            retries: 5,
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            binary: PathBuf::from("rclone"),
            config_path: data_dir.join("rclone.conf"),
            service_account_path: data_dir.join("service_account.json"),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: 7200,
            soft_time_limit_secs: 6900,
            result_ttl_secs: 86400 * 7,
            sync_expires_secs: 3600,
            health_check_schedule: "*/15 * * * *".to_string(),
            health_check_expires_secs: 60,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.schedule"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            });
        };

        // --- source / destination ---
        if self.source.folder.trim_matches('/').is_empty() {
            push("source.folder", "must not be empty".into());
        }
        if let Err(e) = Remote::new(&self.source.remote_name, "") {
            push("source.remote_name", e.to_string());
        }
        if self.destination.bucket.is_empty() {
            push("destination.bucket", "must not be empty".into());
        }
        if let Err(e) = Remote::new(&self.destination.remote_name, "") {
            push("destination.remote_name", e.to_string());
        }
        if self.source.remote_name == self.destination.remote_name {
            push(
                "destination.remote_name",
                format!(
                    "must differ from source.remote_name ('{}')",
                    self.source.remote_name
                ),
            );
        }

        // --- sync ---
        if let Err(e) = CronSchedule::parse(&self.sync.schedule) {
            push("sync.schedule", e.to_string());
        }
        for name in &self.sync.critical_files {
            if name.is_empty() || name.contains('/') {
                push(
                    "sync.critical_files",
                    format!("'{name}' must be a plain filename"),
                );
            }
        }

        // --- transfer ---
        if self.transfer.transfers == 0 {
            push("transfer.transfers", "must be greater than 0".into());
        }
        if self.transfer.checkers == 0 {
            push("transfer.checkers", "must be greater than 0".into());
        }

        // --- jobs ---
        if self.jobs.time_limit_secs == 0 {
            push("jobs.time_limit_secs", "must be greater than 0".into());
        }
        if self.jobs.soft_time_limit_secs == 0
            || self.jobs.soft_time_limit_secs >= self.jobs.time_limit_secs
        {
            push(
                "jobs.soft_time_limit_secs",
                format!(
                    "must be in range 1..{} (below time_limit_secs)",
                    self.jobs.time_limit_secs
                ),
            );
        }
        if let Err(e) = CronSchedule::parse(&self.jobs.health_check_schedule) {
            push("jobs.health_check_schedule", e.to_string());
        }

        // --- api ---
        if self.api.enabled && self.api.bind.parse::<SocketAddr>().is_err() {
            push(
                "api.bind",
                format!("invalid socket address '{}'", self.api.bind),
            );
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            push(
                "logging.format",
                format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            );
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use drivemirror_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .source_folder("Reports")
///     .destination_bucket("reports-mirror")
///     .critical_files(["index.csv"])
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- source ---

    pub fn source_folder(mut self, folder: impl Into<String>) -> Self {
        self.config.source.folder = folder.into();
        self
    }

    pub fn source_shared_with_me(mut self, shared: bool) -> Self {
        self.config.source.shared_with_me = shared;
        self
    }

    pub fn service_account_json(mut self, json: impl Into<String>) -> Self {
        self.config.source.service_account_json = Some(json.into());
        self
    }

    // --- destination ---

    pub fn destination_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.destination.bucket = bucket.into();
        self
    }

    pub fn destination_credentials(
        mut self,
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.config.destination.endpoint = Some(endpoint.into());
        self.config.destination.access_key = Some(access_key.into());
        self.config.destination.secret_key = Some(secret_key.into());
        self
    }

    // --- sync ---

    pub fn schedule(mut self, expression: impl Into<String>) -> Self {
        self.config.sync.schedule = expression.into();
        self
    }

    pub fn default_dry_run(mut self, dry_run: bool) -> Self {
        self.config.sync.dry_run = dry_run;
        self
    }

    pub fn default_force_full(mut self, force_full: bool) -> Self {
        self.config.sync.force_full = force_full;
        self
    }

    pub fn critical_files<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.sync.critical_files = names.into_iter().map(Into::into).collect();
        self
    }

    // --- transfer ---

    pub fn transfers(mut self, n: u32) -> Self {
        self.config.transfer.transfers = n;
        self
    }

    pub fn checkers(mut self, n: u32) -> Self {
        self.config.transfer.checkers = n;
        self
    }

    pub fn retries(mut self, n: u32) -> Self {
        self.config.transfer.retries = n;
        self
    }

    // --- tool ---

    pub fn tool_binary(mut self, binary: PathBuf) -> Self {
        self.config.tool.binary = binary;
        self
    }

    pub fn tool_config_path(mut self, path: PathBuf) -> Self {
        self.config.tool.config_path = path;
        self
    }

    pub fn service_account_path(mut self, path: PathBuf) -> Self {
        self.config.tool.service_account_path = path;
        self
    }

    // --- jobs ---

    pub fn time_limits(mut self, soft_secs: u64, hard_secs: u64) -> Self {
        self.config.jobs.soft_time_limit_secs = soft_secs;
        self.config.jobs.time_limit_secs = hard_secs;
        self
    }

    pub fn sync_expires_secs(mut self, secs: u64) -> Self {
        self.config.jobs.sync_expires_secs = secs;
        self
    }

    // --- api ---

    pub fn api_bind(mut self, bind: impl Into<String>) -> Self {
        self.config.api.bind = bind.into();
        self
    }

    pub fn api_enabled(mut self, enabled: bool) -> Self {
        self.config.api.enabled = enabled;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
