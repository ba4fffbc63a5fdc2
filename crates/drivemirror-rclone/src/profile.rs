//! Connection profile generation
//!
//! rclone reads its remotes from an INI-style config file. DriveMirror never
//! ships one; it renders the file from [`Config`] at setup time, together with
//! the decoded service account key the drive remote points at.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use drivemirror_core::config::Config;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::RcloneError;

/// Decodes a service account key given either as base64 or as raw JSON.
///
/// Base64 is tried first. The result is re-serialized with indentation so the
/// file on disk is stable regardless of the input encoding.
pub fn decode_service_account(raw: &str) -> Result<String, RcloneError> {
    let raw = raw.trim();

    let from_base64 = STANDARD
        .decode(raw)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok());

    let value = match from_base64 {
        Some(value) => value,
        None => serde_json::from_str::<serde_json::Value>(raw)
            .map_err(|e| RcloneError::InvalidServiceAccount(e.to_string()))?,
    };

    if !value.is_object() {
        return Err(RcloneError::InvalidServiceAccount(
            "expected a JSON object".to_string(),
        ));
    }

    serde_json::to_string_pretty(&value)
        .map_err(|e| RcloneError::InvalidServiceAccount(e.to_string()))
}

/// Renders the rclone config file for the source and destination remotes.
///
/// Fails when any S3 credential is absent.
pub fn render_profile(config: &Config, service_account_path: &Path) -> Result<String, RcloneError> {
    let dest = &config.destination;
    let (endpoint, access_key, secret_key) = match (
        dest.endpoint.as_deref(),
        dest.access_key.as_deref(),
        dest.secret_key.as_deref(),
    ) {
        (Some(e), Some(a), Some(s)) if !e.is_empty() && !a.is_empty() && !s.is_empty() => {
            (e, a, s)
        }
        _ => return Err(RcloneError::MissingCredentials("S3 credentials")),
    };

    let lines = [
        format!("[{}]", config.source.remote_name),
        "type = drive".to_string(),
        format!("scope = {}", config.source.scope),
        format!("service_account_file = {}", service_account_path.display()),
        String::new(),
        format!("[{}]", dest.remote_name),
        "type = s3".to_string(),
        format!("provider = {}", dest.provider),
        format!("access_key_id = {access_key}"),
        format!("secret_access_key = {secret_key}"),
        format!("endpoint = {endpoint}"),
        format!("region = {}", dest.region),
        format!("acl = {}", dest.acl),
    ];

    Ok(lines.join("\n"))
}

/// Writes the service account key and the rclone config file.
///
/// Both files are created with owner-only permissions on Unix since they
/// hold credentials.
pub async fn write_profile(config: &Config) -> Result<(), RcloneError> {
    let raw = config
        .source
        .service_account_json
        .as_deref()
        .ok_or(RcloneError::MissingCredentials("GOOGLE_SERVICE_ACCOUNT_JSON"))?;

    let sa_path = &config.tool.service_account_path;
    let conf_path = &config.tool.config_path;

    let service_account = decode_service_account(raw)?;
    let profile = render_profile(config, sa_path)?;

    write_private(sa_path, &service_account).await?;
    debug!(path = %sa_path.display(), "Wrote service account key");

    write_private(conf_path, &profile).await?;
    info!(path = %conf_path.display(), "Wrote rclone configuration");

    Ok(())
}

/// Creates or truncates `path` owner-only before any secret is written.
async fn write_private(path: &Path, contents: &str) -> Result<(), RcloneError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;

    // A pre-existing file keeps its old mode on open
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await?;
    }

    file.write_all(contents.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
