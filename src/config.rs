//! Configuration management for athena-mcp.
//!
//! Handles loading the optional TOML configuration file and resolving the
//! process-wide settings once at startup. Precedence, highest first:
//! command-line argument, environment variable, profile/config file,
//! built-in default.

use crate::athena::Credentials;
use crate::error::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_WORKGROUP: &str = "primary";
pub const DEFAULT_OUTPUT_LOCATION: &str = "s3://aws-athena-query-results/query-results/";
pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_POLLS: u32 = 100;

/// Contents of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Athena connection defaults.
    #[serde(default)]
    pub athena: AthenaSection,

    /// Wait-for-completion polling.
    #[serde(default)]
    pub polling: PollingSection,
}

/// `[athena]` section of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AthenaSection {
    pub region: Option<String>,
    pub workgroup: Option<String>,
    pub output_location: Option<String>,
    /// Endpoint override (e.g. a local emulator).
    pub endpoint: Option<String>,
    /// Named profile in the shared credentials file.
    pub profile: Option<String>,
}

/// `[polling]` section of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PollingSection {
    pub interval_ms: Option<u64>,
    pub max_polls: Option<u32>,
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("athena-mcp")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ServiceError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }
}

/// Defaults applied to requests that omit workgroup or output location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDefaults {
    pub workgroup: String,
    pub output_location: String,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            workgroup: DEFAULT_WORKGROUP.to_string(),
            output_location: DEFAULT_OUTPUT_LOCATION.to_string(),
        }
    }
}

/// Polling behaviour for wait-for-completion submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// Fixed sleep between status polls.
    pub interval: Duration,
    /// Maximum number of status polls before giving up waiting.
    pub max_polls: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub region: Option<String>,
    pub workgroup: Option<String>,
    pub output_location: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub profile: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub max_polls: Option<u32>,
    /// Shared credentials file location.
    pub credentials_file: Option<PathBuf>,
}

/// Where the signing credentials came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Access keys given on the command line or in the environment.
    Explicit,
    /// A named profile from the shared credentials file.
    Profile(String),
    /// Nothing found; engine calls will fail.
    Missing,
}

/// Fully resolved process-wide settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub region: String,
    pub endpoint: Option<String>,
    pub defaults: QueryDefaults,
    pub polling: PollingConfig,
    pub credentials: Option<Credentials>,
    pub credential_source: CredentialSource,
}

impl ServerSettings {
    /// Resolves settings from overrides and the config file.
    pub fn resolve(overrides: &SettingsOverrides, file: &Config) -> Result<Self> {
        let region = pick(&overrides.region, &file.athena.region)
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let workgroup = pick(&overrides.workgroup, &file.athena.workgroup)
            .unwrap_or_else(|| DEFAULT_WORKGROUP.to_string());
        let output_location = pick(&overrides.output_location, &file.athena.output_location)
            .unwrap_or_else(|| DEFAULT_OUTPUT_LOCATION.to_string());
        validate_output_location(&output_location)?;
        let endpoint = pick(&overrides.endpoint, &file.athena.endpoint);

        let interval_ms = overrides
            .poll_interval_ms
            .or(file.polling.interval_ms)
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        let max_polls = overrides
            .max_polls
            .or(file.polling.max_polls)
            .unwrap_or(DEFAULT_MAX_POLLS);
        if max_polls == 0 {
            return Err(ServiceError::config("max_polls must be at least 1"));
        }

        let (credentials, credential_source) = resolve_credentials(overrides, file)?;

        Ok(Self {
            region,
            endpoint,
            defaults: QueryDefaults {
                workgroup,
                output_location,
            },
            polling: PollingConfig {
                interval: Duration::from_millis(interval_ms),
                max_polls,
            },
            credentials,
            credential_source,
        })
    }
}

/// Returns the first non-empty value.
fn pick(primary: &Option<String>, fallback: &Option<String>) -> Option<String> {
    primary
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| fallback.as_deref().filter(|s| !s.trim().is_empty()))
        .map(|s| s.trim().to_string())
}

fn resolve_credentials(
    overrides: &SettingsOverrides,
    file: &Config,
) -> Result<(Option<Credentials>, CredentialSource)> {
    if let (Some(key), Some(secret)) = (&overrides.access_key_id, &overrides.secret_access_key) {
        let mut credentials = Credentials::new(key, secret);
        credentials.session_token = overrides.session_token.clone();
        return Ok((Some(credentials), CredentialSource::Explicit));
    }

    let profile = pick(&overrides.profile, &file.athena.profile)
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
    let Some(path) = overrides
        .credentials_file
        .clone()
        .or_else(shared_credentials_path)
    else {
        return Ok((None, CredentialSource::Missing));
    };

    match load_profile_credentials(&path, &profile)? {
        Some(credentials) => Ok((Some(credentials), CredentialSource::Profile(profile))),
        None => Ok((None, CredentialSource::Missing)),
    }
}

/// Returns the default shared credentials file path (`~/.aws/credentials`).
pub fn shared_credentials_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".aws").join("credentials"))
}

/// Loads a named profile from a shared credentials file.
///
/// Returns `Ok(None)` when the file or the profile does not exist.
pub fn load_profile_credentials(path: &Path, profile: &str) -> Result<Option<Credentials>> {
    if !path.exists() {
        debug!("No shared credentials file at {}", path.display());
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        ServiceError::config(format!(
            "Failed to read credentials file {}: {e}",
            path.display()
        ))
    })?;

    Ok(parse_credentials_file(&content, profile))
}

/// Parses the INI-style shared credentials format and extracts one profile.
pub fn parse_credentials_file(content: &str, profile: &str) -> Option<Credentials> {
    let mut in_profile = false;
    let mut key = None;
    let mut secret = None;
    let mut token = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_profile = section.trim() == profile;
            continue;
        }
        if !in_profile {
            continue;
        }
        if let Some((name, value)) = line.split_once('=') {
            let value = value.trim().to_string();
            match name.trim() {
                "aws_access_key_id" => key = Some(value),
                "aws_secret_access_key" => secret = Some(value),
                "aws_session_token" => token = Some(value),
                _ => {}
            }
        }
    }

    let mut credentials = Credentials::new(key?, secret?);
    credentials.session_token = token;
    Some(credentials)
}

/// Checks that an output location is an `s3://bucket/...` URI.
pub fn validate_output_location(location: &str) -> Result<()> {
    let url = Url::parse(location)
        .map_err(|e| ServiceError::config(format!("Invalid output location '{location}': {e}")))?;

    if url.scheme() != "s3" {
        return Err(ServiceError::config(format!(
            "Invalid output location scheme '{}'. Expected 's3'",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ServiceError::config(format!(
            "Output location '{location}' has no bucket"
        )));
    }

    Ok(())
}
