//! Command-line argument parsing for athena-mcp.
//!
//! Every flag can also be supplied through the environment; explicit flags win.

use crate::config::{Config, SettingsOverrides};
use clap::Parser;
use std::path::PathBuf;

/// Secondary region variable consulted when `AWS_REGION` is unset.
pub const FALLBACK_REGION_ENV: &str = "AWS_DEFAULT_REGION";

/// MCP server exposing read-only Amazon Athena queries.
#[derive(Parser, Debug)]
#[command(name = "athena-mcp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// AWS region hosting Athena
    #[arg(long, env = "AWS_REGION", value_name = "REGION")]
    pub region: Option<String>,

    /// Default Athena workgroup
    #[arg(long, env = "AWS_ATHENA_WORKGROUP", value_name = "WORKGROUP")]
    pub workgroup: Option<String>,

    /// Default S3 location for query results (s3://bucket/prefix/)
    #[arg(long, env = "AWS_ATHENA_OUTPUT_LOCATION", value_name = "S3_URI")]
    pub output_location: Option<String>,

    /// Override the Athena endpoint URL
    #[arg(long, env = "AWS_ATHENA_ENDPOINT", value_name = "URL")]
    pub endpoint: Option<String>,

    /// AWS access key id
    #[arg(long, env = "AWS_ACCESS_KEY_ID", value_name = "KEY", hide_env_values = true)]
    pub access_key_id: Option<String>,

    /// AWS secret access key
    #[arg(
        long,
        env = "AWS_SECRET_ACCESS_KEY",
        value_name = "SECRET",
        hide_env_values = true
    )]
    pub secret_access_key: Option<String>,

    /// AWS session token for temporary credentials
    #[arg(long, env = "AWS_SESSION_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,

    /// Profile to read from the shared credentials file
    #[arg(long, env = "AWS_PROFILE", value_name = "PROFILE")]
    pub profile: Option<String>,

    /// Shared credentials file (default: ~/.aws/credentials)
    #[arg(
        long,
        env = "AWS_SHARED_CREDENTIALS_FILE",
        value_name = "PATH"
    )]
    pub credentials_file: Option<PathBuf>,

    /// Milliseconds between status polls while waiting for a query
    #[arg(long, env = "ATHENA_MCP_POLL_INTERVAL_MS", value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Maximum status polls before a wait gives up
    #[arg(long, env = "ATHENA_MCP_MAX_POLLS", value_name = "COUNT")]
    pub max_polls: Option<u32>,

    /// Path to config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write logs to a file instead of stderr (default location when PATH is omitted)
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    pub log_file: Option<Option<PathBuf>>,
}

impl Cli {
    /// Parses CLI arguments from the environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path, using the default if not specified.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Returns the log file to write to, or `None` to log to stderr.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.log_file
            .as_ref()
            .map(|path| path.clone().unwrap_or_else(crate::logging::get_log_path))
    }

    /// Converts the arguments into settings overrides.
    pub fn to_overrides(&self) -> SettingsOverrides {
        self.to_overrides_with(|name| std::env::var(name).ok())
    }

    fn to_overrides_with(&self, env: impl Fn(&str) -> Option<String>) -> SettingsOverrides {
        SettingsOverrides {
            region: self
                .region
                .clone()
                .or_else(|| env(FALLBACK_REGION_ENV).filter(|r| !r.trim().is_empty())),
            workgroup: self.workgroup.clone(),
            output_location: self.output_location.clone(),
            endpoint: self.endpoint.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            session_token: self.session_token.clone(),
            profile: self.profile.clone(),
            poll_interval_ms: self.poll_interval_ms,
            max_polls: self.max_polls,
            credentials_file: self.credentials_file.clone(),
        }
    }
}
