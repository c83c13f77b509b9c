//! Configuration module for slack-ingest.
//!
//! Settings come from four layers, highest priority first: command-line
//! flags, environment variables, an optional TOML file (`--config`) and
//! built-in defaults. clap merges the first two; [`ConfigLoader`] folds in
//! the file and the defaults and validates the result.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{
    DEFAULT_LISTEN_PORT, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_LIMIT, DEFAULT_SEEN_IDS_FILE,
    DEFAULT_SIDECAR_SOURCE, DEFAULT_SIDECAR_URL, DEFAULT_WATERMARK_FILE, PollSettings, Settings,
};
use clap::Args;
use slack_ingest_core::filter::SelfIdentity;
use slack_ingest_core::state::{DEFAULT_MAX_SEEN_IDS, RetentionPolicy};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid sidecar url {value:?}: {reason}")]
    InvalidUrl { value: String, reason: String },

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Settings that can be given on the command line or through the
/// environment.
#[derive(Args, Debug, Clone, Default)]
pub struct CliSettings {
    /// Slack signing secret; verification is disabled when unset
    #[arg(long, global = true, env = "SLACK_SIGNING_SECRET", hide_env_values = true)]
    pub signing_secret: Option<String>,

    /// This bot's id; its own messages are never emitted
    #[arg(long, global = true, env = "SLACK_BOT_ID")]
    pub bot_id: Option<String>,

    /// This bot's user id
    #[arg(long, global = true, env = "SLACK_BOT_USER_ID")]
    pub bot_user_id: Option<String>,

    /// Bot token for conversations.history polling
    #[arg(long, global = true, env = "SLACK_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Channel to poll for missed messages
    #[arg(long, global = true, env = "SLACK_CHANNEL")]
    pub channel: Option<String>,

    /// Seconds between history polls (0 disables polling)
    #[arg(long, global = true, env = "SLACK_POLL_INTERVAL")]
    pub poll_interval: Option<u64>,

    /// Messages requested per history page
    #[arg(long, global = true, env = "SLACK_POLL_LIMIT")]
    pub poll_limit: Option<u32>,

    /// Base URL of the sidecar buffer
    #[arg(long, global = true, env = "SIDECAR_URL")]
    pub sidecar_url: Option<String>,

    /// Source tag the sidecar files Slack deliveries under
    #[arg(long, global = true, env = "SIDECAR_SOURCE")]
    pub sidecar_source: Option<String>,

    /// Where the watermark is persisted
    #[arg(long, global = true, env = "SLACK_WATERMARK_FILE")]
    pub watermark_file: Option<PathBuf>,

    /// Where recently seen message ids are persisted
    #[arg(long, global = true, env = "SLACK_SEEN_IDS_FILE")]
    pub seen_ids_file: Option<PathBuf>,

    /// Maximum number of remembered message ids
    #[arg(long, global = true, env = "SLACK_SEEN_IDS_MAX")]
    pub seen_ids_max: Option<usize>,

    /// Hours a message id is remembered for
    #[arg(long, global = true, env = "SLACK_SEEN_IDS_RETENTION_HOURS")]
    pub seen_ids_retention_hours: Option<u64>,

    /// Set from the `listen` subcommand.
    #[arg(skip)]
    pub listen_port: Option<u16>,
}

/// Configuration loader that merges all layers into [`Settings`].
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    cli: CliSettings,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: Option<&Path>, cli: CliSettings) -> Self {
        Self {
            config_path: config_path.map(Path::to_path_buf),
            cli,
        }
    }

    /// Load and validate the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file, if one was given
    /// 2. Apply CLI and environment overrides
    /// 3. Fill in defaults and validate
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let file_config = match &self.config_path {
            Some(path) => {
                let content =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
                        path: path.clone(),
                        source,
                    })?;
                toml::from_str(&content)?
            }
            None => FileConfig::default(),
        };
        self.resolve(file_config)
    }

    fn resolve(&self, file: FileConfig) -> Result<Settings, ConfigError> {
        let cli = self.cli.clone();

        let identity = SelfIdentity::new(
            pick(cli.bot_id, file.slack.bot_id).map(Into::into),
            pick(cli.bot_user_id, file.slack.bot_user_id).map(Into::into),
        );

        let poll = build_poll(
            pick(cli.token, file.slack.token),
            pick(cli.channel, file.slack.channel),
            cli.poll_interval
                .or(file.slack.poll_interval)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            cli.poll_limit
                .or(file.slack.poll_limit)
                .unwrap_or(DEFAULT_POLL_LIMIT),
        )?;

        let sidecar_url = parse_sidecar_url(
            &pick(cli.sidecar_url, file.sidecar.url)
                .unwrap_or_else(|| DEFAULT_SIDECAR_URL.to_string()),
        )?;

        let retention = build_retention(
            cli.seen_ids_max
                .or(file.state.seen_ids_max)
                .unwrap_or(DEFAULT_MAX_SEEN_IDS),
            cli.seen_ids_retention_hours
                .or(file.state.seen_ids_retention_hours)
                .unwrap_or(24),
        )?;

        Ok(Settings {
            signing_secret: pick(cli.signing_secret, file.slack.signing_secret),
            identity,
            poll,
            sidecar_url,
            sidecar_source: pick(cli.sidecar_source, file.sidecar.source)
                .unwrap_or_else(|| DEFAULT_SIDECAR_SOURCE.to_string()),
            watermark_file: cli
                .watermark_file
                .or(file.state.watermark_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WATERMARK_FILE)),
            seen_ids_file: cli
                .seen_ids_file
                .or(file.state.seen_ids_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SEEN_IDS_FILE)),
            retention,
            listen_port: cli
                .listen_port
                .or(file.listen.port)
                .unwrap_or(DEFAULT_LISTEN_PORT),
        })
    }
}

/// First non-blank value, CLI/env before file.
fn pick(cli: Option<String>, file: Option<String>) -> Option<String> {
    cli.filter(|v| !v.trim().is_empty())
        .or(file.filter(|v| !v.trim().is_empty()))
}

fn build_poll(
    token: Option<String>,
    channel: Option<String>,
    interval_secs: u64,
    limit: u32,
) -> Result<Option<PollSettings>, ConfigError> {
    let Some(channel) = channel else {
        return Ok(None);
    };
    if interval_secs == 0 {
        return Ok(None);
    }
    let Some(token) = token else {
        return Err(ConfigError::ValidationError(
            "history polling needs SLACK_TOKEN when SLACK_CHANNEL is set".to_string(),
        ));
    };
    if limit == 0 {
        return Err(ConfigError::ValidationError(
            "SLACK_POLL_LIMIT must be at least 1".to_string(),
        ));
    }
    Ok(Some(PollSettings {
        token,
        channel,
        interval: Duration::from_secs(interval_secs),
        limit,
    }))
}

fn parse_sidecar_url(value: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        value: value.to_string(),
        reason,
    };
    let url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

fn build_retention(max_entries: usize, hours: u64) -> Result<RetentionPolicy, ConfigError> {
    if max_entries == 0 {
        return Err(ConfigError::ValidationError(
            "SLACK_SEEN_IDS_MAX must be at least 1".to_string(),
        ));
    }
    let horizon = i64::try_from(hours)
        .ok()
        .filter(|h| *h > 0)
        .and_then(|h| h.checked_mul(3600))
        .map(time::Duration::seconds)
        .ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "SLACK_SEEN_IDS_RETENTION_HOURS out of range: {hours}"
            ))
        })?;
    Ok(RetentionPolicy {
        max_entries,
        horizon,
    })
}
