//! TOML file configuration structures.
//!
//! Every key is optional; anything left out falls back to the environment
//! or the built-in default. Example:
//!
//! ```toml
//! [slack]
//! signing_secret = "..."
//! bot_id = "B0123"
//! channel = "C0456"
//! token = "xoxb-..."
//! poll_interval = 60
//!
//! [sidecar]
//! url = "http://localhost:9999"
//!
//! [state]
//! watermark_file = "/var/lib/slack-ingest/watermark"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub sidecar: SidecarConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub listen: ListenConfig,
}

/// Slack credentials, identity and history polling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlackConfig {
    pub signing_secret: Option<String>,
    pub bot_id: Option<String>,
    pub bot_user_id: Option<String>,
    pub token: Option<String>,
    pub channel: Option<String>,
    /// Seconds between history polls; 0 disables polling.
    pub poll_interval: Option<u64>,
    pub poll_limit: Option<u32>,
}

/// Where buffered webhook deliveries are drained from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SidecarConfig {
    pub url: Option<String>,
    pub source: Option<String>,
}

/// Persistence paths and seen-id retention.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    pub watermark_file: Option<PathBuf>,
    pub seen_ids_file: Option<PathBuf>,
    pub seen_ids_max: Option<usize>,
    pub seen_ids_retention_hours: Option<u64>,
}

/// Embedded listener settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListenConfig {
    pub port: Option<u16>,
}
