//! Fully resolved settings the binary runs with.

use slack_ingest_core::filter::SelfIdentity;
use slack_ingest_core::state::RetentionPolicy;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_SIDECAR_URL: &str = "http://localhost:9999";
pub const DEFAULT_SIDECAR_SOURCE: &str = "slack";
pub const DEFAULT_WATERMARK_FILE: &str = "/tmp/el-slack-agent-watermark";
pub const DEFAULT_SEEN_IDS_FILE: &str = "/tmp/slack-webhook-seen-ids";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_POLL_LIMIT: u32 = 20;
pub const DEFAULT_LISTEN_PORT: u16 = 9999;

/// History polling, present only when a channel is configured and the
/// interval is non-zero.
#[derive(Clone)]
pub struct PollSettings {
    pub token: String,
    pub channel: String,
    pub interval: Duration,
    pub limit: u32,
}

#[derive(Clone)]
pub struct Settings {
    pub signing_secret: Option<String>,
    pub identity: SelfIdentity,
    pub poll: Option<PollSettings>,
    pub sidecar_url: Url,
    pub sidecar_source: String,
    pub watermark_file: PathBuf,
    pub seen_ids_file: PathBuf,
    pub retention: RetentionPolicy,
    pub listen_port: u16,
}

impl fmt::Debug for PollSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollSettings")
            .field("token", &"<redacted>")
            .field("channel", &self.channel)
            .field("interval", &self.interval)
            .field("limit", &self.limit)
            .finish()
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("signing_secret", &self.signing_secret.as_ref().map(|_| "<redacted>"))
            .field("identity", &self.identity)
            .field("poll", &self.poll)
            .field("sidecar_url", &self.sidecar_url.as_str())
            .field("sidecar_source", &self.sidecar_source)
            .field("watermark_file", &self.watermark_file)
            .field("seen_ids_file", &self.seen_ids_file)
            .field("retention", &self.retention)
            .field("listen_port", &self.listen_port)
            .finish()
    }
}
