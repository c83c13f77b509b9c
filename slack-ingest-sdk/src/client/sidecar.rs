//! Sidecar buffer client.
//!
//! The sidecar accepts webhook POSTs on behalf of this adapter and stores
//! them verbatim. `GET /events?wait=true&source={tag}` long-polls until at
//! least one delivery for the tag is buffered (or the sidecar's own wait
//! expires) and hands back everything accumulated since the previous call.

use reqwest::Client;
use std::time::Duration;
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::BufferedEnvelope;

/// Client-side timeout for one long-poll; slightly above the sidecar's
/// 30 second wait so an idle poll returns an empty list rather than timing
/// out.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(35);

/// Typed HTTP client for the sidecar `/events` endpoint.
#[derive(Debug, Clone)]
pub struct SidecarClient {
    http: Client,
    base_url: Url,
    source: String,
}

impl SidecarClient {
    /// Create a new `SidecarClient`.
    ///
    /// * `base_url` – root URL of the sidecar (e.g. `http://localhost:9999`).
    ///   A path prefix is kept: `http://host/sidecar` drains
    ///   `http://host/sidecar/events`.
    /// * `source` – source tag the sidecar files Slack deliveries under.
    pub fn new(mut base_url: Url, source: impl Into<String>) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .timeout(DEFAULT_DRAIN_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url,
            source: source.into(),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// The source tag this client drains.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// `GET /events?wait=true&source={tag}` – drain buffered deliveries.
    ///
    /// A response that is valid JSON but not a list is treated as empty.
    pub async fn drain(&self) -> Result<Vec<BufferedEnvelope>, ClientError> {
        let url = self.base_url.join("events")?;

        let resp = self
            .http
            .get(url)
            .query(&[("wait", "true"), ("source", self.source.as_str())])
            .send()
            .await?;

        let value: serde_json::Value = parse_response(resp).await?;
        match value {
            serde_json::Value::Array(_) => Ok(serde_json::from_value(value)?),
            _ => Ok(Vec::new()),
        }
    }
}
