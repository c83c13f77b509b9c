//! Slack Web API client (read-only, history polling).

use reqwest::Client;
use std::time::Duration;
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::HistoryResponse;

/// Default Slack Web API root.
pub const SLACK_API_BASE: &str = "https://slack.com/api/";

/// Request timeout for Web API calls.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameters for one `conversations.history` page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub channel: String,
    /// Exclusive lower bound (`ts` string); `None` fetches the latest page.
    pub oldest: Option<String>,
    pub limit: u32,
    /// Pagination cursor from a previous page.
    pub cursor: Option<String>,
}

/// Typed HTTP client for the Slack Web API.
#[derive(Debug, Clone)]
pub struct SlackWebClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl SlackWebClient {
    /// Create a client against the public Slack API.
    pub fn new(token: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self::with_base_url(Url::parse(SLACK_API_BASE)?, token))
    }

    /// Create a client against a custom API root.
    pub fn with_base_url(mut base_url: Url, token: impl Into<String>) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .timeout(DEFAULT_API_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url,
            token: token.into(),
        }
    }

    /// `GET conversations.history` – one page of channel messages,
    /// newest-first, strictly newer than `query.oldest`.
    pub async fn conversations_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<HistoryResponse, ClientError> {
        let url = self.base_url.join("conversations.history")?;
        let limit = query.limit.to_string();

        let mut request = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("channel", query.channel.as_str()), ("limit", limit.as_str())]);
        if let Some(oldest) = &query.oldest {
            request = request.query(&[("oldest", oldest.as_str()), ("inclusive", "false")]);
        }
        if let Some(cursor) = &query.cursor {
            request = request.query(&[("cursor", cursor.as_str())]);
        }

        let response: HistoryResponse = parse_response(request.send().await?).await?;
        if !response.ok {
            let error = response
                .error
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(ClientError::Slack(error));
        }
        Ok(response)
    }
}
