//! Slack Events API payloads.

use compact_str::CompactString;
use serde::{Deserialize, Deserializer, Serialize};

/// Event type for plain channel messages.
pub const MESSAGE: &str = "message";
/// Event type for messages that mention the app.
pub const APP_MENTION: &str = "app_mention";

/// Subtype of an edited message.
pub const MESSAGE_CHANGED: &str = "message_changed";
/// Subtype of a deleted message.
pub const MESSAGE_DELETED: &str = "message_deleted";

/// Outer payload of a Slack Events API delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    /// Handshake sent when the request URL is configured.
    UrlVerification {
        challenge: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    /// A workspace event.
    EventCallback(EventCallback),
    /// Anything else (`app_rate_limited`, ...).
    #[serde(other)]
    Other,
}

impl EventEnvelope {
    /// Parse an envelope from a raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

/// Body of an `event_callback` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCallback {
    pub event: SlackEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<CompactString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<CompactString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<i64>,
}

/// A single Slack event, as found in `event_callback.event` or in a
/// `conversations.history` message list.
///
/// Fields this adapter does not interpret are kept in `extra`. The string
/// fields read as `None` when Slack sends something else in their place:
/// `user_change` carries a user object in `user`, `channel_created` a
/// channel object in `channel`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlackEvent {
    #[serde(rename = "type", default)]
    pub event_type: CompactString,
    #[serde(
        default,
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub subtype: Option<CompactString>,
    #[serde(
        default,
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub user: Option<CompactString>,
    #[serde(
        default,
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub bot_id: Option<CompactString>,
    #[serde(
        default,
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub text: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub ts: Option<CompactString>,
    #[serde(
        default,
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub event_ts: Option<CompactString>,
    #[serde(
        default,
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub channel: Option<CompactString>,
    #[serde(
        default,
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub thread_ts: Option<CompactString>,
    #[serde(
        default,
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_msg_id: Option<CompactString>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SlackEvent {
    /// Whether this is a chat event the adapter forwards.
    pub fn is_chat_event(&self) -> bool {
        self.event_type == MESSAGE || self.event_type == APP_MENTION
    }

    /// Whether this event is an edit or deletion of an earlier message.
    pub fn is_edit(&self) -> bool {
        matches!(
            self.subtype.as_deref(),
            Some(MESSAGE_CHANGED) | Some(MESSAGE_DELETED)
        )
    }

    /// The timestamp used for ordering: `ts`, falling back to `event_ts`.
    pub fn decision_ts(&self) -> Option<&str> {
        self.ts
            .as_deref()
            .or(self.event_ts.as_deref())
            .filter(|ts| !ts.is_empty())
    }

    /// The cross-delivery dedup key, if any.
    pub fn dedup_key(&self) -> Option<&str> {
        self.client_msg_id.as_deref().filter(|id| !id.is_empty())
    }
}

fn string_or_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(value)) => Ok(Some(T::from(value))),
        _ => Ok(None),
    }
}
