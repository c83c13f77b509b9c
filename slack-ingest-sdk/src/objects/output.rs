//! The record written to stdout for every accepted event.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use super::SlackEvent;

/// One accepted chat event, emitted as a single JSON line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub user: CompactString,
    pub text: String,
    pub ts: CompactString,
    pub channel: CompactString,
    #[serde(rename = "type")]
    pub event_type: CompactString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<CompactString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<CompactString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_msg_id: Option<CompactString>,
}

fn non_empty(value: &Option<CompactString>) -> Option<CompactString> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

impl From<&SlackEvent> for OutputEvent {
    fn from(event: &SlackEvent) -> Self {
        Self {
            user: event.user.clone().unwrap_or_default(),
            text: event.text.clone().unwrap_or_default(),
            ts: event
                .ts
                .clone()
                .or_else(|| event.event_ts.clone())
                .unwrap_or_default(),
            channel: event.channel.clone().unwrap_or_default(),
            event_type: event.event_type.clone(),
            thread_ts: non_empty(&event.thread_ts),
            bot_id: non_empty(&event.bot_id),
            client_msg_id: non_empty(&event.client_msg_id),
        }
    }
}

impl OutputEvent {
    /// Serialize as a single NDJSON line (without the trailing newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_shape() {
        let event: SlackEvent = serde_json::from_value(json!({
            "type": "message",
            "user": "U1",
            "text": "hello",
            "ts": "100.1",
            "channel": "C1",
            "thread_ts": "",
            "client_msg_id": "m1",
            "team": "T1"
        }))
        .unwrap();

        let line = OutputEvent::from(&event).to_line().unwrap();
        assert_eq!(
            line,
            r#"{"user":"U1","text":"hello","ts":"100.1","channel":"C1","type":"message","client_msg_id":"m1"}"#
        );
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let event = SlackEvent {
            event_type: "app_mention".into(),
            event_ts: Some("5.0".into()),
            bot_id: Some("B9".into()),
            thread_ts: Some("4.0".into()),
            ..Default::default()
        };
        let output = OutputEvent::from(&event);
        assert_eq!(output.user, "");
        assert_eq!(output.text, "");
        assert_eq!(output.ts, "5.0");
        assert_eq!(output.thread_ts.as_deref(), Some("4.0"));
        assert_eq!(output.bot_id.as_deref(), Some("B9"));
    }
}
