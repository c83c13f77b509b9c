//! The accept/drop decision for a single Slack event.
//!
//! [`classify`] is a pure function of the event, the adapter's own identity
//! and the current [`IngestState`]. Rules are evaluated in order and the
//! first match wins:
//!
//! 1. not a `message` / `app_mention` → [`DropReason::UnsupportedType`]
//! 2. `message_changed` / `message_deleted` → [`DropReason::Edit`]
//! 3. sent by this bot → [`DropReason::SelfMessage`]
//! 4. no usable timestamp → [`DropReason::Malformed`]
//! 5. `ts <= watermark` → [`DropReason::Stale`] (or [`DropReason::Duplicate`]
//!    when the event's `client_msg_id` is also remembered)
//! 6. `client_msg_id` already seen → [`DropReason::Duplicate`]
//! 7. otherwise accept
//!
//! `url_verification` handshakes are answered before an event ever gets
//! here.

use compact_str::CompactString;
use slack_ingest_sdk::objects::SlackEvent;
use std::fmt;

use crate::state::{IngestState, SlackTs};

/// Ids identifying messages this adapter's own bot sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelfIdentity {
    /// The bot id (`B…`), compared against both `bot_id` and `user`.
    pub bot_id: Option<CompactString>,
    /// The bot's user id (`U…`), compared against `user`.
    pub user_id: Option<CompactString>,
}

impl SelfIdentity {
    pub fn new(bot_id: Option<CompactString>, user_id: Option<CompactString>) -> Self {
        let non_empty = |id: Option<CompactString>| id.filter(|id| !id.trim().is_empty());
        Self {
            bot_id: non_empty(bot_id),
            user_id: non_empty(user_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bot_id.is_none() && self.user_id.is_none()
    }

    /// Whether `event` was produced by this bot.
    pub fn sent(&self, event: &SlackEvent) -> bool {
        let user = event.user.as_deref();
        let bot_id = event.bot_id.as_deref();
        let by_bot_id = self
            .bot_id
            .as_deref()
            .is_some_and(|own| bot_id == Some(own) || user == Some(own));
        let by_user_id = self
            .user_id
            .as_deref()
            .is_some_and(|own| user == Some(own));
        by_bot_id || by_user_id
    }
}

/// Why an event or envelope was not emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// Event type other than `message` / `app_mention`.
    UnsupportedType,
    /// Edit or deletion of an earlier message.
    Edit,
    /// Sent by this adapter's own bot.
    SelfMessage,
    /// Missing or unparseable timestamp.
    Malformed,
    /// At or before the watermark.
    Stale,
    /// Same `client_msg_id` already accepted.
    Duplicate,
    /// The gate's accept budget is used up.
    Closed,
    /// The output stream could not be written.
    SinkUnavailable,
    /// Signature verification failed.
    InvalidSignature,
    /// The envelope body is not a valid Events API payload.
    MalformedEnvelope,
    /// The buffered envelope carries a different source tag.
    ForeignSource,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::UnsupportedType => "unsupported_type",
            DropReason::Edit => "edit",
            DropReason::SelfMessage => "self",
            DropReason::Malformed => "malformed",
            DropReason::Stale => "stale",
            DropReason::Duplicate => "duplicate",
            DropReason::Closed => "closed",
            DropReason::SinkUnavailable => "sink_unavailable",
            DropReason::InvalidSignature => "invalid_signature",
            DropReason::MalformedEnvelope => "malformed_envelope",
            DropReason::ForeignSource => "foreign_source",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State changes that follow from accepting an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acceptance {
    /// The event's own timestamp.
    pub ts: SlackTs,
    /// `max(watermark, ts)`.
    pub watermark: SlackTs,
    /// `client_msg_id` to remember, if the event has one.
    pub record_id: Option<CompactString>,
}

/// Outcome of [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accept(Acceptance),
    Drop(DropReason),
}

impl Decision {
    pub fn is_accept(&self) -> bool {
        matches!(self, Decision::Accept(_))
    }

    pub fn drop_reason(&self) -> Option<DropReason> {
        match self {
            Decision::Accept(_) => None,
            Decision::Drop(reason) => Some(*reason),
        }
    }
}

/// Decide whether `event` should be emitted given `state`.
pub fn classify(event: &SlackEvent, identity: &SelfIdentity, state: &IngestState) -> Decision {
    if !event.is_chat_event() {
        return Decision::Drop(DropReason::UnsupportedType);
    }
    if event.is_edit() {
        return Decision::Drop(DropReason::Edit);
    }
    if identity.sent(event) {
        return Decision::Drop(DropReason::SelfMessage);
    }
    let Some(ts) = event.decision_ts().and_then(|raw| raw.parse::<SlackTs>().ok()) else {
        return Decision::Drop(DropReason::Malformed);
    };
    let record_id = event.dedup_key().map(CompactString::from);
    let already_seen = record_id
        .as_deref()
        .is_some_and(|id| state.seen_ids.contains(id));
    if !state.watermark.admits(&ts) {
        // A stale event whose id is remembered is reported as the more
        // specific duplicate.
        let reason = if already_seen {
            DropReason::Duplicate
        } else {
            DropReason::Stale
        };
        return Decision::Drop(reason);
    }
    if already_seen {
        return Decision::Drop(DropReason::Duplicate);
    }

    Decision::Accept(Acceptance {
        watermark: state.watermark.advanced_to(&ts),
        ts,
        record_id,
    })
}
