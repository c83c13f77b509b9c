//! Resumable ingestion state.
//!
//! [`IngestState`] is the only state that decides whether an event is new:
//! the [`Watermark`] rejects anything at or before the newest accepted
//! timestamp, and [`SeenIds`] rejects repeat deliveries that share a
//! `client_msg_id` but not necessarily an envelope.

mod seen_ids;
mod timestamp;
mod watermark;

pub use seen_ids::{
    DEFAULT_MAX_SEEN_IDS, DEFAULT_RETENTION, RetentionPolicy, SeenEntry, SeenIds,
};
pub use timestamp::{InvalidTimestamp, SlackTs};
pub use watermark::Watermark;

use crate::filter::Acceptance;

/// Watermark plus seen-id set, mutated only through [`IngestState::apply`].
#[derive(Debug, Clone, Default)]
pub struct IngestState {
    pub watermark: Watermark,
    pub seen_ids: SeenIds,
}

impl IngestState {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            watermark: Watermark::default(),
            seen_ids: SeenIds::new(policy),
        }
    }

    /// Commit an accept decision made against this state.
    pub fn apply(&mut self, acceptance: &Acceptance, now: i64) {
        self.watermark.set(acceptance.watermark.clone());
        if let Some(id) = &acceptance.record_id {
            self.seen_ids.insert(id, now);
        } else {
            self.seen_ids.evict(now);
        }
    }
}
