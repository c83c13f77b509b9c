//! Application state shared across all request handlers.

use slack_ingest_core::intake::EnvelopeIntake;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Verifies and dispatches incoming webhook deliveries.
    pub intake: EnvelopeIntake,
}

impl AppState {
    pub fn new(intake: EnvelopeIntake) -> Self {
        Self { intake }
    }
}
