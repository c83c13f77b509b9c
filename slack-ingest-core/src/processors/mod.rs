//! Long-running event sources.
//!
//! - `SidecarDrain`: drains buffered webhook deliveries, feeds `EnvelopeIntake`
//! - `HistoryPoller`: reads `conversations.history`, feeds `IngestGate`
//!
//! Both run until their shutdown `watch` channel flips to `true`.

pub mod history_poller;
pub mod sidecar_drain;

pub use history_poller::{HistoryPoller, HistorySource, PollSummary};
pub use sidecar_drain::{DrainSummary, EnvelopeSource, SidecarDrain};
