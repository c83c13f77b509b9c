//! The single point through which every event reaches the output.
//!
//! Webhook deliveries, sidecar drains and history polls all hand their
//! events to one [`IngestGate`]. The gate holds the state, the store and
//! the sink behind one lock, so classify, emit, apply and persist run as
//! one step and no two sources can both accept the same message.
//!
//! An optional accept budget closes the gate after a fixed number of
//! accepted events; listener mode uses a budget of one.

use kanau::processor::Processor;
use slack_ingest_sdk::objects::{OutputEvent, SlackEvent};
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info};

use crate::filter::{Decision, DropReason, SelfIdentity, classify};
use crate::sink::EventSink;
use crate::state::{IngestState, Watermark};
use crate::store::StateStore;
use crate::utils::clock::unix_now;

/// Where an event entered the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Webhook,
    Sidecar,
    History,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::Webhook => "webhook",
            Origin::Sidecar => "sidecar",
            Origin::History => "history",
        })
    }
}

/// An event handed to the gate.
#[derive(Debug, Clone)]
pub struct IngestInput {
    pub event: SlackEvent,
    pub origin: Origin,
}

struct GateInner {
    state: IngestState,
    store: StateStore,
    sink: Box<dyn EventSink>,
    /// Accepts left before the gate closes; `None` is unlimited.
    remaining: Option<u32>,
}

/// Serializes accept decisions across all event sources.
#[derive(Clone)]
pub struct IngestGate {
    inner: Arc<Mutex<GateInner>>,
    identity: Arc<SelfIdentity>,
    closed_tx: Arc<watch::Sender<bool>>,
}

impl IngestGate {
    /// Create a gate over already-loaded `state`.
    ///
    /// # Arguments
    ///
    /// * `identity` - Ids of this adapter's own bot
    /// * `state` - State loaded from `store`
    /// * `store` - Where state is persisted after every accept
    /// * `sink` - Output for accepted events
    /// * `accept_limit` - Close after this many accepts (`None` for no limit)
    pub fn new(
        identity: SelfIdentity,
        state: IngestState,
        store: StateStore,
        sink: Box<dyn EventSink>,
        accept_limit: Option<u32>,
    ) -> Self {
        let closed = accept_limit == Some(0);
        let (closed_tx, _) = watch::channel(closed);
        Self {
            inner: Arc::new(Mutex::new(GateInner {
                state,
                store,
                sink,
                remaining: accept_limit,
            })),
            identity: Arc::new(identity),
            closed_tx: Arc::new(closed_tx),
        }
    }

    /// Snapshot of the current watermark. The lock is released on return.
    pub async fn watermark(&self) -> Watermark {
        self.inner.lock().await.state.watermark.clone()
    }

    /// Receiver that flips to `true` once the accept budget is used up.
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed_tx.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }
}

impl Processor<IngestInput> for IngestGate {
    type Output = Decision;
    type Error = Infallible;

    async fn process(&self, input: IngestInput) -> Result<Decision, Infallible> {
        let IngestInput { event, origin } = input;
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        if inner.remaining == Some(0) {
            debug!(%origin, "Gate closed, dropping event");
            return Ok(Decision::Drop(DropReason::Closed));
        }

        let decision = classify(&event, &self.identity, &inner.state);
        let acceptance = match &decision {
            Decision::Accept(acceptance) => acceptance.clone(),
            Decision::Drop(reason) => {
                debug!(
                    %origin,
                    %reason,
                    ts = event.decision_ts().unwrap_or_default(),
                    event_type = %event.event_type,
                    "Dropped event"
                );
                return Ok(decision);
            }
        };

        if let Err(e) = inner.sink.emit(&OutputEvent::from(&event)) {
            error!(%origin, error = %e, "Failed to write event to output");
            return Ok(Decision::Drop(DropReason::SinkUnavailable));
        }

        inner.state.apply(&acceptance, unix_now());

        if let Some(remaining) = inner.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                self.closed_tx.send_replace(true);
            }
        }

        if let Err(e) = inner.store.save(&inner.state) {
            error!(error = %e, "Failed to persist ingest state");
        }

        info!(
            %origin,
            ts = %acceptance.ts,
            watermark = %acceptance.watermark,
            channel = event.channel.as_deref().unwrap_or_default(),
            "Accepted event"
        );
        Ok(decision)
    }
}

/// Convenience for feeding a batch of events in order.
pub async fn process_all(
    gate: &IngestGate,
    events: impl IntoIterator<Item = SlackEvent>,
    origin: Origin,
) -> Vec<Decision> {
    let mut decisions = Vec::new();
    for event in events {
        let decision = gate
            .process(IngestInput { event, origin })
            .await
            .unwrap_or_else(|never| match never {});
        decisions.push(decision);
    }
    decisions
}

impl fmt::Debug for IngestGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestGate")
            .field("identity", &self.identity)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
