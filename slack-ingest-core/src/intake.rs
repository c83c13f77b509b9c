//! Signed-envelope handling shared by the listener and the sidecar drain.

use kanau::processor::Processor;
use slack_ingest_sdk::objects::{EventEnvelope, RawEnvelope};
use std::convert::Infallible;
use tracing::{debug, warn};

use crate::filter::{Decision, DropReason};
use crate::gate::{IngestGate, IngestInput, Origin};
use crate::verifier::SignatureVerifier;

/// What became of one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// A `url_verification` handshake; the challenge must be echoed back.
    Challenge(String),
    /// An event went through the gate (or was rejected before it).
    Decided(Decision),
    /// A well-formed envelope of a type that carries no event.
    Ignored,
}

impl IntakeOutcome {
    pub fn is_accept(&self) -> bool {
        matches!(self, IntakeOutcome::Decided(decision) if decision.is_accept())
    }
}

/// Verifies, parses and dispatches raw envelopes.
#[derive(Debug, Clone)]
pub struct EnvelopeIntake {
    verifier: SignatureVerifier,
    gate: IngestGate,
    origin: Origin,
}

impl EnvelopeIntake {
    pub fn new(verifier: SignatureVerifier, gate: IngestGate, origin: Origin) -> Self {
        Self {
            verifier,
            gate,
            origin,
        }
    }

    pub fn gate(&self) -> &IngestGate {
        &self.gate
    }
}

impl Processor<RawEnvelope> for EnvelopeIntake {
    type Output = IntakeOutcome;
    type Error = Infallible;

    async fn process(&self, envelope: RawEnvelope) -> Result<IntakeOutcome, Infallible> {
        if !self.verifier.verify(&envelope) {
            return Ok(IntakeOutcome::Decided(Decision::Drop(
                DropReason::InvalidSignature,
            )));
        }

        let parsed = match EventEnvelope::from_slice(&envelope.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(
                    origin = %self.origin,
                    seq = ?envelope.seq,
                    error = %e,
                    "Dropping malformed envelope"
                );
                return Ok(IntakeOutcome::Decided(Decision::Drop(
                    DropReason::MalformedEnvelope,
                )));
            }
        };

        match parsed {
            EventEnvelope::UrlVerification { challenge, .. } => {
                debug!(origin = %self.origin, "Answering url_verification");
                Ok(IntakeOutcome::Challenge(challenge))
            }
            EventEnvelope::EventCallback(callback) => {
                let decision = self
                    .gate
                    .process(IngestInput {
                        event: callback.event,
                        origin: self.origin,
                    })
                    .await?;
                Ok(IntakeOutcome::Decided(decision))
            }
            EventEnvelope::Other => {
                debug!(origin = %self.origin, seq = ?envelope.seq, "Ignoring non-event envelope");
                Ok(IntakeOutcome::Ignored)
            }
        }
    }
}
