//! SidecarDrain processor.
//!
//! The SidecarDrain is responsible for:
//! - Long-polling the sidecar buffer for stored webhook deliveries
//! - Rejecting envelopes filed under another source tag
//! - Handing each envelope, in order, to the [`EnvelopeIntake`]
//! - Backing off exponentially while the sidecar is unreachable

use async_trait::async_trait;
use kanau::processor::Processor;
use slack_ingest_sdk::client::{ClientError, SidecarClient};
use slack_ingest_sdk::objects::BufferedEnvelope;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::filter::DropReason;
use crate::intake::{EnvelopeIntake, IntakeOutcome};
use crate::utils::Backoff;

/// Anything that can hand out buffered webhook deliveries.
#[async_trait]
pub trait EnvelopeSource: Send + Sync {
    /// Fetch every delivery buffered since the previous call.
    async fn fetch(&self) -> Result<Vec<BufferedEnvelope>, ClientError>;

    /// Source tag the deliveries are expected to carry.
    fn source_tag(&self) -> &str;
}

#[async_trait]
impl EnvelopeSource for SidecarClient {
    async fn fetch(&self) -> Result<Vec<BufferedEnvelope>, ClientError> {
        self.drain().await
    }

    fn source_tag(&self) -> &str {
        self.source()
    }
}

/// Counts from one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub received: usize,
    pub accepted: usize,
    pub dropped: usize,
}

pub struct SidecarDrain<S> {
    source: S,
    intake: EnvelopeIntake,
    backoff: Backoff,
}

impl<S: EnvelopeSource> SidecarDrain<S> {
    pub fn new(source: S, intake: EnvelopeIntake) -> Self {
        Self::with_backoff(source, intake, Backoff::default())
    }

    pub fn with_backoff(source: S, intake: EnvelopeIntake, backoff: Backoff) -> Self {
        Self {
            source,
            intake,
            backoff,
        }
    }

    /// Fetch once and process everything returned.
    pub async fn drain_once(&self) -> Result<DrainSummary, ClientError> {
        let envelopes = self.source.fetch().await?;
        Ok(self.process_batch(envelopes).await)
    }

    /// Process a fetched batch in order. The sidecar has already released
    /// these envelopes, so the batch always runs to the end.
    async fn process_batch(&self, envelopes: Vec<BufferedEnvelope>) -> DrainSummary {
        let mut summary = DrainSummary {
            received: envelopes.len(),
            ..Default::default()
        };

        for envelope in envelopes {
            if !envelope.source.is_empty() && envelope.source != self.source.source_tag() {
                debug!(
                    seq = ?envelope.seq,
                    source = %envelope.source,
                    reason = %DropReason::ForeignSource,
                    "Dropped envelope"
                );
                summary.dropped += 1;
                continue;
            }

            let outcome = self
                .intake
                .process(envelope.into_raw())
                .await
                .unwrap_or_else(|never| match never {});
            match outcome {
                IntakeOutcome::Decided(decision) if decision.is_accept() => summary.accepted += 1,
                IntakeOutcome::Decided(_) => summary.dropped += 1,
                IntakeOutcome::Challenge(_) | IntakeOutcome::Ignored => {}
            }
        }

        summary
    }

    /// Run the drain loop until shutdown.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(source = self.source.source_tag(), "SidecarDrain started");

        loop {
            let result = tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("SidecarDrain received shutdown signal");
                        break;
                    }
                    continue;
                }

                result = self.source.fetch() => result,
            };

            match result {
                Ok(envelopes) => {
                    let summary = self.process_batch(envelopes).await;
                    self.backoff.on_success();
                    if summary.received > 0 {
                        debug!(
                            received = summary.received,
                            accepted = summary.accepted,
                            dropped = summary.dropped,
                            "Drained sidecar"
                        );
                    }
                }
                Err(e) => {
                    let delay = self.backoff.on_failure();
                    warn!(
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Failed to drain sidecar"
                    );
                    tokio::select! {
                        biased;

                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                info!("SidecarDrain received shutdown signal");
                                break;
                            }
                        }

                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!("SidecarDrain shutdown complete");
    }
}
