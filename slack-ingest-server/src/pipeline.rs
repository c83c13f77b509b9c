//! Sidecar-drain mode: the drain loop plus the optional history poller.

use crate::config::runtime::Settings;
use slack_ingest_core::gate::{IngestGate, Origin};
use slack_ingest_core::intake::EnvelopeIntake;
use slack_ingest_core::processors::{HistoryPoller, SidecarDrain};
use slack_ingest_core::state::SlackTs;
use slack_ingest_core::utils::clock::unix_now;
use slack_ingest_core::verifier::SignatureVerifier;
use slack_ingest_sdk::client::{SidecarClient, SlackWebClient};
use tokio::sync::watch;

/// Run the drain loop (and the poller, when configured) until shutdown.
pub async fn run_drain(
    settings: &Settings,
    gate: IngestGate,
    verifier: SignatureVerifier,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let sidecar = SidecarClient::new(settings.sidecar_url.clone(), settings.sidecar_source.clone());
    let intake = EnvelopeIntake::new(verifier, gate.clone(), Origin::Sidecar);

    let poller_handle = match &settings.poll {
        Some(poll) => {
            let client = SlackWebClient::new(poll.token.clone())?;
            let poller = HistoryPoller::new(
                client,
                gate,
                poll.channel.clone(),
                poll.interval,
                poll.limit,
                SlackTs::from_unix(unix_now()),
            );
            Some(tokio::spawn(poller.run(shutdown_rx.clone())))
        }
        None => {
            tracing::info!("History polling disabled");
            None
        }
    };

    let drain_handle = tokio::spawn(SidecarDrain::new(sidecar, intake).run(shutdown_rx));

    drain_handle.await?;
    if let Some(handle) = poller_handle {
        handle.await?;
    }
    Ok(())
}
