//! slack-ingest
//!
//! Turns Slack Events API deliveries into a deduplicated NDJSON stream on
//! stdout. Logs go to stderr.

mod config;
mod pipeline;
mod server;
mod shutdown;
mod state;

use clap::{Parser, Subcommand};
use config::{CliSettings, ConfigLoader};
use server::{build_router, run_listener};
use shutdown::spawn_shutdown_forwarder;
use slack_ingest_core::gate::{IngestGate, Origin};
use slack_ingest_core::intake::EnvelopeIntake;
use slack_ingest_core::sink::NdjsonSink;
use slack_ingest_core::store::StateStore;
use slack_ingest_core::utils::clock::unix_now;
use slack_ingest_core::verifier::SignatureVerifier;
use state::AppState;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Slack event ingestion adapter
#[derive(Parser, Debug)]
#[command(name = "slack-ingest")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to an optional TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    settings: CliSettings,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Mode {
    /// Drain the sidecar buffer indefinitely (default)
    Drain,
    /// Receive webhooks directly and exit after the first accepted event
    Listen {
        /// Port to listen on
        #[arg(long, env = "SLACK_LISTEN_PORT")]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();
    let mode = args.mode.unwrap_or(Mode::Drain);

    tracing::info!("Starting slack-ingest v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut cli = args.settings;
    if let Mode::Listen { port } = mode {
        cli.listen_port = port;
    }
    let settings = ConfigLoader::new(args.config.as_deref(), cli)
        .load()
        .map_err(|e| {
            tracing::error!("Failed to load configuration: {}", e);
            e
        })?;
    tracing::debug!(?settings, "Configuration loaded");

    let verifier = SignatureVerifier::new(settings.signing_secret.as_deref());
    if !verifier.is_enabled() {
        tracing::warn!("SLACK_SIGNING_SECRET not set, signature verification disabled");
    }
    if settings.identity.is_empty() {
        tracing::warn!("No bot identity configured, own messages will not be filtered");
    }

    // Load persisted state
    let store = StateStore::new(
        &settings.watermark_file,
        &settings.seen_ids_file,
        settings.retention,
    );
    let state = store.load(unix_now());
    tracing::info!(
        watermark = ?state.watermark.get().map(|ts| ts.as_str()),
        seen_ids = state.seen_ids.len(),
        "Ingest state ready"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_shutdown_forwarder(shutdown_tx);

    let sink = Box::new(NdjsonSink::stdout());
    match mode {
        Mode::Drain => {
            let gate = IngestGate::new(settings.identity.clone(), state, store, sink, None);
            pipeline::run_drain(&settings, gate, verifier, shutdown_rx).await?;
        }
        Mode::Listen { .. } => {
            let gate = IngestGate::new(settings.identity.clone(), state, store, sink, Some(1));
            let closed_rx = gate.closed();
            let intake = EnvelopeIntake::new(verifier, gate, Origin::Webhook);
            let router = build_router(AppState::new(intake));
            let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, settings.listen_port));
            run_listener(router, addr, closed_rx, shutdown_rx).await?;
        }
    }

    tracing::info!("slack-ingest shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber with environment-based filtering.
///
/// Everything goes to stderr; stdout carries only the event stream.
/// `LOG_FORMAT=json` switches to one JSON object per log line.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_modes() {
        let args = Args::try_parse_from(["slack-ingest", "listen", "--port", "8123"]).unwrap();
        assert!(matches!(args.mode, Some(Mode::Listen { port: Some(8123) })));

        let args = Args::try_parse_from([
            "slack-ingest",
            "--bot-id",
            "B1",
            "--config",
            "/etc/slack-ingest.toml",
        ])
        .unwrap();
        assert!(args.mode.is_none());
        assert_eq!(args.settings.bot_id.as_deref(), Some("B1"));
        assert_eq!(args.config, Some(PathBuf::from("/etc/slack-ingest.toml")));
    }
}
