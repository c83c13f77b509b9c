//! Embedded one-shot listener.
//!
//! Accepts Slack Events API POSTs on any path. The gate behind it is opened
//! with an accept budget of one: once an event is accepted the server
//! finishes in-flight requests and stops.

use crate::state::AppState;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use kanau::processor::Processor;
use serde::Serialize;
use slack_ingest_core::filter::{Decision, DropReason};
use slack_ingest_core::intake::IntakeOutcome;
use slack_ingest_sdk::objects::RawEnvelope;
use slack_ingest_sdk::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Build the listener router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check).post(receive_event))
        .route("/", post(receive_event).fallback(not_found))
        .route("/{*path}", post(receive_event).fallback(not_found))
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// Handle one Events API delivery.
///
/// Signature failures answer 200 with an empty body so Slack does not
/// retry a request that will never verify; unparseable bodies answer 400.
async fn receive_event(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let envelope = RawEnvelope {
        seq: None,
        body,
        signature: header_value(&headers, SIGNATURE_HEADER),
        timestamp: header_value(&headers, TIMESTAMP_HEADER),
    };

    let outcome = state
        .intake
        .process(envelope)
        .await
        .unwrap_or_else(|never| match never {});

    match outcome {
        IntakeOutcome::Challenge(challenge) => {
            ([(header::CONTENT_TYPE, "text/plain")], challenge).into_response()
        }
        IntakeOutcome::Decided(Decision::Drop(DropReason::MalformedEnvelope)) => {
            StatusCode::BAD_REQUEST.into_response()
        }
        IntakeOutcome::Decided(_) | IntakeOutcome::Ignored => StatusCode::OK.into_response(),
    }
}

/// Run the listener until an event is accepted or shutdown is requested.
pub async fn run_listener(
    router: Router,
    addr: SocketAddr,
    mut closed_rx: watch::Receiver<bool>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listener accepting Slack events on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = closed_rx.wait_for(|closed| *closed) => {
                    tracing::info!("Event accepted, shutting down listener");
                }
                _ = shutdown_rx.wait_for(|shutdown| *shutdown) => {
                    tracing::info!("Listener received shutdown signal");
                }
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use slack_ingest_core::filter::SelfIdentity;
    use slack_ingest_core::gate::{IngestGate, Origin};
    use slack_ingest_core::intake::EnvelopeIntake;
    use slack_ingest_core::sink::EventSink;
    use slack_ingest_core::state::{IngestState, RetentionPolicy};
    use slack_ingest_core::store::StateStore;
    use slack_ingest_core::verifier::SignatureVerifier;
    use slack_ingest_sdk::objects::OutputEvent;
    use slack_ingest_sdk::signature::sign;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    const SECRET: &str = "listener-secret";

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<OutputEvent>>>);

    impl EventSink for SharedSink {
        fn emit(&mut self, event: &OutputEvent) -> std::io::Result<()> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Harness {
        router: Router,
        gate: IngestGate,
        sink: SharedSink,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(
            dir.path().join("watermark"),
            dir.path().join("seen-ids"),
            RetentionPolicy::default(),
        );
        let sink = SharedSink::default();
        let gate = IngestGate::new(
            SelfIdentity::new(Some("B0SELF".into()), None),
            IngestState::new(RetentionPolicy::default()),
            store,
            Box::new(sink.clone()),
            Some(1),
        );
        let intake = EnvelopeIntake::new(
            SignatureVerifier::new(Some(SECRET)),
            gate.clone(),
            Origin::Webhook,
        );
        Harness {
            router: build_router(AppState::new(intake)),
            gate,
            sink,
            _dir: dir,
        }
    }

    fn post(path: &str, body: &str, signature: &str, ts: i64) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(TIMESTAMP_HEADER, ts.to_string())
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    fn signed_post(path: &str, body: &str) -> Request<Body> {
        let ts = time::OffsetDateTime::now_utc().unix_timestamp();
        post(path, body, &sign(body.as_bytes(), ts, SECRET.as_bytes()), ts)
    }

    fn message_body(ts: &str) -> String {
        serde_json::json!({
            "type": "event_callback",
            "event": {
                "type": "message",
                "user": "U1",
                "text": "hello",
                "ts": ts,
                "channel": "C1",
            }
        })
        .to_string()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_url_verification_echo() {
        let h = harness();
        let response = h
            .router
            .oneshot(signed_post(
                "/slack/events",
                r#"{"type":"url_verification","challenge":"abc123","token":"x"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        assert_eq!(body_string(response).await, "abc123");
        assert!(h.sink.0.lock().unwrap().is_empty());
        assert!(!h.gate.is_closed());
    }

    #[tokio::test]
    async fn test_bad_signature_dropped() {
        let h = harness();
        let ts = time::OffsetDateTime::now_utc().unix_timestamp();
        let request = post("/", &message_body("100.1"), "v0=deadbeef", ts);

        let response = h.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.is_empty());
        assert!(h.sink.0.lock().unwrap().is_empty());
        assert!(!h.gate.watermark().await.is_set());
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let h = harness();
        let response = h.router.oneshot(signed_post("/", "{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_channel_created_answers_ok() {
        let h = harness();
        let body = serde_json::json!({
            "type": "event_callback",
            "event": {
                "type": "channel_created",
                "channel": {"id": "C2", "name": "new-channel", "creator": "U1"},
                "event_ts": "1700000000.000400"
            }
        })
        .to_string();

        let response = h.router.oneshot(signed_post("/", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(h.sink.0.lock().unwrap().is_empty());
        assert!(!h.gate.is_closed());
    }

    #[tokio::test]
    async fn test_first_accept_closes_gate() {
        let h = harness();
        let response = h
            .router
            .clone()
            .oneshot(signed_post("/events", &message_body("100.1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(h.gate.is_closed());

        let response = h
            .router
            .oneshot(signed_post("/events", &message_body("100.2")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let emitted = h.sink.0.lock().unwrap().clone();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].ts, "100.1");
    }

    #[tokio::test]
    async fn test_get_is_not_found() {
        let h = harness();
        let request = Request::builder()
            .method(Method::GET)
            .uri("/slack/events")
            .body(Body::empty())
            .unwrap();
        let response = h.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = h.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
