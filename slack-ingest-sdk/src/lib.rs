//! Shared types for the Slack event ingestion adapter.
//!
//! * [`objects`] – Slack Events API envelopes, sidecar envelopes, history
//!   responses and the NDJSON output record.
//! * [`signature`] – Slack `v0` request signing and verification.
//! * `client` – HTTP clients for the sidecar buffer and the Slack Web API
//!   (behind the `client` feature).

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
pub mod signature;
