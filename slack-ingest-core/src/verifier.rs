use slack_ingest_sdk::objects::RawEnvelope;
use slack_ingest_sdk::signature::{self, SignatureError};
use tracing::{debug, warn};

use crate::utils::clock::unix_now;

/// Checks request signatures against the configured signing secret.
///
/// Without a secret every envelope passes.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Option<Box<[u8]>>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl SignatureVerifier {
    pub fn new(secret: Option<&str>) -> Self {
        let secret = secret
            .filter(|s| !s.is_empty())
            .map(|s| s.as_bytes().to_vec().into_boxed_slice());
        Self { secret }
    }

    pub fn disabled() -> Self {
        Self { secret: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Verify `envelope` against the current wall clock.
    pub fn verify(&self, envelope: &RawEnvelope) -> bool {
        self.verify_at(
            &envelope.body,
            envelope.signature.as_deref(),
            envelope.timestamp.as_deref(),
            unix_now(),
        )
    }

    pub fn verify_at(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
        timestamp_header: Option<&str>,
        now: i64,
    ) -> bool {
        let Some(secret) = &self.secret else {
            return true;
        };
        match signature::verify_at(body, signature_header, timestamp_header, secret, now) {
            Ok(()) => true,
            Err(SignatureError::Expired) => {
                warn!(
                    timestamp = timestamp_header.unwrap_or_default(),
                    now, "Rejected envelope outside the replay window"
                );
                false
            }
            Err(e) => {
                warn!("Rejected envelope with invalid signature");
                debug!(error = %e, "Signature check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const NOW: i64 = 1_700_000_000;

    fn signed(body: &[u8], ts: i64) -> String {
        signature::sign(body, ts, SECRET.as_bytes())
    }

    #[test]
    fn test_disabled_accepts_anything() {
        let verifier = SignatureVerifier::new(None);
        assert!(!verifier.is_enabled());
        assert!(verifier.verify_at(b"{}", None, None, NOW));
        assert!(!SignatureVerifier::new(Some("")).is_enabled());
    }

    #[test]
    fn test_valid_signature() {
        let verifier = SignatureVerifier::new(Some(SECRET));
        let body = br#"{"type":"event_callback"}"#;
        let sig = signed(body, NOW);
        assert!(verifier.verify_at(body, Some(&sig), Some(&NOW.to_string()), NOW + 10));
    }

    #[test]
    fn test_rejections() {
        let verifier = SignatureVerifier::new(Some(SECRET));
        let body = b"payload";
        let sig = signed(body, NOW);
        let ts = NOW.to_string();

        assert!(!verifier.verify_at(b"payload!", Some(&sig), Some(&ts), NOW));
        assert!(!verifier.verify_at(body, None, Some(&ts), NOW));
        assert!(!verifier.verify_at(body, Some(&sig), None, NOW));
        assert!(!verifier.verify_at(body, Some("v0=zz"), Some(&ts), NOW));
        assert!(!verifier.verify_at(body, Some(&sig), Some(&ts), NOW + 301));
        assert!(verifier.verify_at(body, Some(&sig), Some(&ts), NOW + 300));
    }
}
