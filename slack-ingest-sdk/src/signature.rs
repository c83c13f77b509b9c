//! Slack request signing and verification.
//!
//! Slack signs every Events API delivery with HMAC-SHA256 over a versioned
//! base string:
//!
//! ```text
//! X-Slack-Request-Timestamp: {unix_timestamp}
//! X-Slack-Signature:         v0={hex(HMAC-SHA256("v0:{timestamp}:{raw_body}", signing_secret))}
//! ```
//!
//! Verification compares in constant time (`ring::hmac::verify`) and
//! rejects timestamps outside [`MAX_SIGNATURE_AGE`] in either direction.

/// Header name for the request signature.
pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";

/// Header name for the request timestamp.
pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";

/// Version prefix of the signature base string and header value.
pub const SIGNATURE_VERSION: &str = "v0";

/// Maximum allowed skew between the request timestamp and now (in seconds).
pub const MAX_SIGNATURE_AGE: i64 = 5 * 60;

/// Errors produced by signature operations.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingSignature,
    #[error("missing timestamp header")]
    MissingTimestamp,
    #[error("invalid header format")]
    InvalidFormat,
    #[error("invalid hex encoding")]
    InvalidHex,
    #[error("invalid signature")]
    SignatureMismatch,
    #[error("signature expired")]
    Expired,
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

fn base_string(timestamp: i64, body: &[u8]) -> Vec<u8> {
    let prefix = format!("{SIGNATURE_VERSION}:{timestamp}:");
    let mut data = Vec::with_capacity(prefix.len() + body.len());
    data.extend_from_slice(prefix.as_bytes());
    data.extend_from_slice(body);
    data
}

/// Compute the `X-Slack-Signature` header value for `body` at `timestamp`.
pub fn sign(body: &[u8], timestamp: i64, secret: &[u8]) -> String {
    let tag = ring::hmac::sign(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret),
        &base_string(timestamp, body),
    );
    format_signature_header(tag.as_ref())
}

/// Format a `v0={hex}` header value from raw signature bytes.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("{SIGNATURE_VERSION}={}", hex::encode(signature))
}

/// Parse a `v0={hex}` header value into the raw signature bytes.
pub fn parse_signature_header(value: &str) -> Result<Vec<u8>, SignatureError> {
    let (version, encoded) = value
        .trim()
        .split_once('=')
        .ok_or(SignatureError::InvalidFormat)?;
    if version != SIGNATURE_VERSION {
        return Err(SignatureError::InvalidFormat);
    }
    hex::decode(encoded).map_err(|_| SignatureError::InvalidHex)
}

/// Parse the `X-Slack-Request-Timestamp` header value.
pub fn parse_timestamp_header(value: &str) -> Result<i64, SignatureError> {
    value
        .trim()
        .parse()
        .map_err(|_| SignatureError::InvalidFormat)
}

/// Check that `timestamp` lies within [`MAX_SIGNATURE_AGE`] of `now`.
pub fn check_timestamp(timestamp: i64, now: i64) -> Result<(), SignatureError> {
    if now.abs_diff(timestamp) > MAX_SIGNATURE_AGE.unsigned_abs() {
        return Err(SignatureError::Expired);
    }
    Ok(())
}

/// Verify a Slack request against the current wall clock.
pub fn verify(
    body: &[u8],
    signature_header: Option<&str>,
    timestamp_header: Option<&str>,
    secret: &[u8],
) -> Result<(), SignatureError> {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    verify_at(body, signature_header, timestamp_header, secret, now)
}

/// Verify a Slack request as of `now` (unix seconds).
///
/// The HMAC is checked before the timestamp window so that an expired but
/// otherwise valid request and a forged one take the same path through
/// the constant-time comparison.
pub fn verify_at(
    body: &[u8],
    signature_header: Option<&str>,
    timestamp_header: Option<&str>,
    secret: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let signature_header = signature_header.ok_or(SignatureError::MissingSignature)?;
    let timestamp_header = timestamp_header.ok_or(SignatureError::MissingTimestamp)?;
    let timestamp = parse_timestamp_header(timestamp_header)?;
    let signature = parse_signature_header(signature_header)?;

    ring::hmac::verify(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret),
        &base_string(timestamp, body),
        &signature,
    )?;
    check_timestamp(timestamp, now)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"8f742231b10e8888abcd99yyyzzz85a5";
    const BODY: &[u8] = br#"{"type":"event_callback","event":{"type":"message","text":"hi"}}"#;

    #[test]
    fn test_sign_then_verify() {
        let now = 1_700_000_000;
        let header = sign(BODY, now, SECRET);
        assert!(header.starts_with("v0="));
        assert_eq!(header.len(), 3 + 64);
        let ts = now.to_string();
        assert!(verify_at(BODY, Some(&header), Some(&ts), SECRET, now + 10).is_ok());
    }

    #[test]
    fn test_known_vector() {
        // Worked example from Slack's request signing documentation.
        let body = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&team_domain=testteamnow&channel_id=G8PSS9T3V&channel_name=foobar&user_id=U2CERLKJA&user_name=roadrunner&command=%2Fwebhook-collect&text=&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2FT1DC2JH3J%2F397700885554%2F96rGlfmibIGlgcZRskXaIFfN&trigger_id=398738663015.47445629121.803a0bc887a14d10d2c447fce8b6703c";
        let header = "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503";
        assert!(verify_at(body, Some(header), Some("1531420618"), SECRET, 1531420618).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let now = 1_700_000_000;
        let header = sign(BODY, now, SECRET);
        let ts = now.to_string();
        let result = verify_at(b"{\"type\":\"other\"}", Some(&header), Some(&ts), SECRET, now);
        assert!(matches!(result, Err(SignatureError::SignatureMismatch)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = 1_700_000_000;
        let header = sign(BODY, now, b"other-secret");
        let ts = now.to_string();
        let result = verify_at(BODY, Some(&header), Some(&ts), SECRET, now);
        assert!(matches!(result, Err(SignatureError::SignatureMismatch)));
    }

    #[test]
    fn test_expired_timestamp_rejected() {
        let signed_at = 1_700_000_000;
        let header = sign(BODY, signed_at, SECRET);
        let ts = signed_at.to_string();
        let result = verify_at(
            BODY,
            Some(&header),
            Some(&ts),
            SECRET,
            signed_at + MAX_SIGNATURE_AGE + 1,
        );
        assert!(matches!(result, Err(SignatureError::Expired)));

        // Far-future timestamps are rejected as well.
        let result = verify_at(
            BODY,
            Some(&header),
            Some(&ts),
            SECRET,
            signed_at - MAX_SIGNATURE_AGE - 1,
        );
        assert!(matches!(result, Err(SignatureError::Expired)));
    }

    #[test]
    fn test_missing_and_malformed_headers() {
        let now = 1_700_000_000;
        let header = sign(BODY, now, SECRET);
        let ts = now.to_string();

        assert!(matches!(
            verify_at(BODY, None, Some(&ts), SECRET, now),
            Err(SignatureError::MissingSignature)
        ));
        assert!(matches!(
            verify_at(BODY, Some(&header), None, SECRET, now),
            Err(SignatureError::MissingTimestamp)
        ));
        assert!(matches!(
            verify_at(BODY, Some(&header), Some("yesterday"), SECRET, now),
            Err(SignatureError::InvalidFormat)
        ));
        assert!(matches!(
            verify_at(BODY, Some("v1=abcd"), Some(&ts), SECRET, now),
            Err(SignatureError::InvalidFormat)
        ));
        assert!(matches!(
            verify_at(BODY, Some("v0=not-hex"), Some(&ts), SECRET, now),
            Err(SignatureError::InvalidHex)
        ));
    }

    #[test]
    fn test_extreme_timestamps_expire() {
        let now = 1_700_000_000;
        assert!(matches!(
            check_timestamp(i64::MIN, now),
            Err(SignatureError::Expired)
        ));
        assert!(matches!(
            check_timestamp(i64::MAX, now),
            Err(SignatureError::Expired)
        ));
        assert!(check_timestamp(now - MAX_SIGNATURE_AGE, now).is_ok());
    }
}
