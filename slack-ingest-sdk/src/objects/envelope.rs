//! Raw webhook deliveries, before verification and parsing.

use bytes::Bytes;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};

/// One raw webhook delivery: the body exactly as received plus the
/// signature fields needed to authenticate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEnvelope {
    /// Arrival sequence number assigned by the buffer, when known.
    pub seq: Option<u64>,
    pub body: Bytes,
    pub signature: Option<String>,
    pub timestamp: Option<String>,
}

/// A delivery as stored by the sidecar buffer and returned from its
/// `/events` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferedEnvelope {
    #[serde(default, alias = "id", skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(default)]
    pub source: CompactString,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: EnvelopeBody,
}

/// The stored request body. The sidecar normally keeps the raw string, but
/// older buffers store the decoded JSON object instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvelopeBody {
    Raw(String),
    Json(serde_json::Value),
}

impl Default for EnvelopeBody {
    fn default() -> Self {
        Self::Raw(String::new())
    }
}

impl EnvelopeBody {
    /// The body bytes the signature was computed over.
    ///
    /// For a decoded JSON body this is its compact re-serialization, which
    /// only verifies if the sender produced the same encoding.
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Raw(raw) => Bytes::from(raw),
            Self::Json(value) => Bytes::from(value.to_string()),
        }
    }
}

impl BufferedEnvelope {
    /// Look up a stored header, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Convert into a [`RawEnvelope`] ready for verification.
    pub fn into_raw(self) -> RawEnvelope {
        let signature = self.header(SIGNATURE_HEADER).map(str::to_owned);
        let timestamp = self.header(TIMESTAMP_HEADER).map(str::to_owned);
        RawEnvelope {
            seq: self.seq,
            body: self.body.into_bytes(),
            signature,
            timestamp,
        }
    }
}
