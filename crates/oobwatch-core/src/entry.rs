//! Decoded interaction records.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Record shape produced by the interaction server.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawInteraction {
    protocol: String,
    #[serde(default)]
    unique_id: String,
    #[serde(default)]
    full_id: Option<String>,
    #[serde(default)]
    q_type: Option<String>,
    #[serde(default)]
    raw_request: Option<String>,
    #[serde(default)]
    raw_response: Option<String>,
    #[serde(default)]
    smtp_from: Option<String>,
    #[serde(default)]
    remote_address: String,
    #[serde(default)]
    timestamp: String,
}

/// One observed network interaction.
///
/// Built only from a successfully decrypted record and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionEntry {
    protocol: String,
    unique_id: String,
    full_id: Option<String>,
    q_type: Option<String>,
    smtp_from: Option<String>,
    source_address: String,
    timestamp: String,
    details: String,
    #[serde(skip)]
    http_request: Option<Vec<u8>>,
    #[serde(skip)]
    http_response: Option<Vec<u8>>,
}

impl InteractionEntry {
    /// Parse a decrypted record. `details` keeps the record text verbatim.
    pub fn parse(details: impl Into<String>) -> Result<Self> {
        let details = details.into();
        let raw: RawInteraction = serde_json::from_str(&details)
            .map_err(|e| CoreError::Parse(format!("malformed interaction record: {e}")))?;

        let protocol = raw.protocol.trim().to_ascii_lowercase();
        if protocol.is_empty() {
            return Err(CoreError::Parse("interaction record has no protocol".into()));
        }

        let is_http = matches!(protocol.as_str(), "http" | "https");
        let (http_request, http_response) = if is_http {
            (
                raw.raw_request.map(String::into_bytes),
                raw.raw_response.map(String::into_bytes),
            )
        } else {
            (None, None)
        };

        Ok(Self {
            protocol,
            unique_id: raw.unique_id,
            full_id: raw.full_id.filter(|s| !s.is_empty()),
            q_type: raw.q_type.filter(|s| !s.is_empty()),
            smtp_from: raw.smtp_from.filter(|s| !s.is_empty()),
            source_address: raw.remote_address,
            timestamp: raw.timestamp,
            details,
            http_request,
            http_response,
        })
    }

    /// Lowercase protocol name (`http`, `dns`, `smtp`, ...).
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Per-interaction identifier.
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Full queried name, when the server reports one.
    pub fn full_id(&self) -> Option<&str> {
        self.full_id.as_deref()
    }

    /// DNS query type for DNS interactions.
    pub fn q_type(&self) -> Option<&str> {
        self.q_type.as_deref()
    }

    /// Envelope sender for SMTP interactions.
    pub fn smtp_from(&self) -> Option<&str> {
        self.smtp_from.as_deref()
    }

    /// Remote address the interaction came from.
    pub fn source_address(&self) -> &str {
        &self.source_address
    }

    /// Server-side timestamp, as reported.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// The decrypted record text.
    pub fn details(&self) -> &str {
        &self.details
    }

    /// True for `http` and `https` interactions.
    pub fn is_http(&self) -> bool {
        matches!(self.protocol.as_str(), "http" | "https")
    }

    /// Raw request bytes of an HTTP interaction.
    pub fn http_request(&self) -> Option<&[u8]> {
        self.http_request.as_deref()
    }

    /// Raw response bytes of an HTTP interaction.
    pub fn http_response(&self) -> Option<&[u8]> {
        self.http_response.as_deref()
    }
}
