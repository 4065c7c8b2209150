//! Wire messages exchanged with the interaction server.
//!
//! Field names are fixed by the server and must not change.

use serde::{Deserialize, Serialize};

/// Path of the registration endpoint.
pub const REGISTER_PATH: &str = "/register";
/// Path of the poll endpoint.
pub const POLL_PATH: &str = "/poll";
/// Path of the deregistration endpoint.
pub const DEREGISTER_PATH: &str = "/deregister";

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = "Interact.sh Client";

/// Body of `POST /register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegisterRequest {
    /// Base64 of the PEM-encoded public key.
    pub public_key: String,
    pub secret_key: String,
    pub correlation_id: String,
}

/// Body of `POST /deregister`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeregisterRequest {
    pub correlation_id: String,
    pub secret_key: String,
}

/// Body of a successful `GET /poll`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResponse {
    /// Base64 RSA-OAEP-wrapped symmetric key.
    pub aes_key: String,
    /// Base64 encrypted records; absent or null when nothing was recorded.
    #[serde(default)]
    pub data: Option<Vec<String>>,
}

/// Query path for polling a correlation.
///
/// Correlation ids are base32hex and secrets are UUIDs, so neither needs
/// percent-encoding.
pub fn poll_path(correlation_id: &str, secret_key: &str) -> String {
    format!("{POLL_PATH}?id={correlation_id}&secret={secret_key}")
}
