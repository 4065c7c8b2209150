//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::{Arc, OnceLock};

use oobwatch_client::{InteractionClient, MemoryInteractionServer, ServerConfig};
use oobwatch_core::{ClientIdentity, RsaPrivateKey, RSA_KEY_BITS};

/// Host used by fixtures unless told otherwise.
pub const TEST_HOST: &str = "oast.test";

/// A process-wide RSA key.
///
/// Generating 2048-bit keys is slow, so tests share one. Every identity built
/// from it still gets its own correlation id and secret key.
pub fn shared_private_key() -> RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| {
        RsaPrivateKey::new(&mut rand::thread_rng(), RSA_KEY_BITS)
            .expect("test key generation failed")
    })
    .clone()
}

/// A fresh identity for `host` around the shared key.
pub fn identity(host: &str) -> ClientIdentity {
    ClientIdentity::from_private_key(host, shared_private_key())
        .expect("identity from shared key")
}

/// A client wired to an in-memory interaction server.
pub struct TestFixture {
    pub server: Arc<MemoryInteractionServer>,
    pub config: ServerConfig,
}

impl TestFixture {
    /// Create a fixture for [`TEST_HOST`].
    pub fn new() -> Self {
        Self::with_config(ServerConfig::for_host(TEST_HOST))
    }

    /// Create a fixture for a custom configuration.
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            server: MemoryInteractionServer::new(config.host.clone()),
            config,
        }
    }

    /// Build a client talking to this fixture's server.
    pub fn client(&self) -> InteractionClient<Arc<MemoryInteractionServer>> {
        InteractionClient::with_identity(
            self.config.clone(),
            self.server.clone(),
            identity(&self.config.host),
        )
        .expect("fixture client")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// An HTTP interaction record as the server produces it.
pub fn http_record(unique_id: &str) -> String {
    serde_json::json!({
        "protocol": "http",
        "unique-id": unique_id,
        "full-id": unique_id,
        "raw-request": format!("GET /{unique_id} HTTP/1.1\r\nHost: {unique_id}.{TEST_HOST}\r\n\r\n"),
        "raw-response": "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n",
        "remote-address": "203.0.113.10",
        "timestamp": "2024-05-01T12:00:00.000000000Z"
    })
    .to_string()
}

/// A DNS interaction record.
pub fn dns_record(unique_id: &str, q_type: &str) -> String {
    serde_json::json!({
        "protocol": "dns",
        "unique-id": unique_id,
        "full-id": unique_id,
        "q-type": q_type,
        "raw-request": ";; opcode: QUERY, status: NOERROR",
        "raw-response": ";; opcode: QUERY, status: NOERROR",
        "remote-address": "198.51.100.53",
        "timestamp": "2024-05-01T12:00:01.000000000Z"
    })
    .to_string()
}

/// An SMTP interaction record.
pub fn smtp_record(unique_id: &str, from: &str) -> String {
    serde_json::json!({
        "protocol": "smtp",
        "unique-id": unique_id,
        "full-id": unique_id,
        "raw-request": format!("MAIL FROM:<{from}>\r\n"),
        "smtp-from": from,
        "remote-address": "192.0.2.25",
        "timestamp": "2024-05-01T12:00:02.000000000Z"
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oobwatch_core::InteractionEntry;

    #[test]
    fn test_sample_records_parse() {
        let http = InteractionEntry::parse(http_record("h1")).unwrap();
        assert!(http.is_http());
        assert!(http.http_request().is_some());

        let dns = InteractionEntry::parse(dns_record("d1", "AAAA")).unwrap();
        assert_eq!(dns.q_type(), Some("AAAA"));
        assert!(dns.http_request().is_none());

        let smtp = InteractionEntry::parse(smtp_record("s1", "a@b.test")).unwrap();
        assert_eq!(smtp.smtp_from(), Some("a@b.test"));
    }

    #[test]
    fn test_identities_share_key_not_ids() {
        let a = identity(TEST_HOST);
        let b = identity(TEST_HOST);
        assert_eq!(a.public_key(), b.public_key());
        assert_ne!(a.correlation_id(), b.correlation_id());
    }

    #[tokio::test]
    async fn test_fixture_client_registers() {
        let fixture = TestFixture::new();
        let mut client = fixture.client();
        client.register().await.unwrap();
        assert!(fixture.server.is_registered(client.correlation_id()));
    }
}
