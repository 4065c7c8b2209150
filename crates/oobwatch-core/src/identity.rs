//! Per-session client identity.
//!
//! A [`ClientIdentity`] binds one polling session to the interaction server:
//! the correlation id names the session, the secret key authenticates it, and
//! the RSA keypair lets the server wrap a fresh symmetric key on every poll.
//! Identities live only in memory and are never reused across sessions.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::Rng;
use rsa::pkcs8::EncodePublicKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use uuid::Uuid;

use crate::envelope;
use crate::error::{CoreError, Result};

/// RSA modulus size used for session keys.
pub const RSA_KEY_BITS: usize = 2048;

/// Length of the left-most label of an interaction domain.
pub const DOMAIN_LABEL_LEN: usize = 33;

const PEM_LINE_WIDTH: usize = 64;
const PEM_HEADER: &str = "-----BEGIN PUBLIC KEY-----\n";
const PEM_FOOTER: &str = "-----END PUBLIC KEY-----\n";

/// Time-ordered, globally unique session identifier (20 lowercase base32hex chars).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh id.
    pub fn generate() -> Self {
        Self(xid::new().to_string())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CorrelationId({})", self.0)
    }
}

/// Random session token authenticating poll and deregister requests.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(String);

impl SecretKey {
    /// Generate a fresh v4 UUID token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Identity of one client session.
pub struct ClientIdentity {
    correlation_id: CorrelationId,
    secret_key: SecretKey,
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    public_key_export: String,
    host: String,
}

impl ClientIdentity {
    /// Generate a new identity for a session against `host`.
    ///
    /// Creates a 2048-bit RSA keypair, a correlation id and a secret key.
    /// Key generation failure is fatal for the session.
    pub fn generate(host: impl Into<String>) -> Result<Self> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
            .map_err(|e| CoreError::KeyGeneration(e.to_string()))?;
        Self::from_private_key(host, private_key)
    }

    /// Build an identity around an existing private key.
    ///
    /// The correlation id and secret key are still freshly generated.
    pub fn from_private_key(host: impl Into<String>, private_key: RsaPrivateKey) -> Result<Self> {
        let public_key = RsaPublicKey::from(&private_key);
        let pem = public_key_pem(&public_key)?;

        Ok(Self {
            correlation_id: CorrelationId::generate(),
            secret_key: SecretKey::generate(),
            private_key,
            public_key,
            public_key_export: STANDARD.encode(pem.as_bytes()),
            host: host.into(),
        })
    }

    /// The session's correlation id.
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// The session's secret key.
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// The RSA public key.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Host the interaction domain is derived for.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Base64 of the PEM-encoded SPKI public key, as sent to `/register`.
    pub fn public_key_export(&self) -> &str {
        &self.public_key_export
    }

    /// Derive an interaction domain: the correlation id right-padded with
    /// random lowercase letters to 33 characters, then `"." + host`.
    ///
    /// The padding is drawn fresh on every call.
    pub fn interaction_domain(&self) -> String {
        let mut rng = rand::thread_rng();
        let mut domain = String::with_capacity(DOMAIN_LABEL_LEN + 1 + self.host.len());
        domain.push_str(self.correlation_id.as_str());
        while domain.len() < DOMAIN_LABEL_LEN {
            domain.push(char::from(rng.gen_range(b'a'..=b'z')));
        }
        domain.push('.');
        domain.push_str(&self.host);
        domain
    }

    /// Unwrap a server-wrapped symmetric key with this identity's private key.
    pub fn unwrap_key(&self, wrapped_key_b64: &str) -> Result<Vec<u8>> {
        envelope::unwrap_key(wrapped_key_b64, &self.private_key)
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("correlation_id", &self.correlation_id)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

/// PEM-encode an SPKI public key with 64-character base64 lines.
pub fn public_key_pem(public_key: &RsaPublicKey) -> Result<String> {
    let der = public_key
        .to_public_key_der()
        .map_err(|e| CoreError::Encoding(e.to_string()))?;
    let body = STANDARD.encode(der.as_bytes());

    let mut pem = String::with_capacity(PEM_HEADER.len() + body.len() * 65 / 64 + PEM_FOOTER.len() + 1);
    pem.push_str(PEM_HEADER);
    for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        let line = std::str::from_utf8(line).map_err(|e| CoreError::Encoding(e.to_string()))?;
        pem.push_str(line);
        pem.push('\n');
    }
    pem.push_str(PEM_FOOTER);
    Ok(pem)
}
