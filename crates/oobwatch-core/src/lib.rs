//! # oobwatch Core
//!
//! Pure primitives for the oobwatch interaction client: session identity,
//! hybrid envelope decryption, and interaction record parsing.
//!
//! This crate contains no I/O and no networking.
//!
//! ## Key Types
//!
//! - [`ClientIdentity`] - RSA keypair, correlation id and secret key of one session
//! - [`SymmetricKey`] - per-poll AES key recovered from the server's envelope
//! - [`InteractionEntry`] - one decoded interaction (HTTP, DNS, SMTP, ...)
//!
//! ## Envelope
//!
//! Poll responses use RSA-OAEP (SHA-256) to wrap an AES key and AES-CFB for
//! the records themselves. See [`envelope`] module.

pub mod entry;
pub mod envelope;
pub mod error;
pub mod identity;

pub use entry::InteractionEntry;
pub use envelope::{
    decrypt_payload, encrypt_payload, unwrap_key, wrap_key, SymmetricKey, IV_LEN, TRAILER_LEN,
};
pub use error::{CoreError, Result};
pub use identity::{
    public_key_pem, ClientIdentity, CorrelationId, SecretKey, DOMAIN_LABEL_LEN, RSA_KEY_BITS,
};

pub use rsa::{RsaPrivateKey, RsaPublicKey};
