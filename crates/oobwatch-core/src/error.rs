//! Error types for oobwatch core.

use thiserror::Error;

/// Errors raised by identity generation, envelope crypto, and record parsing.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The asymmetric primitive could not produce a keypair.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Wrapped key or payload did not decrypt.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Symmetric key is not 16, 24 or 32 bytes.
    #[error("invalid symmetric key length: {0} bytes")]
    InvalidKeyLength(usize),

    /// Decrypted record is not a valid interaction record.
    #[error("parse error: {0}")]
    Parse(String),

    /// Key export or base64 handling failed.
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
