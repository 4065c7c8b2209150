//! Error types for the protocol client.

use std::fmt;

use oobwatch_core::CoreError;
use thiserror::Error;

/// The three protocol operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    Poll,
    Deregister,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Register => "register",
            Operation::Poll => "poll",
            Operation::Deregister => "deregister",
        })
    }
}

/// Failures below the HTTP layer.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Name resolution for the server host failed.
    #[error("the host '{host}' could not be resolved")]
    Unresolved { host: String },

    /// The server could not be reached.
    #[error("connection to '{host}' failed: {message}")]
    Connect { host: String, message: String },

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Other(String),
}

/// Errors that can occur during protocol operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Server answered with a status other than 200.
    #[error("{operation} was unsuccessful: status {status}")]
    Protocol {
        operation: Operation,
        status: u16,
        body: String,
    },

    /// The request could not be built.
    #[error("request construction failed: {0}")]
    Request(String),

    /// Transport-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Wrapped key or record failed to decrypt.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Response or record had an unexpected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// Session keypair could not be generated.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Poll attempted before a successful registration.
    #[error("client is not registered")]
    NotRegistered,

    /// Registration may only be attempted once per session.
    #[error("registration was already attempted for this session")]
    AlreadyAttempted,

    /// Server configuration rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation interrupted by shutdown.
    #[error("operation cancelled")]
    Cancelled,
}

impl ClientError {
    /// True when the poll loop may simply continue with the next cycle.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ClientError::KeyGeneration(_)
                | ClientError::InvalidConfig(_)
                | ClientError::AlreadyAttempted
                | ClientError::Cancelled
        )
    }

    /// True when the server host name did not resolve.
    pub fn is_unresolved_host(&self) -> bool {
        matches!(self, ClientError::Transport(TransportError::Unresolved { .. }))
    }
}

impl From<CoreError> for ClientError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::KeyGeneration(msg) => ClientError::KeyGeneration(msg),
            CoreError::Crypto(msg) => ClientError::Crypto(msg),
            CoreError::InvalidKeyLength(n) => {
                ClientError::Crypto(format!("invalid symmetric key length: {n} bytes"))
            }
            CoreError::Parse(msg) => ClientError::Parse(msg),
            CoreError::Encoding(msg) => ClientError::Request(msg),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
