//! Error types for the oobwatch API.

use oobwatch_client::ClientError;
use oobwatch_core::CoreError;
use thiserror::Error;

/// Errors that can occur while setting up a polling session.
#[derive(Debug, Error)]
pub enum OobError {
    /// Core primitive error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Protocol client error.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// Scheduler settings rejected.
    #[error("invalid scheduler configuration: {0}")]
    InvalidSchedule(String),

    /// The scheduler must be started from within a tokio runtime.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
}

/// Result type for oobwatch operations.
pub type Result<T> = std::result::Result<T, OobError>;
