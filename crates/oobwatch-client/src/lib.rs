//! # oobwatch Client
//!
//! Client side of the interaction server wire protocol.
//!
//! ## Overview
//!
//! An [`InteractionClient`] owns one session identity and runs the three
//! protocol operations over an injected [`HttpTransport`]:
//!
//! - **register**: announce the correlation id, secret key and public key
//! - **poll**: fetch the records collected since the last poll and decrypt them
//! - **deregister**: best-effort cleanup when the session ends
//!
//! ## Usage
//!
//! ```rust,no_run
//! use oobwatch_client::{InteractionClient, ReqwestTransport, ServerConfig};
//!
//! async fn example() -> oobwatch_client::Result<()> {
//!     let config = ServerConfig::for_host("oast.pro");
//!     let transport = ReqwestTransport::new(&config)?;
//!     let mut client = InteractionClient::new(config, transport)?;
//!
//!     client.register().await?;
//!     println!("send payloads to {}", client.interaction_domain());
//!
//!     let report = client.poll().await?;
//!     for entry in &report.entries {
//!         println!("{} from {}", entry.protocol(), entry.source_address());
//!     }
//!
//!     client.deregister().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Client                               Server
//!   |-- POST /register --------------->|   public-key, secret-key, correlation-id
//!   |<------------------------- 200 ---|
//!   |-- GET /poll?id=..&secret=.. ---->|
//!   |<---------- {aes_key, data} ------|   RSA-OAEP key, AES-CFB records
//!   |-- POST /deregister ------------->|   correlation-id, secret-key
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod messages;
pub mod transport;

pub use client::{
    EntryFailure, EntryFailurePolicy, InteractionClient, PollReport, RegistrationState,
    StateHandle,
};
pub use config::{
    RawServerSettings, ServerConfig, DEFAULT_HOST, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_PORT,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use error::{ClientError, Operation, Result, TransportError};
pub use http::ReqwestTransport;
pub use messages::USER_AGENT;
pub use transport::{
    memory::MemoryInteractionServer, memory::ScriptedTransport, HttpRequest, HttpResponse,
    HttpTransport, Method,
};
