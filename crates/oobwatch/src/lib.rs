//! # oobwatch
//!
//! Out-of-band interaction detection client.
//!
//! ## Overview
//!
//! oobwatch registers a session with an interaction-collection server, hands
//! out a unique interaction domain, and polls the server for the HTTP, DNS,
//! SMTP and other interactions that reach it. Records arrive encrypted for
//! the session and are decoded into [`InteractionEntry`] values.
//!
//! - **Identity**: per-session RSA keypair, correlation id and secret key
//! - **Client**: register, poll and deregister over an injected transport
//! - **Scheduler**: background poll loop with a manual trigger and bounded shutdown
//! - **Sink**: where decoded entries go
//!
//! ## Usage
//!
//! ```rust,no_run
//! use oobwatch::{ChannelSink, PollScheduler, ServerConfig, SinkEvent};
//!
//! async fn example() -> oobwatch::Result<()> {
//!     let (sink, mut events) = ChannelSink::new();
//!     let scheduler = PollScheduler::for_server(ServerConfig::default(), sink)?;
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             SinkEvent::Ready(domain) => println!("listening on {domain}"),
//!             SinkEvent::Entry(entry) => println!("{} from {}", entry.protocol(), entry.source_address()),
//!         }
//!     }
//!
//!     scheduler.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `oobwatch::core` - identity, envelope crypto and entry parsing
//! - `oobwatch::client` - wire protocol client and transports

pub mod error;
pub mod scheduler;
pub mod sink;

pub use oobwatch_client as client;
pub use oobwatch_core as core;

pub use error::{OobError, Result};
pub use scheduler::{
    PollScheduler, PollTrigger, SchedulerConfig, ShutdownOutcome, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use sink::{ChannelSink, EntrySink, FnSink, SinkEvent};

pub use oobwatch_client::{
    ClientError, EntryFailurePolicy, InteractionClient, PollReport, RawServerSettings,
    RegistrationState, ReqwestTransport, ServerConfig,
};
pub use oobwatch_core::{ClientIdentity, InteractionEntry};
