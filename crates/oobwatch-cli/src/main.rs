//! oobwatch command-line watcher.
//!
//! Registers with an interaction server, prints the interaction domain, and
//! writes every interaction it receives to stdout as one JSON object per line.
//! Press Enter to poll immediately and Ctrl+C to deregister and exit.
//!
//! # Usage
//!
//! ```bash
//! # Public server, default 60 second interval
//! oobwatch
//!
//! # Self-hosted server with a token
//! oobwatch --host interact.example.com --auth "$TOKEN" --poll-interval 10
//! ```

use std::io::BufRead;

use anyhow::Context;
use clap::Parser;
use oobwatch::{
    ChannelSink, EntryFailurePolicy, InteractionClient, PollScheduler, RawServerSettings,
    RegistrationState, ReqwestTransport, SchedulerConfig, ServerConfig, ShutdownOutcome, SinkEvent,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Out-of-band interaction watcher
#[derive(Parser, Debug)]
#[command(name = "oobwatch")]
#[command(about = "Watch an interaction server for out-of-band interactions")]
#[command(version)]
struct Args {
    /// Interaction server host
    #[arg(long, default_value = oobwatch::client::DEFAULT_HOST)]
    host: String,

    /// Server port; invalid values fall back to 443
    #[arg(short, long, default_value = "443")]
    port: String,

    /// Use plain HTTP instead of HTTPS
    #[arg(long)]
    no_tls: bool,

    /// Authorization header value for protected servers
    #[arg(short, long, default_value = "")]
    auth: String,

    /// Seconds between polls; invalid values fall back to 60
    #[arg(long, default_value = "60")]
    poll_interval: String,

    /// JSON server configuration file; overrides the flags above
    #[arg(short, long)]
    config: Option<String>,

    /// Keep decoding a poll batch after a bad record
    #[arg(long)]
    isolate_bad_records: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn server_config(&self) -> anyhow::Result<ServerConfig> {
        if let Some(path) = &self.config {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {path}"))?;
            return Ok(ServerConfig::from_json(&json)?);
        }

        Ok(RawServerSettings {
            host: self.host.clone(),
            port: self.port.clone(),
            tls: !self.no_tls,
            authorization: self.auth.clone(),
            poll_interval: self.poll_interval.clone(),
        }
        .into_config())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = args.server_config()?;
    tracing::info!("Using interaction server {}", config.base_url());

    let policy = if args.isolate_bad_records {
        EntryFailurePolicy::Isolate
    } else {
        EntryFailurePolicy::AbortBatch
    };
    let schedule = SchedulerConfig::from_server_config(&config);
    let transport = ReqwestTransport::new(&config)?;
    let client = InteractionClient::new(config, transport)?.with_entry_policy(policy);

    let (sink, mut events) = ChannelSink::new();
    let scheduler = PollScheduler::start(client, sink, schedule)?;

    // Blocking stdin reads stay off the runtime.
    let trigger = scheduler.trigger();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if line.is_err() {
                break;
            }
            if !trigger.fire() {
                tracing::warn!("Not registered yet, ignoring poll request");
            }
        }
    });

    let mut worker_exited = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
            event = events.recv() => match event {
                Some(SinkEvent::Ready(domain)) => {
                    tracing::info!("Interaction domain: {domain}");
                    eprintln!("{domain}");
                }
                Some(SinkEvent::Entry(entry)) => {
                    println!("{}", serde_json::to_string(&entry)?);
                }
                None => {
                    worker_exited = true;
                    break;
                }
            },
        }
    }

    let state = scheduler.state();
    if scheduler.shutdown().await == ShutdownOutcome::TimedOut {
        anyhow::bail!("poll worker did not stop in time");
    }
    if worker_exited && state == RegistrationState::Unregistered {
        anyhow::bail!("registration with the interaction server failed");
    }
    Ok(())
}
