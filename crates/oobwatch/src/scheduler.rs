//! Background poll scheduler.
//!
//! One tokio task per client. The task registers, announces the interaction
//! domain, then polls on a fixed interval until shut down, at which point it
//! deregisters. A manual trigger cuts the current wait short.

use std::sync::Arc;
use std::time::Duration;

use oobwatch_client::{
    HttpTransport, InteractionClient, RegistrationState, ReqwestTransport, ServerConfig,
    StateHandle,
};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::error::{OobError, Result};
use crate::sink::EntrySink;

/// How long [`PollScheduler::shutdown`] waits for the worker by default.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Timing for a [`PollScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Wait between the end of one poll and the start of the next.
    pub poll_interval: Duration,
    /// Upper bound on a graceful shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(oobwatch_client::DEFAULT_POLL_INTERVAL_SECS),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl SchedulerConfig {
    /// Take the poll interval from a server configuration.
    pub fn from_server_config(config: &ServerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(OobError::InvalidSchedule("poll interval must be positive".into()));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(OobError::InvalidSchedule("shutdown timeout must be positive".into()));
        }
        Ok(())
    }
}

/// How a shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The worker finished within the timeout.
    Graceful,
    /// The worker was still running after the timeout and was aborted.
    TimedOut,
    /// The worker had panicked.
    Panicked,
}

/// Cloneable handle that requests an immediate poll.
///
/// Safe to use from any thread. Triggers that arrive while a poll is already
/// pending collapse into one.
#[derive(Debug, Clone)]
pub struct PollTrigger {
    notify: Arc<Notify>,
    state: StateHandle,
}

impl PollTrigger {
    /// Request an immediate poll. Ignored unless the session is registered.
    pub fn fire(&self) -> bool {
        if !self.state.is_registered() {
            return false;
        }
        self.notify.notify_one();
        true
    }
}

/// Runs a client's poll loop on a background task.
pub struct PollScheduler {
    trigger: PollTrigger,
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
    domain: String,
    correlation_id: String,
    shutdown_timeout: Duration,
}

impl PollScheduler {
    /// Spawn the worker for `client` on the current tokio runtime.
    pub fn start<T, S>(client: InteractionClient<T>, sink: S, config: SchedulerConfig) -> Result<Self>
    where
        T: HttpTransport + 'static,
        S: EntrySink,
    {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| OobError::NoRuntime(e.to_string()))?;

        let trigger = PollTrigger {
            notify: Arc::new(Notify::new()),
            state: client.state_handle(),
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let domain = client.interaction_domain().to_string();
        let correlation_id = client.correlation_id().to_string();

        tracing::info!(
            correlation_id = %correlation_id,
            interval_secs = config.poll_interval.as_secs(),
            "Starting poll worker"
        );

        let handle = runtime.spawn(run_worker(
            client,
            sink,
            config.poll_interval,
            trigger.notify.clone(),
            shutdown_rx,
        ));

        Ok(Self {
            trigger,
            shutdown_tx,
            handle: Some(handle),
            domain,
            correlation_id,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// Build an HTTP client for `config` and start polling it.
    pub fn for_server<S: EntrySink>(config: ServerConfig, sink: S) -> Result<Self> {
        let schedule = SchedulerConfig::from_server_config(&config);
        let transport = ReqwestTransport::new(&config)?;
        let client = InteractionClient::new(config, transport)?;
        Self::start(client, sink, schedule)
    }

    /// Request an immediate poll; returns false if not registered.
    pub fn poll_now(&self) -> bool {
        self.trigger.fire()
    }

    /// Handle for triggering polls from elsewhere.
    pub fn trigger(&self) -> PollTrigger {
        self.trigger.clone()
    }

    /// Current registration state of the session.
    pub fn state(&self) -> RegistrationState {
        self.trigger.state.get()
    }

    /// Interaction domain of the session.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Correlation id of the session.
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// True until the worker task has exited.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the worker and wait for it to deregister.
    ///
    /// Waits at most the configured shutdown timeout, then aborts the task.
    pub async fn shutdown(mut self) -> ShutdownOutcome {
        let _ = self.shutdown_tx.send(true);
        let Some(mut handle) = self.handle.take() else {
            return ShutdownOutcome::Graceful;
        };

        match tokio::time::timeout(self.shutdown_timeout, &mut handle).await {
            Ok(Ok(())) => {
                tracing::info!(correlation_id = %self.correlation_id, "Poll worker stopped");
                ShutdownOutcome::Graceful
            }
            Ok(Err(e)) => {
                tracing::error!(correlation_id = %self.correlation_id, error = %e, "Poll worker panicked");
                ShutdownOutcome::Panicked
            }
            Err(_) => {
                tracing::warn!(
                    correlation_id = %self.correlation_id,
                    "Polling task did not terminate in time"
                );
                handle.abort();
                ShutdownOutcome::TimedOut
            }
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.shutdown_tx.send(true);
        }
    }
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("correlation_id", &self.correlation_id)
            .field("domain", &self.domain)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

async fn run_worker<T, S>(
    mut client: InteractionClient<T>,
    mut sink: S,
    interval: Duration,
    trigger: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
) where
    T: HttpTransport,
    S: EntrySink,
{
    if let Err(e) = client.register().await {
        tracing::error!(error = %e, "Registration failed, poll worker stopping");
        return;
    }
    sink.ready(client.interaction_domain());

    loop {
        if *shutdown.borrow() {
            break;
        }

        poll_once(&client, &mut sink).await;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = trigger.notified() => {
                tracing::debug!("Manual poll requested");
            }
            _ = wait_for_shutdown(&mut shutdown) => break,
        }
    }

    tracing::debug!(correlation_id = client.correlation_id(), "Poll loop cancelled");
    client.deregister().await;
}

async fn poll_once<T: HttpTransport, S: EntrySink>(client: &InteractionClient<T>, sink: &mut S) {
    match client.poll().await {
        Ok(report) => {
            if !report.is_complete() {
                tracing::warn!(
                    failures = report.failures.len(),
                    skipped = report.skipped,
                    "Some interaction records could not be decoded"
                );
            }
            for entry in report.entries {
                sink.deliver(entry);
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Poll cycle failed, continuing");
        }
    }
}

/// Resolves once shutdown is requested or the scheduler is gone.
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
