//! Protocol state machine.
//!
//! Drives register, poll and deregister against an interaction server and
//! turns poll responses into [`InteractionEntry`] values.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use oobwatch_core::{ClientIdentity, InteractionEntry, SymmetricKey};

use crate::config::ServerConfig;
use crate::error::{ClientError, Operation, Result, TransportError};
use crate::messages::{
    poll_path, DeregisterRequest, PollResponse, RegisterRequest, DEREGISTER_PATH, REGISTER_PATH,
    USER_AGENT,
};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Registration state of a session.
///
/// `Unregistered -> Registered -> Deregistered`. There is no way back to
/// `Unregistered` once registered, and a failed registration is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegistrationState {
    Unregistered = 0,
    Registered = 1,
    Deregistered = 2,
}

impl RegistrationState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RegistrationState::Registered,
            2 => RegistrationState::Deregistered,
            _ => RegistrationState::Unregistered,
        }
    }
}

/// Shared view of a client's registration state.
///
/// Cloneable and readable from any thread; only the owning client writes it.
#[derive(Debug, Clone)]
pub struct StateHandle(Arc<AtomicU8>);

impl StateHandle {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(RegistrationState::Unregistered as u8)))
    }

    /// Current state.
    pub fn get(&self) -> RegistrationState {
        RegistrationState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// True while registered.
    pub fn is_registered(&self) -> bool {
        self.get() == RegistrationState::Registered
    }

    pub(crate) fn set(&self, state: RegistrationState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// What to do when one record in a poll batch fails to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntryFailurePolicy {
    /// Stop at the first bad record; later records in the batch are dropped.
    #[default]
    AbortBatch,
    /// Skip the bad record and keep decoding the rest.
    Isolate,
}

/// A record that could not be decoded.
#[derive(Debug)]
pub struct EntryFailure {
    /// Position of the record in the response's `data` array.
    pub index: usize,
    pub error: ClientError,
}

/// Outcome of one successful poll request.
#[derive(Debug, Default)]
pub struct PollReport {
    /// Decoded entries, in server order.
    pub entries: Vec<InteractionEntry>,
    /// Records that failed to decrypt or parse.
    pub failures: Vec<EntryFailure>,
    /// Records left unprocessed after an aborted batch.
    pub skipped: usize,
}

impl PollReport {
    /// True if every record in the batch was decoded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped == 0
    }
}

/// Client for one interaction server session.
pub struct InteractionClient<T: HttpTransport> {
    config: ServerConfig,
    transport: T,
    identity: ClientIdentity,
    state: StateHandle,
    register_attempted: bool,
    domain: OnceLock<String>,
    entry_policy: EntryFailurePolicy,
}

impl<T: HttpTransport> InteractionClient<T> {
    /// Validate `config` and generate a fresh session identity.
    pub fn new(config: ServerConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let identity = ClientIdentity::generate(config.host.clone())?;
        Ok(Self::assemble(config, transport, identity))
    }

    /// Validate `config` and use an existing identity.
    pub fn with_identity(
        config: ServerConfig,
        transport: T,
        identity: ClientIdentity,
    ) -> Result<Self> {
        config.validate()?;
        if identity.host() != config.host {
            return Err(ClientError::InvalidConfig(format!(
                "identity was generated for '{}' but the server is '{}'",
                identity.host(),
                config.host
            )));
        }
        Ok(Self::assemble(config, transport, identity))
    }

    fn assemble(config: ServerConfig, transport: T, identity: ClientIdentity) -> Self {
        Self {
            config,
            transport,
            identity,
            state: StateHandle::new(),
            register_attempted: false,
            domain: OnceLock::new(),
            entry_policy: EntryFailurePolicy::default(),
        }
    }

    /// Set the per-record failure policy.
    pub fn with_entry_policy(mut self, policy: EntryFailurePolicy) -> Self {
        self.entry_policy = policy;
        self
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Correlation id of this session.
    pub fn correlation_id(&self) -> &str {
        self.identity.correlation_id().as_str()
    }

    /// Session identity.
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Current registration state.
    pub fn registration_state(&self) -> RegistrationState {
        self.state.get()
    }

    /// Shared handle to the registration state.
    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    /// Interaction domain for this session.
    ///
    /// Generated on first call and stable afterwards.
    pub fn interaction_domain(&self) -> &str {
        self.domain
            .get_or_init(|| self.identity.interaction_domain())
    }

    /// Register the session with the server.
    ///
    /// Only one attempt is allowed per client; a failed registration leaves
    /// the client unregistered for good.
    pub async fn register(&mut self) -> Result<()> {
        if self.register_attempted {
            return Err(ClientError::AlreadyAttempted);
        }
        self.register_attempted = true;

        tracing::info!(
            correlation_id = self.correlation_id(),
            "Registering correlation"
        );

        let body = RegisterRequest {
            public_key: self.identity.public_key_export().to_string(),
            secret_key: self.identity.secret_key().as_str().to_string(),
            correlation_id: self.correlation_id().to_string(),
        };
        let body = serde_json::to_vec(&body).map_err(|e| ClientError::Request(e.to_string()))?;

        let response = self
            .send(Operation::Register, HttpRequest::post_json(REGISTER_PATH, body))
            .await?;
        if !response.is_ok() {
            return Err(self.unsuccessful(Operation::Register, response));
        }

        self.state.set(RegistrationState::Registered);
        tracing::info!(
            correlation_id = self.correlation_id(),
            "Session registration was successful"
        );
        Ok(())
    }

    /// Fetch and decode interactions recorded since the last poll.
    ///
    /// A non-200 status or an unreadable response is an error; the
    /// registration state is left unchanged either way. Per-record failures
    /// are reported in the [`PollReport`] according to the entry policy.
    pub async fn poll(&self) -> Result<PollReport> {
        if !self.state.is_registered() {
            return Err(ClientError::NotRegistered);
        }

        let path = poll_path(self.correlation_id(), self.identity.secret_key().as_str());
        let response = self.send(Operation::Poll, HttpRequest::get(path)).await?;
        if !response.is_ok() {
            return Err(self.unsuccessful(Operation::Poll, response));
        }

        let body: PollResponse = serde_json::from_slice(&response.body).map_err(|e| {
            let err = ClientError::Parse(format!("poll response: {e}"));
            tracing::error!(correlation_id = self.correlation_id(), error = %err, "Poll failed");
            err
        })?;

        let key = self
            .identity
            .unwrap_key(&body.aes_key)
            .and_then(SymmetricKey::from_bytes)
            .map_err(|e| {
                let err = ClientError::from(e);
                tracing::error!(correlation_id = self.correlation_id(), error = %err, "Poll failed");
                err
            })?;

        let records = body.data.unwrap_or_default();
        let mut report = PollReport::default();

        for (index, record) in records.iter().enumerate() {
            match decode_record(&key, record) {
                Ok(entry) => report.entries.push(entry),
                Err(error) => {
                    tracing::warn!(index, error = %error, "Could not decode interaction record");
                    report.failures.push(EntryFailure { index, error });
                    if self.entry_policy == EntryFailurePolicy::AbortBatch {
                        report.skipped = records.len() - index - 1;
                        break;
                    }
                }
            }
        }

        tracing::debug!(
            correlation_id = self.correlation_id(),
            entries = report.entries.len(),
            failures = report.failures.len(),
            skipped = report.skipped,
            "Poll complete"
        );
        Ok(report)
    }

    /// Deregister the session.
    ///
    /// Best-effort: the response is only logged and the state always becomes
    /// `Deregistered`. Does nothing unless the session is registered.
    pub async fn deregister(&mut self) {
        if !self.state.is_registered() {
            tracing::debug!(
                correlation_id = self.correlation_id(),
                "Not registered, skipping deregister"
            );
            return;
        }

        tracing::info!(
            correlation_id = self.correlation_id(),
            "Deregistering correlation"
        );

        let body = DeregisterRequest {
            correlation_id: self.correlation_id().to_string(),
            secret_key: self.identity.secret_key().as_str().to_string(),
        };
        match serde_json::to_vec(&body) {
            Ok(body) => {
                let request = HttpRequest::post_json(DEREGISTER_PATH, body);
                if let Ok(response) = self.send(Operation::Deregister, request).await {
                    if !response.is_ok() {
                        let _ = self.unsuccessful(Operation::Deregister, response);
                    }
                }
            }
            Err(e) => tracing::error!(error = %e, "Could not encode deregister request"),
        }

        self.state.set(RegistrationState::Deregistered);
    }

    /// Add the common headers and send, logging transport failures.
    async fn send(&self, operation: Operation, request: HttpRequest) -> Result<HttpResponse> {
        let mut request = request.with_header("User-Agent", USER_AGENT);
        if let Some(authorization) = self.config.authorization() {
            request = request.with_header("Authorization", authorization);
        }

        self.transport.send(request).await.map_err(|e| {
            log_transport_failure(operation, &e);
            ClientError::Transport(e)
        })
    }

    fn unsuccessful(&self, operation: Operation, response: HttpResponse) -> ClientError {
        let body = response.body_text().into_owned();
        tracing::error!(
            %operation,
            correlation_id = self.correlation_id(),
            status = response.status,
            body = %body,
            "Request was unsuccessful"
        );
        ClientError::Protocol {
            operation,
            status: response.status,
            body,
        }
    }
}

impl<T: HttpTransport> std::fmt::Debug for InteractionClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionClient")
            .field("identity", &self.identity)
            .field("state", &self.state.get())
            .field("entry_policy", &self.entry_policy)
            .finish_non_exhaustive()
    }
}

fn decode_record(key: &SymmetricKey, record: &str) -> Result<InteractionEntry> {
    let text = key.decrypt_text(record)?;
    Ok(InteractionEntry::parse(text)?)
}

fn log_transport_failure(operation: Operation, error: &TransportError) {
    match error {
        TransportError::Unresolved { host } => {
            let op = match operation {
                Operation::Register => "Register",
                Operation::Poll => "Poll",
                Operation::Deregister => "Deregister",
            };
            tracing::error!("{op} failed - the host '{host}' could not be resolved");
        }
        other => tracing::error!(%operation, error = %other, "Request failed"),
    }
}
