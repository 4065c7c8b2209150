//! Transport abstraction for the protocol client.
//!
//! The client builds [`HttpRequest`]s and hands them to an injected
//! [`HttpTransport`]. Implementations may use a real HTTP stack (see
//! [`crate::http::ReqwestTransport`]) or the in-memory server in [`memory`].

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportError;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A request relative to the configured server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    /// Path and query, starting with `/`.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// A `GET` with no headers.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// A `POST` carrying a JSON body.
    pub fn post_json(path: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: Some(body),
        }
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Path without the query string.
    pub fn route(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }

    /// Value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        let (_, query) = self.path.split_once('?')?;
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

/// Status and body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Build a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// The protocol treats only 200 as success.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Body as text, lossily decoded.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Sends one request and waits for its response.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request to the configured server.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).send(request).await
    }
}

/// In-memory transports for testing.
pub mod memory {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use oobwatch_core::{encrypt_payload, wrap_key, RsaPublicKey, IV_LEN};
    use rand::RngCore;
    use rsa::pkcs8::DecodePublicKey;
    use tokio::sync::mpsc;

    use crate::messages::{
        DeregisterRequest, PollResponse, RegisterRequest, DEREGISTER_PATH, POLL_PATH,
        REGISTER_PATH,
    };

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A record waiting to be delivered on the next poll.
    #[derive(Debug, Clone)]
    enum PendingRecord {
        /// Plaintext record, encrypted at poll time.
        Plain(String),
        /// Pre-encoded payload passed through untouched.
        Raw(String),
    }

    struct Session {
        secret_key: String,
        public_key: RsaPublicKey,
        pending: Vec<PendingRecord>,
    }

    #[derive(Default)]
    struct ServerState {
        sessions: HashMap<String, Session>,
        forced_status: HashMap<String, u16>,
        required_authorization: Option<String>,
        unreachable: bool,
        key_len: usize,
        requests: Vec<HttpRequest>,
        subscribers: Vec<mpsc::UnboundedSender<HttpRequest>>,
    }

    /// An interaction server living in process memory.
    ///
    /// Implements the server side of the wire protocol: it stores registered
    /// public keys, wraps a fresh AES key per poll, and encrypts queued
    /// records the way the real server does.
    pub struct MemoryInteractionServer {
        host: String,
        state: Mutex<ServerState>,
    }

    impl MemoryInteractionServer {
        /// Create a server answering for `host`.
        pub fn new(host: impl Into<String>) -> Arc<Self> {
            Arc::new(Self {
                host: host.into(),
                state: Mutex::new(ServerState {
                    key_len: 32,
                    ..ServerState::default()
                }),
            })
        }

        /// Host this server answers for.
        pub fn host(&self) -> &str {
            &self.host
        }

        /// Reject requests whose `Authorization` header differs from `value`.
        pub fn require_authorization(&self, value: impl Into<String>) {
            lock(&self.state).required_authorization = Some(value.into());
        }

        /// Answer every request to `route` with `status`.
        pub fn force_status(&self, route: &str, status: u16) {
            lock(&self.state).forced_status.insert(route.to_string(), status);
        }

        /// Stop forcing a status for `route`.
        pub fn clear_forced_status(&self, route: &str) {
            lock(&self.state).forced_status.remove(route);
        }

        /// Make every request fail as if the host did not resolve.
        pub fn set_unreachable(&self, unreachable: bool) {
            lock(&self.state).unreachable = unreachable;
        }

        /// Length of the AES key issued on each poll (16, 24 or 32).
        pub fn set_key_len(&self, key_len: usize) {
            lock(&self.state).key_len = key_len;
        }

        /// Queue a plaintext interaction record for a correlation.
        ///
        /// Returns false if the correlation is not registered.
        pub fn push_interaction(&self, correlation_id: &str, record: impl Into<String>) -> bool {
            self.push(correlation_id, PendingRecord::Plain(record.into()))
        }

        /// Queue a payload that is delivered as-is, bypassing encryption.
        pub fn push_raw_record(&self, correlation_id: &str, payload: impl Into<String>) -> bool {
            self.push(correlation_id, PendingRecord::Raw(payload.into()))
        }

        fn push(&self, correlation_id: &str, record: PendingRecord) -> bool {
            match lock(&self.state).sessions.get_mut(correlation_id) {
                Some(session) => {
                    session.pending.push(record);
                    true
                }
                None => false,
            }
        }

        /// Whether a correlation is currently registered.
        pub fn is_registered(&self, correlation_id: &str) -> bool {
            lock(&self.state).sessions.contains_key(correlation_id)
        }

        /// Correlation ids of all registered sessions.
        pub fn registered_sessions(&self) -> Vec<String> {
            lock(&self.state).sessions.keys().cloned().collect()
        }

        /// Every request received so far.
        pub fn requests(&self) -> Vec<HttpRequest> {
            lock(&self.state).requests.clone()
        }

        /// Number of requests received for `route`.
        pub fn request_count(&self, route: &str) -> usize {
            lock(&self.state)
                .requests
                .iter()
                .filter(|r| r.route() == route)
                .count()
        }

        /// Receive a copy of every request from now on.
        pub fn subscribe(&self) -> mpsc::UnboundedReceiver<HttpRequest> {
            let (tx, rx) = mpsc::unbounded_channel();
            lock(&self.state).subscribers.push(tx);
            rx
        }

        fn handle(&self, request: HttpRequest) -> Result<HttpResponse> {
            let mut state = lock(&self.state);

            if state.unreachable {
                return Err(TransportError::Unresolved {
                    host: self.host.clone(),
                });
            }

            state.requests.push(request.clone());
            state.subscribers.retain(|tx| tx.send(request.clone()).is_ok());

            if let Some(required) = &state.required_authorization {
                if request.header("Authorization") != Some(required.as_str()) {
                    return Ok(HttpResponse::new(401, "unauthorized"));
                }
            }

            if let Some(status) = state.forced_status.get(request.route()) {
                return Ok(HttpResponse::new(*status, "forced status"));
            }

            match (request.method, request.route()) {
                (Method::Post, REGISTER_PATH) => Ok(Self::register(&mut state, &request)),
                (Method::Get, POLL_PATH) => Ok(Self::poll(&mut state, &request)),
                (Method::Post, DEREGISTER_PATH) => Ok(Self::deregister(&mut state, &request)),
                _ => Ok(HttpResponse::new(404, "not found")),
            }
        }

        fn register(state: &mut ServerState, request: &HttpRequest) -> HttpResponse {
            let body = request.body.as_deref().unwrap_or_default();
            let req: RegisterRequest = match serde_json::from_slice(body) {
                Ok(req) => req,
                Err(e) => return HttpResponse::new(400, format!("could not decode request: {e}")),
            };

            let public_key = match decode_public_key(&req.public_key) {
                Some(key) => key,
                None => return HttpResponse::new(400, "could not decode public key"),
            };

            if state.sessions.contains_key(&req.correlation_id) {
                return HttpResponse::new(400, "correlation-id provided already exists");
            }

            state.sessions.insert(
                req.correlation_id,
                Session {
                    secret_key: req.secret_key,
                    public_key,
                    pending: Vec::new(),
                },
            );
            HttpResponse::new(200, r#"{"message":"registration successful"}"#)
        }

        fn poll(state: &mut ServerState, request: &HttpRequest) -> HttpResponse {
            let (Some(id), Some(secret)) = (request.query_param("id"), request.query_param("secret"))
            else {
                return HttpResponse::new(400, "missing id or secret");
            };

            let key_len = state.key_len;
            let Some(session) = state.sessions.get_mut(id) else {
                return HttpResponse::new(400, "could not get interactions");
            };
            if session.secret_key != secret {
                return HttpResponse::new(401, "invalid secret key");
            }

            let mut rng = rand::thread_rng();
            let mut key = vec![0u8; key_len];
            rng.fill_bytes(&mut key);

            let aes_key = match wrap_key(&key, &session.public_key) {
                Ok(wrapped) => wrapped,
                Err(e) => return HttpResponse::new(500, e.to_string()),
            };

            let mut data = Vec::with_capacity(session.pending.len());
            for record in session.pending.drain(..) {
                match record {
                    PendingRecord::Plain(text) => {
                        let mut iv = [0u8; IV_LEN];
                        rng.fill_bytes(&mut iv);
                        match encrypt_payload(text.as_bytes(), &key, &iv) {
                            Ok(encoded) => data.push(encoded),
                            Err(e) => return HttpResponse::new(500, e.to_string()),
                        }
                    }
                    PendingRecord::Raw(encoded) => data.push(encoded),
                }
            }

            let response = PollResponse {
                aes_key,
                data: (!data.is_empty()).then_some(data),
            };
            match serde_json::to_vec(&response) {
                Ok(body) => HttpResponse::new(200, body),
                Err(e) => HttpResponse::new(500, e.to_string()),
            }
        }

        fn deregister(state: &mut ServerState, request: &HttpRequest) -> HttpResponse {
            let body = request.body.as_deref().unwrap_or_default();
            let req: DeregisterRequest = match serde_json::from_slice(body) {
                Ok(req) => req,
                Err(e) => return HttpResponse::new(400, format!("could not decode request: {e}")),
            };

            match state.sessions.get(&req.correlation_id) {
                Some(session) if session.secret_key == req.secret_key => {
                    state.sessions.remove(&req.correlation_id);
                    HttpResponse::new(200, r#"{"message":"deregistration successful"}"#)
                }
                Some(_) => HttpResponse::new(401, "invalid secret key"),
                None => HttpResponse::new(400, "could not find correlation-id"),
            }
        }
    }

    fn decode_public_key(encoded: &str) -> Option<RsaPublicKey> {
        let pem_bytes = STANDARD.decode(encoded).ok()?;
        let pem = String::from_utf8(pem_bytes).ok()?;
        RsaPublicKey::from_public_key_pem(&pem).ok()
    }

    #[async_trait]
    impl HttpTransport for MemoryInteractionServer {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.handle(request)
        }
    }

    /// Replays a fixed queue of responses and records every request.
    ///
    /// Once the queue is empty every request gets a 500.
    #[derive(Default)]
    pub struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<HttpResponse>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        /// Create with the given responses, answered in order.
        pub fn new(responses: impl IntoIterator<Item = Result<HttpResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            })
        }

        /// Queue another response.
        pub fn push(&self, response: Result<HttpResponse>) {
            lock(&self.responses).push_back(response);
        }

        /// Every request received so far.
        pub fn requests(&self) -> Vec<HttpRequest> {
            lock(&self.requests).clone()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            lock(&self.requests).push(request);
            lock(&self.responses)
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::new(500, "no scripted response")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::{MemoryInteractionServer, ScriptedTransport};
    use super::*;

    #[test]
    fn test_request_helpers() {
        let req = HttpRequest::get("/poll?id=abc&secret=def").with_header("Authorization", "t");

        assert_eq!(req.route(), "/poll");
        assert_eq!(req.query_param("id"), Some("abc"));
        assert_eq!(req.query_param("secret"), Some("def"));
        assert_eq!(req.query_param("missing"), None);
        assert_eq!(req.header("authorization"), Some("t"));
    }

    #[test]
    fn test_post_json_sets_content_type() {
        let req = HttpRequest::post_json("/register", b"{}".to_vec());
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(req.body.as_deref(), Some(&b"{}"[..]));
    }

    #[tokio::test]
    async fn test_scripted_transport_replays_in_order() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(200, "first")),
            Err(TransportError::Timeout),
        ]);

        let first = transport.send(HttpRequest::get("/a")).await.unwrap();
        assert_eq!(first.body_text(), "first");
        assert!(transport.send(HttpRequest::get("/b")).await.is_err());

        let exhausted = transport.send(HttpRequest::get("/c")).await.unwrap();
        assert_eq!(exhausted.status, 500);
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_memory_server_unknown_route() {
        let server = MemoryInteractionServer::new("oast.test");
        let response = server.send(HttpRequest::get("/nope")).await.unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_memory_server_unreachable() {
        let server = MemoryInteractionServer::new("oast.test");
        server.set_unreachable(true);

        let err = server.send(HttpRequest::get("/poll")).await.unwrap_err();
        assert!(matches!(err, TransportError::Unresolved { host } if host == "oast.test"));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_memory_server_rejects_bad_register_body() {
        let server = MemoryInteractionServer::new("oast.test");
        let response = server
            .send(HttpRequest::post_json("/register", b"{}".to_vec()))
            .await
            .unwrap();
        assert_eq!(response.status, 400);
        assert!(server.registered_sessions().is_empty());
    }

    #[tokio::test]
    async fn test_memory_server_subscription_sees_requests() {
        let server = MemoryInteractionServer::new("oast.test");
        let mut rx = server.subscribe();

        server.send(HttpRequest::get("/poll?id=x&secret=y")).await.unwrap();

        let seen = rx.recv().await.unwrap();
        assert_eq!(seen.route(), "/poll");
        assert_eq!(server.request_count("/poll"), 1);
    }
}
