//! HTTP transport backed by reqwest.

use std::error::Error as StdError;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::ServerConfig;
use crate::error::{ClientError, TransportError};
use crate::messages::USER_AGENT;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, Result};

/// Sends requests to `base_url + path` over a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    host: String,
}

impl ReqwestTransport {
    /// Build a transport for the configured server.
    pub fn new(config: &ServerConfig) -> std::result::Result<Self, ClientError> {
        config.validate()?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::InvalidConfig(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            host: config.host.clone(),
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            return TransportError::Timeout;
        }
        if is_resolution_failure(&err) {
            return TransportError::Unresolved {
                host: self.host.clone(),
            };
        }
        if err.is_connect() {
            return TransportError::Connect {
                host: self.host.clone(),
                message: root_cause(&err),
            };
        }
        TransportError::Other(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| self.classify(e))?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

/// hyper reports resolver failures as a connect error whose source chain
/// mentions DNS.
fn is_resolution_failure(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("dns error")
            || text.contains("failed to lookup address")
            || text.contains("name or service not known")
            || text.contains("no such host")
        {
            return true;
        }
        source = cause.source();
    }
    false
}

fn root_cause(err: &reqwest::Error) -> String {
    let mut last: &(dyn StdError + 'static) = err;
    while let Some(next) = last.source() {
        last = next;
    }
    last.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ServerConfig::for_host("");
        assert!(matches!(
            ReqwestTransport::new(&config),
            Err(ClientError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_base_url_from_config() {
        let config = ServerConfig {
            tls: false,
            port: 8080,
            ..ServerConfig::for_host("interact.local")
        };
        let transport = ReqwestTransport::new(&config).unwrap();
        assert_eq!(transport.base_url(), "http://interact.local:8080");
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_classified() {
        let config = ServerConfig {
            tls: false,
            port: 80,
            ..ServerConfig::for_host("does-not-exist.invalid")
        };
        let transport = ReqwestTransport::new(&config).unwrap();

        let err = transport.send(HttpRequest::get("/poll")).await.unwrap_err();
        assert!(
            matches!(
                &err,
                TransportError::Unresolved { host } if host == "does-not-exist.invalid"
            ),
            "unexpected error: {err:?}"
        );
    }
}
