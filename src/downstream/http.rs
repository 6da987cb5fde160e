// ABOUTME: reqwest-backed Downstream client with bearer auth and a per-request timeout.
// ABOUTME: Maps non-2xx responses to coarse ExecutionErrors without forwarding bodies.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;

use super::{
    Downstream, DownstreamRequest, ExecutionError, ExecutionErrorKind, HttpMethod,
    validation_diagnostic,
};
use crate::config::DownstreamConfig;

/// HTTP client for the downstream business API.
pub struct HttpDownstream {
    client: Client,
    base_url: String,
    token: Option<String>,
    api_version: Option<String>,
}

impl HttpDownstream {
    /// Build a client from config, reading the bearer token from the configured env var.
    pub fn from_config(config: &DownstreamConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let token = std::env::var(&config.token_env).ok().filter(|t| !t.is_empty());
        if token.is_none() {
            tracing::warn!(
                token_env = %config.token_env,
                "downstream token not set; requests will be unauthenticated"
            );
        }
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            api_version: config.api_version.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn to_reqwest(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[async_trait]
impl Downstream for HttpDownstream {
    async fn send(&self, request: DownstreamRequest) -> Result<Value, ExecutionError> {
        let endpoint = request.endpoint.clone();
        let mut builder = self
            .client
            .request(to_reqwest(request.method), self.url(&request.path))
            .header("Accept", "application/json");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(version) = &self.api_version {
            builder = builder.header("Version", version);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            let kind = if e.is_timeout() {
                ExecutionErrorKind::Timeout
            } else {
                ExecutionErrorKind::Transport
            };
            ExecutionError::new(endpoint.clone(), kind)
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|_| ExecutionError::new(endpoint.clone(), ExecutionErrorKind::Transport))?;
        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        if !status.is_success() {
            tracing::warn!(endpoint = %endpoint, status = status.as_u16(), "downstream call failed");
            return Err(
                ExecutionError::new(endpoint, ExecutionErrorKind::Status(status.as_u16()))
                    .with_diagnostic(validation_diagnostic(status.as_u16(), &body)),
            );
        }
        if body.is_null() && !bytes.is_empty() {
            return Err(ExecutionError::new(endpoint, ExecutionErrorKind::InvalidResponse));
        }
        Ok(body)
    }
}
