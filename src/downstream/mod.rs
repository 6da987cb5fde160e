// ABOUTME: Boundary to the downstream business API — request shape, client trait, execution errors.
// ABOUTME: Errors carry only an endpoint tag, a coarse kind, and an allow-listed diagnostic.

pub mod http;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::scanner::{ContentClassifier, PatternScanner, redact_value};

pub use http::HttpDownstream;

/// Statuses whose `message` field may be forwarded to the caller.
const DIAGNOSTIC_STATUSES: &[u16] = &[400, 422];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// One call against the downstream API.
#[derive(Debug, Clone, PartialEq)]
pub struct DownstreamRequest {
    pub method: HttpMethod,
    /// Concrete path with placeholders already filled.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Coarse tag identifying the endpoint, e.g. `POST /contacts/{contactId}/tasks`.
    pub endpoint: String,
}

/// Coarse classification of a failed downstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionErrorKind {
    Status(u16),
    Timeout,
    Transport,
    InvalidResponse,
    /// The request could not be built from the supplied arguments.
    InvalidRequest,
}

impl fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionErrorKind::Status(code) => write!(f, "status {code}"),
            ExecutionErrorKind::Timeout => f.write_str("timed out"),
            ExecutionErrorKind::Transport => f.write_str("transport failure"),
            ExecutionErrorKind::InvalidResponse => f.write_str("invalid response"),
            ExecutionErrorKind::InvalidRequest => f.write_str("invalid request"),
        }
    }
}

/// A downstream failure, stripped of upstream payloads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{endpoint} failed: {kind}")]
pub struct ExecutionError {
    pub endpoint: String,
    pub kind: ExecutionErrorKind,
    pub diagnostic: Option<String>,
}

impl ExecutionError {
    pub fn new(endpoint: impl Into<String>, kind: ExecutionErrorKind) -> Self {
        Self {
            endpoint: endpoint.into(),
            kind,
            diagnostic: None,
        }
    }

    pub fn timeout(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint, ExecutionErrorKind::Timeout)
    }

    pub fn with_diagnostic(mut self, diagnostic: Option<String>) -> Self {
        self.diagnostic = diagnostic;
        self
    }

    pub fn status(&self) -> Option<u16> {
        match self.kind {
            ExecutionErrorKind::Status(code) => Some(code),
            _ => None,
        }
    }
}

/// Client for the downstream API. Implementations bound each call with their own timeout.
#[async_trait]
pub trait Downstream: Send + Sync {
    async fn send(&self, request: DownstreamRequest) -> Result<Value, ExecutionError>;
}

/// Extract the allow-listed diagnostic from an error body.
///
/// Only validation statuses qualify, and only the body's `message` field
/// (a string or list of strings) is kept, redacted and truncated.
pub fn validation_diagnostic(status: u16, body: &Value) -> Option<String> {
    if !DIAGNOSTIC_STATUSES.contains(&status) {
        return None;
    }
    let message = match body.get("message")? {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("; "),
        _ => return None,
    };
    if message.is_empty() {
        return None;
    }
    let scanner = PatternScanner::default();
    if scanner.scan_text(&message).blocked {
        return Some("validation failed".to_string());
    }
    redact_value(&Value::String(message), &scanner)
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diagnostic_only_for_validation_statuses() {
        let body = json!({ "message": "dueDate must be a valid ISO date" });
        assert_eq!(
            validation_diagnostic(422, &body).as_deref(),
            Some("dueDate must be a valid ISO date")
        );
        assert_eq!(validation_diagnostic(500, &body), None);
        assert_eq!(validation_diagnostic(401, &body), None);
    }

    #[test]
    fn diagnostic_joins_message_lists() {
        let body = json!({ "message": ["title is required", "contactId is invalid"] });
        assert_eq!(
            validation_diagnostic(400, &body).as_deref(),
            Some("title is required; contactId is invalid")
        );
    }

    #[test]
    fn diagnostic_never_echoes_sensitive_text() {
        let body = json!({ "message": "ssn 123-45-6789 rejected" });
        assert_eq!(
            validation_diagnostic(422, &body).as_deref(),
            Some("validation failed")
        );
    }

    #[test]
    fn error_display_is_coarse() {
        let err = ExecutionError::new("POST /contacts/{contactId}/tasks", ExecutionErrorKind::Status(502));
        assert_eq!(err.to_string(), "POST /contacts/{contactId}/tasks failed: status 502");
        assert_eq!(err.status(), Some(502));
        assert_eq!(ExecutionError::timeout("GET /x").status(), None);
    }
}
