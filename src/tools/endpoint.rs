// ABOUTME: Endpoint-backed tool handler — fills a path template from arguments and calls downstream.
// ABOUTME: Path fields are consumed; the rest become the query (GET/DELETE) or JSON body (POST/PUT).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Endpoint, ToolHandler};
use crate::downstream::{
    Downstream, DownstreamRequest, ExecutionError, ExecutionErrorKind, HttpMethod,
};

/// A tool that maps directly onto one downstream endpoint.
pub struct EndpointTool {
    endpoint: Endpoint,
    downstream: Arc<dyn Downstream>,
}

impl EndpointTool {
    pub fn new(endpoint: Endpoint, downstream: Arc<dyn Downstream>) -> Self {
        Self {
            endpoint,
            downstream,
        }
    }

    /// Build the downstream request for `arguments`.
    pub fn build_request(&self, arguments: &Value) -> Result<DownstreamRequest, ExecutionError> {
        let tag = self.endpoint.to_string();
        let invalid = || ExecutionError::new(tag.clone(), ExecutionErrorKind::InvalidRequest);

        let mut remaining = match arguments {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => return Err(invalid()),
        };

        let path = fill_path(&self.endpoint.path, &mut remaining).ok_or_else(invalid)?;

        let (query, body) = match self.endpoint.method {
            HttpMethod::Get | HttpMethod::Delete => (to_query(&remaining), None),
            HttpMethod::Post | HttpMethod::Put => (Vec::new(), Some(Value::Object(remaining))),
        };

        Ok(DownstreamRequest {
            method: self.endpoint.method,
            path,
            query,
            body,
            endpoint: tag,
        })
    }
}

#[async_trait]
impl ToolHandler for EndpointTool {
    async fn execute(&self, arguments: &Value) -> Result<Value, ExecutionError> {
        let request = self.build_request(arguments)?;
        self.downstream.send(request).await
    }
}

/// Replace each `{field}` in `template` with the argument value, removing it from `args`.
///
/// Returns None if a placeholder has no usable value.
fn fill_path(template: &str, args: &mut Map<String, Value>) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let close = rest[open..].find('}')? + open;
        out.push_str(&rest[..open]);
        let field = &rest[open + 1..close];
        let value = match args.remove(field)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        if !is_path_segment(&value) {
            return None;
        }
        out.push_str(&value);
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    Some(out)
}

/// A single segment of safe characters with at least one alphanumeric, so
/// dot segments like `.` and `..` never reach the URL.
fn is_path_segment(value: &str) -> bool {
    value.chars().all(is_path_safe) && value.chars().any(|c| c.is_ascii_alphanumeric())
}

fn is_path_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn to_query(args: &Map<String, Value>) -> Vec<(String, String)> {
    args.iter()
        .filter_map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((k.clone(), value))
        })
        .collect()
}
