// ABOUTME: Tool registry — static catalog of read/write tool definitions behind an allowlist.
// ABOUTME: Definitions carry required fields, an endpoint tag for dry runs, and an async handler.

pub mod allowlist;
pub mod catalog;
pub mod endpoint;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::downstream::{ExecutionError, HttpMethod};

pub use allowlist::ToolAllowlist;
pub use endpoint::EndpointTool;

/// Whether a tool only reads or can change downstream state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Read,
    Write,
}

/// Method and path template a tool calls, used as the coarse endpoint tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: HttpMethod,
    pub path: String,
}

impl Endpoint {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Executes a tool against its arguments.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn execute(&self, arguments: &Value) -> Result<Value, ExecutionError>;
}

/// An immutable tool definition, owned by the registry for the process lifetime.
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub required_fields: Vec<String>,
    pub endpoint: Endpoint,
    pub handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("required_fields", &self.required_fields)
            .field("endpoint", &self.endpoint.to_string())
            .finish()
    }
}

impl ToolDefinition {
    pub fn is_write(&self) -> bool {
        self.category == ToolCategory::Write
    }

    /// Every required field that is absent, null, or an empty string, in declaration order.
    pub fn missing_fields(&self, arguments: &Value) -> Vec<String> {
        self.required_fields
            .iter()
            .filter(|field| match arguments.get(field.as_str()) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .cloned()
            .collect()
    }
}

/// Public description of a tool, as listed to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSummary {
    pub name: String,
    pub category: ToolCategory,
    pub description: String,
    pub required_fields: Vec<String>,
}

/// Catalog of tools plus the independent allowlist that gates it.
pub struct ToolRegistry {
    allowlist: ToolAllowlist,
    catalog: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new(allowlist: ToolAllowlist) -> Self {
        Self {
            allowlist,
            catalog: HashMap::new(),
        }
    }

    /// Add a definition to the catalog. A later definition with the same name replaces it.
    pub fn register(&mut self, definition: ToolDefinition) {
        if !self.allowlist.is_allowed(&definition.name) {
            tracing::debug!(tool = %definition.name, "registered tool is not allowlisted");
        }
        self.catalog.insert(definition.name.clone(), definition);
    }

    /// Look up a tool. The allowlist is consulted before the catalog.
    pub fn lookup(&self, name: &str) -> Option<&ToolDefinition> {
        if !self.allowlist.is_allowed(name) {
            return None;
        }
        self.catalog.get(name)
    }

    /// Reachable tools, sorted by name.
    pub fn list(&self) -> Vec<ToolSummary> {
        let mut tools: Vec<ToolSummary> = self
            .catalog
            .values()
            .filter(|def| self.allowlist.is_allowed(&def.name))
            .map(|def| ToolSummary {
                name: def.name.clone(),
                category: def.category,
                description: def.description.clone(),
                required_fields: def.required_fields.clone(),
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }
}
