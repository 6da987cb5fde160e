// ABOUTME: JSON-RPC 2.0 surface for the gate — tools/call, tools/approve, proposal queries, tools/list.
// ABOUTME: Maps gate outcomes and errors onto wire responses without leaking payloads.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::approval::{ApprovalCoordinator, Resolution};
use crate::dispatch::{BlockedNotice, DispatchOutcome, Dispatcher};
use crate::downstream::ExecutionError;
use crate::error::GateError;
use crate::proposals::{ListQuery, ProposalStatus};

pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const EXECUTION_ERROR: i64 = -32000;
    pub const PROPOSAL_NOT_FOUND: i64 = -32004;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum RpcId {
    Num(i64),
    Str(String),
    Null,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Absent for notifications.
    #[serde(default)]
    pub id: Option<RpcId>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }

    fn execution(err: &ExecutionError, proposal_id: Option<&str>) -> Self {
        let mut data = json!({
            "endpoint": err.endpoint,
            "status": err.status(),
            "kind": err.kind.to_string(),
        });
        if let Some(diagnostic) = &err.diagnostic {
            data["diagnostic"] = Value::String(diagnostic.clone());
        }
        if let Some(id) = proposal_id {
            data["proposal_id"] = Value::String(id.to_string());
        }
        Self {
            code: codes::EXECUTION_ERROR,
            message: "tool execution failed".to_string(),
            data: Some(data),
        }
    }
}

impl From<GateError> for RpcError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::UnknownTool(_) | GateError::MissingFields(_) | GateError::InvalidParams(_) => {
                RpcError::invalid_params(err.to_string())
            }
            GateError::ProposalNotFound => {
                RpcError::new(codes::PROPOSAL_NOT_FOUND, "proposal not found")
            }
            GateError::Execution(e) => RpcError::execution(&e, None),
            GateError::Internal(source) => {
                tracing::error!(error = %source, "internal error handling request");
                RpcError::new(codes::INTERNAL_ERROR, "internal error")
            }
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: RpcId,
}

impl RpcResponse {
    fn ok(id: RpcId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    fn err(id: RpcId, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(error),
            id,
        }
    }
}

#[derive(Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize)]
struct ApproveParams {
    proposal_id: String,
    approve: bool,
}

#[derive(Deserialize)]
struct ListParams {
    limit: Option<usize>,
    status: Option<String>,
}

#[derive(Deserialize)]
struct GetParams {
    proposal_id: String,
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(|e| RpcError::invalid_params(format!("invalid params: {e}")))
}

/// Routes JSON-RPC requests to the dispatcher and coordinator.
pub struct RpcServer {
    dispatcher: Arc<Dispatcher>,
    coordinator: Arc<ApprovalCoordinator>,
}

impl RpcServer {
    pub fn new(dispatcher: Arc<Dispatcher>, coordinator: Arc<ApprovalCoordinator>) -> Self {
        Self {
            dispatcher,
            coordinator,
        }
    }

    /// Handle one line of input. Returns the serialized response, or None for notifications.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let response = match serde_json::from_str::<Value>(line) {
            Err(_) => Some(RpcResponse::err(
                RpcId::Null,
                RpcError::new(codes::PARSE_ERROR, "parse error"),
            )),
            Ok(raw) => match serde_json::from_value::<RpcRequest>(raw) {
                Err(_) => Some(RpcResponse::err(
                    RpcId::Null,
                    RpcError::new(codes::INVALID_REQUEST, "invalid request"),
                )),
                Ok(request) => self.handle(request).await,
            },
        };
        let response = response?;
        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::error!(error = %err, "failed to encode response");
                None
            }
        }
    }

    pub async fn handle(&self, request: RpcRequest) -> Option<RpcResponse> {
        let RpcRequest {
            jsonrpc,
            method,
            params,
            id,
        } = request;

        if jsonrpc != "2.0" {
            return Some(RpcResponse::err(
                id.unwrap_or(RpcId::Null),
                RpcError::new(codes::INVALID_REQUEST, "invalid request"),
            ));
        }

        tracing::debug!(method = %method, "rpc request");
        let outcome = self.route(&method, params).await;

        let id = id?;
        Some(match outcome {
            Ok(result) => RpcResponse::ok(id, result),
            Err(error) => RpcResponse::err(id, error),
        })
    }

    async fn route(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "tools/call" => self.call(parse_params(params)?).await,
            "tools/approve" => self.approve(parse_params(params)?).await,
            "tools/proposals/list" => self.list(parse_params(params)?),
            "tools/proposals/get" => self.get(parse_params(params)?),
            "tools/list" => Ok(json!({ "tools": self.dispatcher.registry().list() })),
            _ => Err(RpcError::new(
                codes::METHOD_NOT_FOUND,
                format!("method not found: {method}"),
            )),
        }
    }

    async fn call(&self, params: CallParams) -> Result<Value, RpcError> {
        let outcome = self.dispatcher.dispatch(&params.name, params.arguments).await?;
        Ok(match outcome {
            DispatchOutcome::Executed(result) => json!({ "status": "ok", "result": result }),
            DispatchOutcome::Proposed(view) => json!({
                "status": "proposed",
                "proposal_id": view.proposal_id,
                "tool": view.tool,
                "params_hash": view.params_hash,
                "summary": view.summary,
                "expires_at": view.expires_at,
            }),
            DispatchOutcome::Blocked(notice) => json!({
                "status": "blocked_sensitive",
                "reason": BlockedNotice::REASON,
                "task_created": notice.task_created,
                "message": notice.message(),
            }),
            DispatchOutcome::DryRun(report) => json!({
                "status": "dry_run",
                "tool": report.tool,
                "method": report.method,
                "path": report.path,
                "params": report.params,
            }),
        })
    }

    async fn approve(&self, params: ApproveParams) -> Result<Value, RpcError> {
        let resolution = self
            .coordinator
            .resolve(&params.proposal_id, params.approve)
            .await?;
        tracing::debug!(
            proposal_id = resolution.proposal_id(),
            status = resolution.status(),
            "resolve finished"
        );
        match resolution {
            Resolution::Approved {
                proposal_id,
                tool,
                outcome: Ok(result),
            } => Ok(json!({
                "status": "approved",
                "proposal_id": proposal_id,
                "tool": tool,
                "result": result,
            })),
            Resolution::Approved {
                proposal_id,
                outcome: Err(err),
                ..
            } => Err(RpcError::execution(&err, Some(&proposal_id))),
            Resolution::Rejected { proposal_id, tool } => Ok(json!({
                "status": "rejected",
                "proposal_id": proposal_id,
                "tool": tool,
            })),
            Resolution::Expired { proposal_id, tool } => Ok(json!({
                "status": "expired",
                "proposal_id": proposal_id,
                "tool": tool,
                "message": "proposal expired before it was resolved",
            })),
        }
    }

    fn list(&self, params: ListParams) -> Result<Value, RpcError> {
        let status = match params.status.as_deref() {
            None => None,
            Some(raw) => Some(
                ProposalStatus::parse(raw)
                    .ok_or_else(|| RpcError::invalid_params(format!("unknown status: {raw}")))?,
            ),
        };
        let mut query = ListQuery {
            status,
            ..ListQuery::default()
        };
        if let Some(limit) = params.limit {
            query.limit = limit;
        }
        let proposals = self.coordinator.list(query)?;
        Ok(json!({ "proposals": proposals }))
    }

    fn get(&self, params: GetParams) -> Result<Value, RpcError> {
        let view = self.coordinator.get(&params.proposal_id)?;
        serde_json::to_value(view).map_err(|e| GateError::Internal(e.into()).into())
    }
}
