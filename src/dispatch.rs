// ABOUTME: Dispatcher — the single entry point for tool calls from the transport layer.
// ABOUTME: Allowlist, then content gate, then read execution or write validation and proposal.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::approval::{ApprovalCoordinator, CallbackRequest, FollowUpScheduler, ProposalView, execute_with_timeout};
use crate::downstream::HttpMethod;
use crate::error::{GateError, GateResult};
use crate::scanner::{ContentClassifier, redact_value};
use crate::tools::ToolRegistry;

/// Process-wide handling of write tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperatingMode {
    #[default]
    Live,
    /// Writes report what they would call; nothing is proposed or sent.
    DryRun,
}

/// What a caller learns when content was withheld.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockedNotice {
    pub task_created: bool,
}

impl BlockedNotice {
    pub const REASON: &'static str = "phi_pii_detected";

    pub fn message(&self) -> &'static str {
        if self.task_created {
            "The request contained sensitive information and was not processed. A manual callback task was created."
        } else {
            "The request contained sensitive information and was not processed. Follow up manually."
        }
    }
}

/// The downstream call a write would have made.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DryRunReport {
    pub tool: String,
    pub method: HttpMethod,
    pub path: String,
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// A read tool ran.
    Executed(Value),
    Proposed(ProposalView),
    Blocked(BlockedNotice),
    DryRun(DryRunReport),
}

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    classifier: Arc<dyn ContentClassifier>,
    coordinator: Arc<ApprovalCoordinator>,
    follow_up: Arc<dyn FollowUpScheduler>,
    mode: OperatingMode,
    execution_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        classifier: Arc<dyn ContentClassifier>,
        coordinator: Arc<ApprovalCoordinator>,
        follow_up: Arc<dyn FollowUpScheduler>,
        mode: OperatingMode,
        execution_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            classifier,
            coordinator,
            follow_up,
            mode,
            execution_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub async fn dispatch(&self, tool_name: &str, arguments: Value) -> GateResult<DispatchOutcome> {
        let definition = self
            .registry
            .lookup(tool_name)
            .ok_or_else(|| GateError::UnknownTool(tool_name.to_string()))?;

        let verdict = self.classifier.scan(&arguments);
        if verdict.blocked {
            tracing::warn!(tool = %tool_name, "tool call blocked by content filter");
            let task_created = self.schedule_follow_up(tool_name, &arguments).await;
            return Ok(DispatchOutcome::Blocked(BlockedNotice { task_created }));
        }

        if !definition.is_write() {
            let result =
                execute_with_timeout(definition, &arguments, self.execution_timeout).await?;
            tracing::debug!(tool = %tool_name, "read tool executed");
            return Ok(DispatchOutcome::Executed(result));
        }

        let missing = definition.missing_fields(&arguments);
        if !missing.is_empty() {
            return Err(GateError::MissingFields(missing));
        }
        match self.mode {
            OperatingMode::DryRun => {
                tracing::info!(tool = %tool_name, "dry run, write not proposed");
                Ok(DispatchOutcome::DryRun(DryRunReport {
                    tool: definition.name.clone(),
                    method: definition.endpoint.method,
                    path: definition.endpoint.path.clone(),
                    params: redact_value(&arguments, self.classifier.as_ref()),
                }))
            }
            OperatingMode::Live => {
                let proposed = self.coordinator.propose(tool_name, arguments)?;
                Ok(DispatchOutcome::Proposed(proposed.view))
            }
        }
    }

    /// Best effort. Any failure, including a hang, reads as "not created".
    async fn schedule_follow_up(&self, tool_name: &str, arguments: &Value) -> bool {
        let request = CallbackRequest::from_blocked(tool_name, arguments, self.classifier.as_ref());
        match tokio::time::timeout(self.execution_timeout, self.follow_up.schedule_callback(&request))
            .await
        {
            Ok(Ok(())) => {
                tracing::info!(tool = %tool_name, "callback task created for blocked call");
                true
            }
            Ok(Err(err)) => {
                tracing::warn!(tool = %tool_name, error = %err, "callback task not created");
                false
            }
            Err(_) => {
                tracing::warn!(tool = %tool_name, "callback task timed out");
                false
            }
        }
    }
}
