// ABOUTME: Approval coordinator — propose, then approve/reject/expire with at-most-once execution.
// ABOUTME: Claims proposals through the store's per-proposal lock, executes outside it, then retires.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::audit::{AuditEvent, AuditOutcome, AuditSink};
use super::types::{ProposalView, Proposed, Resolution};
use crate::downstream::{ExecutionError, ExecutionErrorKind};
use crate::error::{GateError, GateResult};
use crate::proposals::{ListQuery, Proposal, ProposalStatus, ProposalStore, Transition};
use crate::scanner::ContentClassifier;
use crate::tools::{ToolDefinition, ToolRegistry};

/// Drives the proposal lifecycle on top of the store and registry.
pub struct ApprovalCoordinator {
    store: Arc<ProposalStore>,
    registry: Arc<ToolRegistry>,
    classifier: Arc<dyn ContentClassifier>,
    audit: Arc<dyn AuditSink>,
    execution_timeout: Duration,
}

impl ApprovalCoordinator {
    pub fn new(
        store: Arc<ProposalStore>,
        registry: Arc<ToolRegistry>,
        classifier: Arc<dyn ContentClassifier>,
        audit: Arc<dyn AuditSink>,
        execution_timeout: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            classifier,
            audit,
            execution_timeout,
        }
    }

    pub fn store(&self) -> &Arc<ProposalStore> {
        &self.store
    }

    /// Record a write intent as a pending proposal.
    pub fn propose(&self, tool_name: &str, arguments: Value) -> GateResult<Proposed> {
        let proposal = self.store.create(tool_name, arguments)?;
        tracing::info!(
            proposal_id = %proposal.id,
            tool = %proposal.tool_name,
            expires_at = %proposal.expires_at,
            "write proposed"
        );
        let view = self.view(&proposal);
        Ok(Proposed { proposal, view })
    }

    /// Redacted projection of a proposal.
    pub fn view(&self, proposal: &Proposal) -> ProposalView {
        ProposalView::from_proposal(proposal, self.classifier.as_ref())
    }

    pub fn get(&self, proposal_id: &str) -> GateResult<ProposalView> {
        self.store
            .get(proposal_id)?
            .map(|proposal| self.view(&proposal))
            .ok_or(GateError::ProposalNotFound)
    }

    pub fn list(&self, query: ListQuery) -> GateResult<Vec<ProposalView>> {
        Ok(self
            .store
            .list(query)?
            .iter()
            .map(|proposal| self.view(proposal))
            .collect())
    }

    /// Approve or reject a pending proposal.
    ///
    /// On approval the tool runs exactly once and the proposal is retired
    /// whether or not the run succeeded. A concurrent second call on the same
    /// id observes `ProposalNotFound`.
    pub async fn resolve(&self, proposal_id: &str, approve: bool) -> GateResult<Resolution> {
        let target = if approve {
            ProposalStatus::Approved
        } else {
            ProposalStatus::Rejected
        };

        let proposal = match self.store.transition(proposal_id, target)? {
            Transition::NotFound => return Err(GateError::ProposalNotFound),
            Transition::Expired(proposal) => {
                self.audit(&proposal, AuditOutcome::Expired);
                return Ok(Resolution::Expired {
                    proposal_id: proposal.id,
                    tool: proposal.tool_name,
                });
            }
            Transition::Applied(proposal) => proposal,
        };

        if !approve {
            self.retire(&proposal.id);
            self.audit(&proposal, AuditOutcome::Rejected);
            return Ok(Resolution::Rejected {
                proposal_id: proposal.id,
                tool: proposal.tool_name,
            });
        }

        let outcome = match self.registry.lookup(&proposal.tool_name) {
            Some(definition) => {
                execute_with_timeout(definition, &proposal.arguments, self.execution_timeout).await
            }
            None => Err(ExecutionError::new(
                proposal.tool_name.clone(),
                ExecutionErrorKind::InvalidRequest,
            )),
        };
        self.retire(&proposal.id);

        let audit_outcome = match &outcome {
            Ok(_) => AuditOutcome::Success,
            Err(err) => {
                tracing::warn!(
                    proposal_id = %proposal.id,
                    tool = %proposal.tool_name,
                    endpoint = %err.endpoint,
                    kind = %err.kind,
                    "approved execution failed"
                );
                AuditOutcome::Error
            }
        };
        self.audit(&proposal, audit_outcome);

        Ok(Resolution::Approved {
            proposal_id: proposal.id,
            tool: proposal.tool_name,
            outcome,
        })
    }

    /// Remove a resolved proposal. The in-memory record is gone even if the
    /// snapshot afterwards fails, so the failure is only logged.
    fn retire(&self, proposal_id: &str) {
        if let Err(err) = self.store.remove(proposal_id) {
            tracing::error!(proposal_id, error = %err, "failed to persist proposal retirement");
        }
    }

    fn audit(&self, proposal: &Proposal, outcome: AuditOutcome) {
        self.audit
            .record(&AuditEvent::new(&proposal.id, &proposal.tool_name, outcome));
    }
}

/// Run a tool handler, converting an overrun into a timeout error.
pub async fn execute_with_timeout(
    definition: &ToolDefinition,
    arguments: &Value,
    limit: Duration,
) -> Result<Value, ExecutionError> {
    match tokio::time::timeout(limit, definition.handler.execute(arguments)).await {
        Ok(result) => result,
        Err(_) => Err(ExecutionError::timeout(definition.endpoint.to_string())),
    }
}
