// ABOUTME: Error taxonomy for the gate — validation, lifecycle, execution, and internal failures.
// ABOUTME: Policy blocks are not errors; they are a DispatchOutcome variant.

use thiserror::Error;

use crate::downstream::ExecutionError;

/// Every failure a gate operation can report to its caller.
#[derive(Debug, Error)]
pub enum GateError {
    // ── Validation ──────────────────────────────────────────────────────
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    // ── Lifecycle ───────────────────────────────────────────────────────
    #[error("proposal not found")]
    ProposalNotFound,

    // ── Execution ───────────────────────────────────────────────────────
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    // ── Internal ────────────────────────────────────────────────────────
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        GateError::Internal(err.into())
    }
}

/// Failures of the proposal store's durable backing.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("proposal snapshot io: {0}")]
    Io(#[from] std::io::Error),

    #[error("proposal snapshot encoding: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("proposal id collision: {0}")]
    IdCollision(String),
}

pub type GateResult<T> = Result<T, GateError>;
