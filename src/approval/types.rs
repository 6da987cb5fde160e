// ABOUTME: Caller-facing types for the propose/approve protocol.
// ABOUTME: ProposalView is the redacted projection; Resolution is the outcome of approve/reject.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::downstream::ExecutionError;
use crate::proposals::{Proposal, ProposalStatus};
use crate::scanner::{ContentClassifier, redact_value};

/// Safe projection of a proposal: no raw sensitive argument values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalView {
    pub proposal_id: String,
    pub tool: String,
    pub summary: String,
    pub params_hash: String,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub params: Value,
}

impl ProposalView {
    pub fn from_proposal(proposal: &Proposal, classifier: &dyn ContentClassifier) -> Self {
        Self {
            proposal_id: proposal.id.clone(),
            tool: proposal.tool_name.clone(),
            summary: proposal.summary.clone(),
            params_hash: proposal.fingerprint.clone(),
            status: proposal.status,
            created_at: proposal.created_at,
            expires_at: proposal.expires_at,
            params: redact_value(&proposal.arguments, classifier),
        }
    }
}

/// A newly created proposal plus its caller-facing projection.
#[derive(Debug, Clone)]
pub struct Proposed {
    pub proposal: Proposal,
    pub view: ProposalView,
}

/// How a resolve call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The proposal was approved and its tool ran exactly once.
    Approved {
        proposal_id: String,
        tool: String,
        outcome: Result<Value, ExecutionError>,
    },
    Rejected {
        proposal_id: String,
        tool: String,
    },
    /// The proposal lapsed before it could be resolved; nothing ran.
    Expired {
        proposal_id: String,
        tool: String,
    },
}

impl Resolution {
    pub fn status(&self) -> &'static str {
        match self {
            Resolution::Approved { .. } => "approved",
            Resolution::Rejected { .. } => "rejected",
            Resolution::Expired { .. } => "expired",
        }
    }

    pub fn proposal_id(&self) -> &str {
        match self {
            Resolution::Approved { proposal_id, .. }
            | Resolution::Rejected { proposal_id, .. }
            | Resolution::Expired { proposal_id, .. } => proposal_id,
        }
    }
}
