// ABOUTME: Approval protocol — coordinator, caller-facing views, audit trail, and follow-ups.
// ABOUTME: Writes become proposals here and execute only after an explicit approve.

pub mod audit;
pub mod coordinator;
pub mod follow_up;
pub mod types;

pub use audit::{AuditEvent, AuditOutcome, AuditSink, JsonlAuditSink, MemoryAuditSink, TracingAuditSink};
pub use coordinator::{ApprovalCoordinator, execute_with_timeout};
pub use follow_up::{CallbackRequest, DisabledFollowUp, DownstreamFollowUp, FollowUpScheduler};
pub use types::{ProposalView, Proposed, Resolution};
