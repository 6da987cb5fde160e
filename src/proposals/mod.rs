// ABOUTME: Proposal records — pending write intents awaiting approval, and their derived fields.
// ABOUTME: Fingerprints hash canonical JSON so key order never changes the digest.

pub mod persistence;
pub mod store;
pub mod sweep;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub use persistence::{JsonFileBackend, MemoryBackend, ProposalBackend, ProposalSnapshot};
pub use store::{ListQuery, ProposalStore, Transition};
pub use sweep::Sweeper;

/// Lifecycle state of a proposal. Everything but `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl ProposalStatus {
    pub fn is_terminal(self) -> bool {
        self != ProposalStatus::Pending
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Approved => "approved",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(ProposalStatus::Pending),
            "approved" => Some(ProposalStatus::Approved),
            "rejected" => Some(ProposalStatus::Rejected),
            "expired" => Some(ProposalStatus::Expired),
            _ => None,
        }
    }
}

/// One pending write intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    pub tool_name: String,
    pub arguments: Value,
    pub fingerprint: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ProposalStatus,
}

impl Proposal {
    /// True once `now` has reached `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// SHA-256 hex digest of the canonical JSON form of `arguments`.
pub fn fingerprint(arguments: &Value) -> String {
    let canonical = canonical_json(arguments);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// One-line description built from the sorted top-level argument keys.
pub fn summarize(tool_name: &str, arguments: &Value) -> String {
    let mut keys: Vec<&str> = arguments
        .as_object()
        .map(|map| map.keys().map(String::as_str).collect())
        .unwrap_or_default();
    if keys.is_empty() {
        return format!("{tool_name} with no fields");
    }
    keys.sort_unstable();
    format!("{tool_name} with fields: {}", keys.join(", "))
}

/// Serialize with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
