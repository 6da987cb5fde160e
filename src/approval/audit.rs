// ABOUTME: Audit trail for proposal resolutions — one event per approve/reject/expire.
// ABOUTME: Events carry tool, proposal id, and a coarse outcome; never arguments or responses.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse result of a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Error,
    Rejected,
    Expired,
}

impl AuditOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Error => "error",
            AuditOutcome::Rejected => "rejected",
            AuditOutcome::Expired => "expired",
        }
    }
}

/// A single audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub proposal_id: String,
    pub tool: String,
    pub outcome: AuditOutcome,
}

impl AuditEvent {
    pub fn new(proposal_id: &str, tool: &str, outcome: AuditOutcome) -> Self {
        Self {
            timestamp: Utc::now(),
            proposal_id: proposal_id.to_string(),
            tool: tool.to_string(),
            outcome,
        }
    }
}

/// Destination for audit events. Recording must not fail the resolution.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Emits audit events through `tracing` under the `toolgate::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        tracing::info!(
            target: "toolgate::audit",
            proposal_id = %event.proposal_id,
            tool = %event.tool,
            outcome = event.outcome.as_str(),
            "proposal resolved"
        );
    }
}

/// Appends audit events as JSONL lines to a timestamped file.
pub struct JsonlAuditSink {
    writer: Mutex<BufWriter<File>>,
    pub path: PathBuf,
}

impl JsonlAuditSink {
    /// Create the directory if needed and open a new `audit-<timestamp>.jsonl` file in it.
    pub fn new_in_dir(dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(dir)?;
        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let path = dir.join(format!("audit-{}.jsonl", timestamp));
        let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    fn append(&self, event: &AuditEvent) -> anyhow::Result<()> {
        let line = serde_json::to_string(event)?;
        let mut writer = self.writer.lock().expect("audit writer lock poisoned");
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Err(e) = self.append(event) {
            tracing::error!(error = %e, proposal_id = %event.proposal_id, "failed to write audit event");
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit lock poisoned").clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events
            .lock()
            .expect("audit lock poisoned")
            .push(event.clone());
    }
}

/// Fan out to several sinks.
impl AuditSink for Vec<Arc<dyn AuditSink>> {
    fn record(&self, event: &AuditEvent) {
        for sink in self {
            sink.record(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jsonl_files(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
            .collect()
    }

    #[test]
    fn jsonl_sink_writes_one_line_per_event() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("audit");
        let sink = JsonlAuditSink::new_in_dir(&dir).unwrap();
        sink.record(&AuditEvent::new("p1", "tasks_create", AuditOutcome::Success));
        sink.record(&AuditEvent::new("p2", "notes_create", AuditOutcome::Rejected));

        let files = jsonl_files(&dir);
        assert_eq!(files.len(), 1, "should have exactly one JSONL file");
        let content = fs::read_to_string(&files[0]).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: AuditEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.proposal_id, "p1");
        assert_eq!(first.outcome, AuditOutcome::Success);
        let raw: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(raw["outcome"], "rejected");
        assert!(raw.get("arguments").is_none());
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = Arc::new(MemoryAuditSink::default());
        let b = Arc::new(MemoryAuditSink::default());
        let sinks: Vec<Arc<dyn AuditSink>> = vec![a.clone(), b.clone(), Arc::new(TracingAuditSink)];
        sinks.record(&AuditEvent::new("p1", "tasks_create", AuditOutcome::Error));
        assert_eq!(a.events().len(), 1);
        assert_eq!(b.events()[0].outcome, AuditOutcome::Error);
    }
}
