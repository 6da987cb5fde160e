// ABOUTME: Durable backing for the proposal store — full snapshots, replaced atomically.
// ABOUTME: JsonFileBackend writes tmp + rename; MemoryBackend keeps the last snapshot for tests.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Proposal;
use crate::error::StoreError;

/// The persisted document: every live proposal plus a write timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalSnapshot {
    pub updated_at: DateTime<Utc>,
    pub proposals: Vec<Proposal>,
}

/// Storage the proposal store snapshots into after every mutation.
pub trait ProposalBackend: Send + Sync {
    /// Every record in the last snapshot, expired or not.
    fn load(&self) -> Result<Vec<Proposal>, StoreError>;

    /// Replace the stored state with `snapshot`.
    fn snapshot(&self, snapshot: &ProposalSnapshot) -> Result<(), StoreError>;
}

/// JSON file on disk, always replaced whole.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling temporary file the snapshot is written to before the rename.
    pub fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("proposals.json"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ProposalBackend for JsonFileBackend {
    fn load(&self) -> Result<Vec<Proposal>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let snapshot: ProposalSnapshot = serde_json::from_str(&content)?;
        Ok(snapshot.proposals)
    }

    fn snapshot(&self, snapshot: &ProposalSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = self.tmp_path();
        let content = serde_json::to_string_pretty(snapshot)?;
        {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(content.as_bytes())?;
            // Contents must be on disk before the rename makes them visible.
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// In-memory backend; remembers the latest snapshot and how many were taken.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<Option<ProposalSnapshot>>,
    writes: Mutex<usize>,
}

impl MemoryBackend {
    /// Seed the backend as if `proposals` had been snapshotted earlier.
    pub fn with_proposals(proposals: Vec<Proposal>) -> Self {
        Self {
            state: Mutex::new(Some(ProposalSnapshot {
                updated_at: Utc::now(),
                proposals,
            })),
            writes: Mutex::new(0),
        }
    }

    pub fn last_snapshot(&self) -> Option<ProposalSnapshot> {
        self.state.lock().expect("backend lock poisoned").clone()
    }

    pub fn write_count(&self) -> usize {
        *self.writes.lock().expect("backend lock poisoned")
    }
}

impl ProposalBackend for MemoryBackend {
    fn load(&self) -> Result<Vec<Proposal>, StoreError> {
        Ok(self
            .last_snapshot()
            .map(|snapshot| snapshot.proposals)
            .unwrap_or_default())
    }

    fn snapshot(&self, snapshot: &ProposalSnapshot) -> Result<(), StoreError> {
        *self.state.lock().expect("backend lock poisoned") = Some(snapshot.clone());
        *self.writes.lock().expect("backend lock poisoned") += 1;
        Ok(())
    }
}
