// ABOUTME: Proposal store — owns live proposals with one lock per proposal and lazy expiry.
// ABOUTME: Every mutation is followed by a full snapshot when a durable backend is configured.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::persistence::{ProposalBackend, ProposalSnapshot};
use super::{Proposal, ProposalStatus, fingerprint, summarize};
use crate::clock::Clock;
use crate::error::StoreError;

/// Per-proposal unit of mutation. Slot locks are leaf locks: nothing else is
/// acquired while one is held.
type Slot = Arc<Mutex<Proposal>>;

/// Result of a status transition attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The proposal was pending and now carries the requested status.
    Applied(Proposal),
    /// The proposal had lapsed; it is now expired and removed.
    Expired(Proposal),
    /// No pending proposal with that id.
    NotFound,
}

/// Options for `ProposalStore::list`.
#[derive(Debug, Clone, Copy)]
pub struct ListQuery {
    pub limit: usize,
    pub status: Option<ProposalStatus>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            status: None,
        }
    }
}

/// Keyed collection of proposals with TTL-based expiry.
pub struct ProposalStore {
    slots: RwLock<HashMap<String, Slot>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
    backend: Option<Arc<dyn ProposalBackend>>,
    persist_lock: Mutex<()>,
    sweeping: AtomicBool,
}

impl ProposalStore {
    /// A store without durable backing.
    pub fn in_memory(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
            backend: None,
            persist_lock: Mutex::new(()),
            sweeping: AtomicBool::new(false),
        }
    }

    /// Open a store over `backend`, reloading only pending, unexpired records.
    pub fn open(
        ttl: Duration,
        clock: Arc<dyn Clock>,
        backend: Arc<dyn ProposalBackend>,
    ) -> Result<Self, StoreError> {
        let mut store = Self::in_memory(ttl, clock);
        let now = store.clock.now();
        let records = backend.load()?;
        let total = records.len();
        {
            let slots = store.slots.get_mut().expect("proposal map lock poisoned");
            for proposal in records {
                if proposal.status == ProposalStatus::Pending && !proposal.is_expired_at(now) {
                    slots.insert(proposal.id.clone(), Arc::new(Mutex::new(proposal)));
                }
            }
        }
        store.backend = Some(backend);
        let kept = store.len();
        if kept != total {
            store.persist()?;
        }
        tracing::info!(kept, dropped = total - kept, "proposal store loaded");
        Ok(store)
    }

    /// Number of records currently held, including ones awaiting lazy expiry.
    pub fn len(&self) -> usize {
        self.slots.read().expect("proposal map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create and store a new pending proposal.
    pub fn create(&self, tool_name: &str, arguments: Value) -> Result<Proposal, StoreError> {
        let created_at = self.clock.now();
        let proposal = Proposal {
            id: Uuid::new_v4().to_string(),
            tool_name: tool_name.to_string(),
            fingerprint: fingerprint(&arguments),
            summary: summarize(tool_name, &arguments),
            arguments,
            created_at,
            expires_at: created_at + self.ttl,
            status: ProposalStatus::Pending,
        };

        {
            let mut slots = self.slots.write().expect("proposal map lock poisoned");
            if slots.contains_key(&proposal.id) {
                return Err(StoreError::IdCollision(proposal.id));
            }
            slots.insert(proposal.id.clone(), Arc::new(Mutex::new(proposal.clone())));
        }

        if let Err(err) = self.persist() {
            self.slots
                .write()
                .expect("proposal map lock poisoned")
                .remove(&proposal.id);
            return Err(err);
        }
        tracing::debug!(proposal_id = %proposal.id, tool = %proposal.tool_name, "proposal created");
        Ok(proposal)
    }

    /// Fetch a live proposal. An expired pending record is reclassified, removed,
    /// and reported as absent.
    pub fn get(&self, id: &str) -> Result<Option<Proposal>, StoreError> {
        let Some(slot) = self.slot(id) else {
            return Ok(None);
        };
        let now = self.clock.now();
        let (found, expired) = {
            let mut proposal = slot.lock().expect("proposal lock poisoned");
            let status = proposal.status;
            match status {
                ProposalStatus::Pending if proposal.is_expired_at(now) => {
                    proposal.status = ProposalStatus::Expired;
                    (None, true)
                }
                ProposalStatus::Pending | ProposalStatus::Approved => {
                    (Some(proposal.clone()), false)
                }
                ProposalStatus::Rejected | ProposalStatus::Expired => (None, false),
            }
        };
        if expired {
            tracing::debug!(proposal_id = %id, "proposal expired on read");
            self.remove_many(&[id.to_string()])?;
        }
        Ok(found)
    }

    /// Live proposals, newest first, optionally filtered by status.
    pub fn list(&self, query: ListQuery) -> Result<Vec<Proposal>, StoreError> {
        let now = self.clock.now();
        let slots: Vec<Slot> = self
            .slots
            .read()
            .expect("proposal map lock poisoned")
            .values()
            .cloned()
            .collect();

        let mut expired = Vec::new();
        let mut live = Vec::new();
        for slot in slots {
            let mut proposal = slot.lock().expect("proposal lock poisoned");
            if proposal.status == ProposalStatus::Pending && proposal.is_expired_at(now) {
                proposal.status = ProposalStatus::Expired;
                expired.push(proposal.id.clone());
                continue;
            }
            if query.status.is_none_or(|status| status == proposal.status) {
                live.push(proposal.clone());
            }
        }
        if !expired.is_empty() {
            self.remove_many(&expired)?;
        }

        live.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        live.truncate(query.limit);
        Ok(live)
    }

    /// Apply a terminal transition to a pending proposal.
    ///
    /// Returns None if the proposal is gone, already terminal, or expired; an
    /// expired record is reclassified and removed on the way. Exactly one of
    /// any number of concurrent callers on the same id can succeed.
    pub fn set_status(
        &self,
        id: &str,
        status: ProposalStatus,
    ) -> Result<Option<Proposal>, StoreError> {
        Ok(match self.transition(id, status)? {
            Transition::Applied(proposal) => Some(proposal),
            Transition::Expired(_) | Transition::NotFound => None,
        })
    }

    /// Like `set_status`, but distinguishes a lapsed proposal from a missing one.
    pub fn transition(&self, id: &str, status: ProposalStatus) -> Result<Transition, StoreError> {
        if !status.is_terminal() {
            return Ok(Transition::NotFound);
        }
        let Some(slot) = self.slot(id) else {
            return Ok(Transition::NotFound);
        };
        let now = self.clock.now();
        let transition = {
            let mut proposal = slot.lock().expect("proposal lock poisoned");
            if proposal.status != ProposalStatus::Pending {
                Transition::NotFound
            } else if proposal.is_expired_at(now) {
                proposal.status = ProposalStatus::Expired;
                Transition::Expired(proposal.clone())
            } else {
                proposal.status = status;
                Transition::Applied(proposal.clone())
            }
        };

        match &transition {
            Transition::Expired(_) => {
                self.remove_many(&[id.to_string()])?;
            }
            Transition::Applied(_) => self.persist()?,
            Transition::NotFound => {}
        }
        Ok(transition)
    }

    /// Whether `id` exists but has passed its expiry, without mutating it.
    pub fn is_expired(&self, id: &str) -> bool {
        let now = self.clock.now();
        self.slot(id).is_some_and(|slot| {
            let proposal = slot.lock().expect("proposal lock poisoned");
            proposal.status == ProposalStatus::Expired
                || (proposal.status == ProposalStatus::Pending && proposal.is_expired_at(now))
        })
    }

    /// Retire a proposal, returning its final state if it was still held.
    pub fn remove(&self, id: &str) -> Result<Option<Proposal>, StoreError> {
        let removed = self
            .slots
            .write()
            .expect("proposal map lock poisoned")
            .remove(id);
        let Some(slot) = removed else {
            return Ok(None);
        };
        self.persist()?;
        let proposal = slot.lock().expect("proposal lock poisoned").clone();
        Ok(Some(proposal))
    }

    /// Remove every record past its expiry. Only one sweep runs at a time; a
    /// concurrent call returns 0 immediately.
    pub fn sweep(&self) -> Result<usize, StoreError> {
        if self.sweeping.swap(true, Ordering::AcqRel) {
            return Ok(0);
        }
        let _guard = SweepGuard(&self.sweeping);

        let now = self.clock.now();
        let slots: Vec<Slot> = self
            .slots
            .read()
            .expect("proposal map lock poisoned")
            .values()
            .cloned()
            .collect();

        let mut expired = Vec::new();
        for slot in slots {
            let mut proposal = slot.lock().expect("proposal lock poisoned");
            if proposal.is_expired_at(now) {
                if proposal.status == ProposalStatus::Pending {
                    proposal.status = ProposalStatus::Expired;
                }
                expired.push(proposal.id.clone());
            }
        }
        if expired.is_empty() {
            return Ok(0);
        }
        self.remove_many(&expired)
    }

    fn slot(&self, id: &str) -> Option<Slot> {
        self.slots
            .read()
            .expect("proposal map lock poisoned")
            .get(id)
            .cloned()
    }

    fn remove_many(&self, ids: &[String]) -> Result<usize, StoreError> {
        let removed = {
            let mut slots = self.slots.write().expect("proposal map lock poisoned");
            ids.iter().filter(|id| slots.remove(id.as_str()).is_some()).count()
        };
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Write a full snapshot of every held record. Serialized so temporary files
    /// never interleave and the last writer always reflects the latest state.
    fn persist(&self) -> Result<(), StoreError> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        let _persist = self.persist_lock.lock().expect("persist lock poisoned");
        let slots: Vec<Slot> = self
            .slots
            .read()
            .expect("proposal map lock poisoned")
            .values()
            .cloned()
            .collect();
        let mut proposals: Vec<Proposal> = slots
            .iter()
            .map(|slot| slot.lock().expect("proposal lock poisoned").clone())
            .collect();
        proposals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let snapshot = ProposalSnapshot {
            updated_at: Utc::now(),
            proposals,
        };
        backend.snapshot(&snapshot).inspect_err(|err| {
            tracing::error!(error = %err, "failed to snapshot proposals");
        })
    }
}

struct SweepGuard<'a>(&'a AtomicBool);

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
