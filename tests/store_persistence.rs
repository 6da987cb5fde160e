// ABOUTME: Integration tests for the JSON-file backed proposal store.
// ABOUTME: Persist/reload round trips, expiry on reload, and snapshot file format.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use toolgate::clock::ManualClock;
use toolgate::proposals::{JsonFileBackend, ProposalStatus, ProposalStore};

fn open(path: &std::path::Path, clock: Arc<ManualClock>) -> ProposalStore {
    ProposalStore::open(
        Duration::from_secs(3),
        clock,
        Arc::new(JsonFileBackend::new(path)),
    )
    .unwrap()
}

#[test]
fn reload_keeps_unexpired_proposals_with_identical_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("proposals.json");
    let clock = Arc::new(ManualClock::default());

    let store = open(&path, clock.clone());
    let early = store
        .create("tasks_create", json!({ "title": "early", "contactId": "C1" }))
        .unwrap();
    clock.advance(chrono::Duration::seconds(2));
    let late = store
        .create("notes_create", json!({ "contactId": "C1", "body": "late" }))
        .unwrap();
    drop(store);

    // `early` lapses at t=3s, `late` at t=5s.
    clock.advance(chrono::Duration::milliseconds(1500));
    let reopened = open(&path, clock.clone());

    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.get(&early.id).unwrap(), None);
    let reloaded = reopened.get(&late.id).unwrap().unwrap();
    assert_eq!(reloaded, late);
    assert_eq!(reloaded.fingerprint, late.fingerprint);
    assert_eq!(reloaded.summary, "notes_create with fields: body, contactId");
}

#[test]
fn resolved_proposals_are_not_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("proposals.json");
    let clock = Arc::new(ManualClock::default());

    let store = open(&path, clock.clone());
    let approved = store.create("tasks_create", json!({ "title": "a" })).unwrap();
    let rejected = store.create("tasks_create", json!({ "title": "b" })).unwrap();
    let pending = store.create("tasks_create", json!({ "title": "c" })).unwrap();
    store.set_status(&approved.id, ProposalStatus::Approved).unwrap();
    store.set_status(&rejected.id, ProposalStatus::Rejected).unwrap();
    drop(store);

    let reopened = open(&path, clock);
    assert_eq!(reopened.len(), 1);
    assert!(reopened.get(&pending.id).unwrap().is_some());
}

#[test]
fn snapshot_is_camel_case_and_tmp_file_is_gone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("proposals.json");
    let clock = Arc::new(ManualClock::default());

    let store = open(&path, clock);
    let proposal = store.create("tasks_create", json!({ "title": "T" })).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw["updatedAt"].is_string());
    let record = &raw["proposals"][0];
    assert_eq!(record["id"], proposal.id.as_str());
    assert_eq!(record["toolName"], "tasks_create");
    assert_eq!(record["status"], "pending");
    assert!(record["expiresAt"].is_string());
    assert!(!JsonFileBackend::new(&path).tmp_path().exists());
}

#[test]
fn sweep_persists_removals() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("proposals.json");
    let clock = Arc::new(ManualClock::default());

    let store = open(&path, clock.clone());
    store.create("tasks_create", json!({ "title": "T" })).unwrap();
    clock.advance(chrono::Duration::seconds(5));
    assert_eq!(store.sweep().unwrap(), 1);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw["proposals"].as_array().unwrap().is_empty());
}
