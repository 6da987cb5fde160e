// ABOUTME: Integration tests for the assembled gate, driven through the JSON-RPC surface.
// ABOUTME: Covers the propose/approve lifecycle, expiry, blocking, and concurrent approvals.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use toolgate::app::Gate;
use toolgate::clock::ManualClock;
use toolgate::config::Config;
use toolgate::downstream::{Downstream, DownstreamRequest, ExecutionError};
use toolgate::rpc::codes;

/// Downstream fake that records every request and answers after an optional delay.
#[derive(Default)]
struct RecordingDownstream {
    requests: Mutex<Vec<DownstreamRequest>>,
    delay: Duration,
}

impl RecordingDownstream {
    fn with_delay(delay: Duration) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            delay,
        }
    }

    fn paths(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }
}

#[async_trait]
impl Downstream for RecordingDownstream {
    async fn send(&self, request: DownstreamRequest) -> Result<Value, ExecutionError> {
        self.requests.lock().unwrap().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(json!({ "id": "created-1" }))
    }
}

struct Harness {
    gate: Gate,
    downstream: Arc<RecordingDownstream>,
    clock: Arc<ManualClock>,
    next_id: std::sync::atomic::AtomicI64,
}

impl Harness {
    fn new(config: Config, downstream: RecordingDownstream) -> Self {
        let downstream = Arc::new(downstream);
        let clock = Arc::new(ManualClock::default());
        let gate = Gate::assemble(&config, downstream.clone(), clock.clone()).unwrap();
        Self {
            gate,
            downstream,
            clock,
            next_id: std::sync::atomic::AtomicI64::new(1),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Value {
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let request = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let line = self.gate.rpc.handle_line(&request.to_string()).await.unwrap();
        let response: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(response["id"], id);
        response
    }
}

fn config_with_ttl(seconds: u64) -> Config {
    let mut config = Config::default();
    config.gate.proposal_ttl_seconds = seconds;
    config
}

fn task_arguments() -> Value {
    json!({ "title": "T", "dueDateTime": "2026-02-18T17:00:00-05:00", "contactId": "C1" })
}

#[tokio::test]
async fn proposal_expires_after_ttl_even_before_sweep() {
    let h = Harness::new(config_with_ttl(3), RecordingDownstream::default());

    let proposed = h
        .call("tools/call", json!({ "name": "tasks_create", "arguments": task_arguments() }))
        .await;
    let result = &proposed["result"];
    assert_eq!(result["status"], "proposed");
    assert_eq!(result["tool"], "tasks_create");
    assert_eq!(result["summary"], "tasks_create with fields: contactId, dueDateTime, title");
    let id = result["proposal_id"].as_str().unwrap().to_string();

    let fetched = h.call("tools/proposals/get", json!({ "proposal_id": id })).await;
    assert_eq!(fetched["result"]["status"], "pending");
    assert_eq!(fetched["result"]["params_hash"], result["params_hash"]);

    h.clock.advance(chrono::Duration::milliseconds(3500));

    let gone = h.call("tools/proposals/get", json!({ "proposal_id": id })).await;
    assert_eq!(gone["error"]["code"], codes::PROPOSAL_NOT_FOUND);
    assert!(h.downstream.paths().is_empty());
}

#[tokio::test]
async fn approving_an_expired_proposal_reports_expired() {
    let h = Harness::new(config_with_ttl(3), RecordingDownstream::default());
    let proposed = h
        .call("tools/call", json!({ "name": "tasks_create", "arguments": task_arguments() }))
        .await;
    let id = proposed["result"]["proposal_id"].as_str().unwrap().to_string();

    h.clock.advance(chrono::Duration::seconds(4));

    let resp = h
        .call("tools/approve", json!({ "proposal_id": id, "approve": true }))
        .await;
    assert_eq!(resp["result"]["status"], "expired");
    assert!(h.downstream.paths().is_empty());

    let again = h
        .call("tools/approve", json!({ "proposal_id": id, "approve": true }))
        .await;
    assert_eq!(again["error"]["code"], codes::PROPOSAL_NOT_FOUND);
}

#[tokio::test]
async fn approve_executes_once_then_not_found() {
    let h = Harness::new(Config::default(), RecordingDownstream::default());
    let proposed = h
        .call("tools/call", json!({ "name": "tasks_create", "arguments": task_arguments() }))
        .await;
    let id = proposed["result"]["proposal_id"].as_str().unwrap().to_string();
    assert!(h.downstream.paths().is_empty());

    let approved = h
        .call("tools/approve", json!({ "proposal_id": id, "approve": true }))
        .await;
    assert_eq!(approved["result"]["status"], "approved");
    assert_eq!(approved["result"]["result"]["id"], "created-1");
    assert_eq!(h.downstream.paths(), vec!["POST /contacts/C1/tasks"]);

    let body = h.downstream.requests.lock().unwrap()[0].body.clone().unwrap();
    assert_eq!(body, json!({ "title": "T", "dueDateTime": "2026-02-18T17:00:00-05:00" }));

    for approve in [true, false] {
        let again = h
            .call("tools/approve", json!({ "proposal_id": id, "approve": approve }))
            .await;
        assert_eq!(again["error"]["code"], codes::PROPOSAL_NOT_FOUND);
    }
    assert_eq!(h.downstream.paths().len(), 1);
}

#[tokio::test]
async fn approved_update_with_dot_segment_id_is_not_sent() {
    let h = Harness::new(Config::default(), RecordingDownstream::default());
    let proposed = h
        .call(
            "tools/call",
            json!({ "name": "contacts_update", "arguments": { "contactId": "..", "firstName": "Ann" } }),
        )
        .await;
    let id = proposed["result"]["proposal_id"].as_str().unwrap().to_string();

    let resp = h
        .call("tools/approve", json!({ "proposal_id": id, "approve": true }))
        .await;
    assert_eq!(resp["error"]["code"], codes::EXECUTION_ERROR);
    assert_eq!(resp["error"]["data"]["endpoint"], "PUT /contacts/{contactId}");
    assert_eq!(resp["error"]["data"]["kind"], "invalid request");
    assert!(h.downstream.paths().is_empty());
    assert!(h.gate.store.is_empty());
}

#[tokio::test]
async fn reject_then_get_is_not_found() {
    let h = Harness::new(Config::default(), RecordingDownstream::default());
    let proposed = h
        .call("tools/call", json!({ "name": "tasks_create", "arguments": task_arguments() }))
        .await;
    let id = proposed["result"]["proposal_id"].as_str().unwrap().to_string();

    let rejected = h
        .call("tools/approve", json!({ "proposal_id": id, "approve": false }))
        .await;
    assert_eq!(rejected["result"]["status"], "rejected");

    let gone = h.call("tools/proposals/get", json!({ "proposal_id": id })).await;
    assert_eq!(gone["error"]["code"], codes::PROPOSAL_NOT_FOUND);
    assert!(h.downstream.paths().is_empty());
}

#[tokio::test]
async fn ssn_in_arguments_is_blocked_sensitive() {
    let h = Harness::new(Config::default(), RecordingDownstream::default());
    let resp = h
        .call(
            "tools/call",
            json!({ "name": "notes_create", "arguments": { "note": "SSN 123-45-6789" } }),
        )
        .await;
    let result = &resp["result"];
    assert_eq!(result["status"], "blocked_sensitive");
    assert_eq!(result["reason"], "phi_pii_detected");
    // No contact id to attach a callback to.
    assert_eq!(result["task_created"], false);
    assert!(!resp.to_string().contains("123-45-6789"));
    assert!(h.gate.store.is_empty());
    assert!(h.downstream.paths().is_empty());
}

#[tokio::test]
async fn blocked_call_with_contact_schedules_callback() {
    let h = Harness::new(Config::default(), RecordingDownstream::default());
    let resp = h
        .call(
            "tools/call",
            json!({ "name": "notes_create",
                    "arguments": { "contactId": "C7", "body": "patient date of birth 04/12/1988" } }),
        )
        .await;
    assert_eq!(resp["result"]["status"], "blocked_sensitive");
    assert_eq!(resp["result"]["task_created"], true);
    assert_eq!(h.downstream.paths(), vec!["POST /contacts/C7/tasks"]);

    let body = h.downstream.requests.lock().unwrap()[0].body.clone().unwrap();
    assert!(!body.to_string().contains("1988"));
    assert!(h.gate.store.is_empty());
}

#[tokio::test]
async fn every_missing_field_is_named() {
    let h = Harness::new(Config::default(), RecordingDownstream::default());
    let resp = h
        .call(
            "tools/call",
            json!({ "name": "appointments_create", "arguments": { "contactId": "C1", "startTime": null } }),
        )
        .await;
    assert_eq!(resp["error"]["code"], codes::INVALID_PARAMS);
    assert_eq!(
        resp["error"]["message"],
        "missing required fields: calendarId, startTime"
    );
    assert!(h.gate.store.is_empty());
}

#[tokio::test]
async fn reads_execute_without_a_proposal() {
    let h = Harness::new(Config::default(), RecordingDownstream::default());
    let resp = h
        .call("tools/call", json!({ "name": "tasks_list", "arguments": { "contactId": "C1" } }))
        .await;
    assert_eq!(resp["result"]["status"], "ok");
    assert_eq!(h.downstream.paths(), vec!["GET /contacts/C1/tasks"]);
    assert!(h.gate.store.is_empty());
}

#[tokio::test]
async fn dry_run_mode_reports_instead_of_proposing() {
    let mut config = Config::default();
    config.gate.dry_run = true;
    let h = Harness::new(config, RecordingDownstream::default());

    let resp = h
        .call("tools/call", json!({ "name": "tasks_create", "arguments": task_arguments() }))
        .await;
    let result = &resp["result"];
    assert_eq!(result["status"], "dry_run");
    assert_eq!(result["method"], "POST");
    assert_eq!(result["path"], "/contacts/{contactId}/tasks");
    assert_eq!(result["params"]["title"], "T");
    assert!(h.gate.store.is_empty());
    assert!(h.downstream.paths().is_empty());
}

#[tokio::test]
async fn allowlist_hides_catalogued_tools() {
    let mut config = Config::default();
    config.tools.allowlist = vec!["contacts_*".to_string()];
    let h = Harness::new(config, RecordingDownstream::default());

    let listed = h.call("tools/list", json!({})).await;
    let names: Vec<&str> = listed["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["contacts_get", "contacts_search", "contacts_update"]);

    let resp = h
        .call("tools/call", json!({ "name": "tasks_create", "arguments": task_arguments() }))
        .await;
    assert_eq!(resp["error"]["code"], codes::INVALID_PARAMS);
    assert_eq!(resp["error"]["message"], "unknown tool: tasks_create");
}

#[tokio::test]
async fn list_is_newest_first_and_filters_status() {
    let h = Harness::new(Config::default(), RecordingDownstream::default());
    let mut ids = Vec::new();
    for title in ["first", "second", "third"] {
        let resp = h
            .call(
                "tools/call",
                json!({ "name": "notes_create", "arguments": { "contactId": "C1", "body": title } }),
            )
            .await;
        ids.push(resp["result"]["proposal_id"].as_str().unwrap().to_string());
        h.clock.advance(chrono::Duration::seconds(1));
    }

    let listed = h.call("tools/proposals/list", json!({ "limit": 2 })).await;
    let listed_ids: Vec<&str> = listed["result"]["proposals"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["proposal_id"].as_str().unwrap())
        .collect();
    assert_eq!(listed_ids, vec![ids[2].as_str(), ids[1].as_str()]);

    let approved = h
        .call("tools/proposals/list", json!({ "status": "approved" }))
        .await;
    assert!(approved["result"]["proposals"].as_array().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_execute_once() {
    let h = Arc::new(Harness::new(
        Config::default(),
        RecordingDownstream::with_delay(Duration::from_millis(100)),
    ));
    let proposed = h
        .call("tools/call", json!({ "name": "tasks_create", "arguments": task_arguments() }))
        .await;
    let id = proposed["result"]["proposal_id"].as_str().unwrap().to_string();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let h = h.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            h.call("tools/approve", json!({ "proposal_id": id, "approve": true }))
                .await
        }));
    }
    let mut responses = Vec::new();
    for handle in handles {
        responses.push(handle.await.unwrap());
    }

    let approved = responses
        .iter()
        .filter(|r| r["result"]["status"] == "approved")
        .count();
    let not_found = responses
        .iter()
        .filter(|r| r["error"]["code"] == codes::PROPOSAL_NOT_FOUND)
        .count();
    assert_eq!(approved, 1);
    assert_eq!(not_found, 1);
    assert_eq!(h.downstream.paths().len(), 1);
}
