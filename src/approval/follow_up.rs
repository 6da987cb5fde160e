// ABOUTME: Fixed-form follow-up scheduled when content is blocked — a manual callback task.
// ABOUTME: Best effort: callers only learn whether the task was created, never why not.

use std::sync::Arc;

use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use crate::downstream::{Downstream, DownstreamRequest, HttpMethod};
use crate::scanner::ContentClassifier;

pub const CALLBACK_TITLE: &str = "Manual callback required";
pub const CALLBACK_BODY: &str =
    "A request was withheld by the content filter. Call the contact back to complete it.";
const CALLBACK_ENDPOINT: &str = "POST /contacts/{contactId}/tasks";

/// What the follow-up is allowed to know about the blocked call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRequest {
    pub tool: String,
    pub contact_id: Option<String>,
}

impl CallbackRequest {
    /// Keep only a contact id that is a plain identifier and not itself sensitive.
    pub fn from_blocked(tool: &str, arguments: &Value, classifier: &dyn ContentClassifier) -> Self {
        let contact_id = arguments
            .get("contactId")
            .and_then(Value::as_str)
            .filter(|id| {
                !id.is_empty()
                    && id.len() <= 64
                    && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            })
            .filter(|id| !classifier.scan_text(id).blocked)
            .map(str::to_string);
        Self {
            tool: tool.to_string(),
            contact_id,
        }
    }
}

/// Schedules the low-privilege follow-up for blocked content.
#[async_trait]
pub trait FollowUpScheduler: Send + Sync {
    async fn schedule_callback(&self, request: &CallbackRequest) -> anyhow::Result<()>;
}

/// Creates a callback task on the contact through the downstream API.
pub struct DownstreamFollowUp {
    downstream: Arc<dyn Downstream>,
    assignee: Option<String>,
}

impl DownstreamFollowUp {
    pub fn new(downstream: Arc<dyn Downstream>, assignee: Option<String>) -> Self {
        Self {
            downstream,
            assignee,
        }
    }
}

#[async_trait]
impl FollowUpScheduler for DownstreamFollowUp {
    async fn schedule_callback(&self, request: &CallbackRequest) -> anyhow::Result<()> {
        let Some(contact_id) = &request.contact_id else {
            bail!("no usable contact id for callback");
        };
        let mut body = json!({
            "title": CALLBACK_TITLE,
            "body": CALLBACK_BODY,
            "dueDate": (Utc::now() + Duration::days(1)).to_rfc3339(),
            "completed": false,
        });
        if let Some(assignee) = &self.assignee {
            body["assignedTo"] = Value::String(assignee.clone());
        }
        self.downstream
            .send(DownstreamRequest {
                method: HttpMethod::Post,
                path: format!("/contacts/{contact_id}/tasks"),
                query: Vec::new(),
                body: Some(body),
                endpoint: CALLBACK_ENDPOINT.to_string(),
            })
            .await
            .context("callback task creation failed")?;
        Ok(())
    }
}

/// Used when follow-ups are turned off in config.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledFollowUp;

#[async_trait]
impl FollowUpScheduler for DisabledFollowUp {
    async fn schedule_callback(&self, _request: &CallbackRequest) -> anyhow::Result<()> {
        bail!("follow-up disabled")
    }
}
