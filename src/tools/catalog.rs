// ABOUTME: Built-in tool catalog for the downstream CRM API.
// ABOUTME: Declares each tool's category, required fields, and endpoint template.

use std::sync::Arc;

use super::{Endpoint, EndpointTool, ToolCategory, ToolDefinition, ToolRegistry};
use crate::downstream::{Downstream, HttpMethod};

struct Spec {
    name: &'static str,
    description: &'static str,
    category: ToolCategory,
    required: &'static [&'static str],
    method: HttpMethod,
    path: &'static str,
}

const BUILTIN: &[Spec] = &[
    Spec {
        name: "contacts_get",
        description: "Fetch a single contact by id.",
        category: ToolCategory::Read,
        required: &["contactId"],
        method: HttpMethod::Get,
        path: "/contacts/{contactId}",
    },
    Spec {
        name: "contacts_search",
        description: "Search contacts by free-text query.",
        category: ToolCategory::Read,
        required: &["query"],
        method: HttpMethod::Get,
        path: "/contacts/",
    },
    Spec {
        name: "tasks_list",
        description: "List tasks attached to a contact.",
        category: ToolCategory::Read,
        required: &["contactId"],
        method: HttpMethod::Get,
        path: "/contacts/{contactId}/tasks",
    },
    Spec {
        name: "notes_list",
        description: "List notes attached to a contact.",
        category: ToolCategory::Read,
        required: &["contactId"],
        method: HttpMethod::Get,
        path: "/contacts/{contactId}/notes",
    },
    Spec {
        name: "tasks_create",
        description: "Create a task on a contact.",
        category: ToolCategory::Write,
        required: &["title", "dueDateTime", "contactId"],
        method: HttpMethod::Post,
        path: "/contacts/{contactId}/tasks",
    },
    Spec {
        name: "notes_create",
        description: "Add a note to a contact.",
        category: ToolCategory::Write,
        required: &["contactId", "body"],
        method: HttpMethod::Post,
        path: "/contacts/{contactId}/notes",
    },
    Spec {
        name: "contacts_update",
        description: "Update fields on an existing contact.",
        category: ToolCategory::Write,
        required: &["contactId"],
        method: HttpMethod::Put,
        path: "/contacts/{contactId}",
    },
    Spec {
        name: "appointments_create",
        description: "Book an appointment on a calendar for a contact.",
        category: ToolCategory::Write,
        required: &["calendarId", "contactId", "startTime"],
        method: HttpMethod::Post,
        path: "/calendars/events/appointments",
    },
];

/// Names of every built-in tool; the default allowlist.
pub const BUILTIN_TOOL_NAMES: &[&str] = &[
    "contacts_get",
    "contacts_search",
    "tasks_list",
    "notes_list",
    "tasks_create",
    "notes_create",
    "contacts_update",
    "appointments_create",
];

/// Build the built-in tool definitions against a downstream client.
pub fn builtin_tools(downstream: Arc<dyn Downstream>) -> Vec<ToolDefinition> {
    BUILTIN
        .iter()
        .map(|spec| {
            let endpoint = Endpoint::new(spec.method, spec.path);
            ToolDefinition {
                name: spec.name.to_string(),
                description: spec.description.to_string(),
                category: spec.category,
                required_fields: spec.required.iter().map(|s| s.to_string()).collect(),
                endpoint: endpoint.clone(),
                handler: Arc::new(EndpointTool::new(endpoint, downstream.clone())),
            }
        })
        .collect()
}

/// Register every built-in tool into `registry`.
pub fn register_builtin(registry: &mut ToolRegistry, downstream: Arc<dyn Downstream>) {
    for definition in builtin_tools(downstream) {
        registry.register(definition);
    }
}
