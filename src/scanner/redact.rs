// ABOUTME: Redaction for caller-facing projections and diagnostics.
// ABOUTME: Masks values the classifier flags to a head/tail preview and truncates long strings.

use serde_json::{Map, Value};

use super::ContentClassifier;

/// Longest string leaf passed through unmodified.
pub const MAX_VALUE_CHARS: usize = 120;

/// Shortest value that still gets a head/tail preview instead of a full mask.
const MIN_PREVIEW_CHARS: usize = 8;

/// Mask a sensitive value down to its first and last two characters.
pub fn mask_preview(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < MIN_PREVIEW_CHARS {
        return "****".to_string();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}…{tail}")
}

/// Truncate a string to MAX_VALUE_CHARS, noting how much was dropped.
pub fn truncate_value(value: &str) -> String {
    let count = value.chars().count();
    if count <= MAX_VALUE_CHARS {
        return value.to_string();
    }
    let kept: String = value.chars().take(MAX_VALUE_CHARS).collect();
    format!("{kept}…(+{} chars)", count - MAX_VALUE_CHARS)
}

/// Produce a copy of `value` safe to show a caller or write to a log.
///
/// Object entries are classified together with their key so that proximity
/// rules (e.g. a `dob` key next to a date) apply to individual fields.
pub fn redact_value(value: &Value, classifier: &dyn ContentClassifier) -> Value {
    redact_with_context(value, None, classifier)
}

fn redact_with_context(
    value: &Value,
    key: Option<&str>,
    classifier: &dyn ContentClassifier,
) -> Value {
    match value {
        Value::String(s) => {
            if is_sensitive(key, s, classifier) {
                Value::String(mask_preview(s))
            } else {
                Value::String(truncate_value(s))
            }
        }
        Value::Number(n) => {
            let text = n.to_string();
            if is_sensitive(key, &text, classifier) {
                Value::String(mask_preview(&text))
            } else {
                value.clone()
            }
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| redact_with_context(item, key, classifier))
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), redact_with_context(v, Some(k), classifier));
            }
            Value::Object(out)
        }
        Value::Null | Value::Bool(_) => value.clone(),
    }
}

fn is_sensitive(key: Option<&str>, text: &str, classifier: &dyn ContentClassifier) -> bool {
    match key {
        Some(key) => classifier.scan_text(&format!("{key} {text}")).blocked,
        None => classifier.scan_text(text).blocked,
    }
}
