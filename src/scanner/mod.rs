// ABOUTME: Sensitive-content scanner — classifies tool-call payloads as blocked or clear.
// ABOUTME: Pluggable via ContentClassifier; PatternScanner is the rule-based default.

pub mod redact;
pub mod rules;

use serde_json::Value;

pub use redact::{mask_preview, redact_value};
pub use rules::ProximityCategory;

/// Default character window for keyword/value proximity rules.
pub const DEFAULT_PROXIMITY_WINDOW: usize = 40;

/// Which rule family flagged a payload. Internal only; never sent to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanReason {
    PaymentCard,
    NationalId,
    DocumentId,
    MedicalRecord,
    ClinicalTerm,
    Credential,
    Proximity(ProximityCategory),
}

/// Result of scanning one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanVerdict {
    pub blocked: bool,
    pub reason: Option<ScanReason>,
}

impl ScanVerdict {
    pub fn clear() -> Self {
        Self {
            blocked: false,
            reason: None,
        }
    }

    pub fn blocked(reason: ScanReason) -> Self {
        Self {
            blocked: true,
            reason: Some(reason),
        }
    }
}

/// A classifier that decides whether a payload may pass the gate.
pub trait ContentClassifier: Send + Sync {
    /// Classify flattened text.
    fn scan_text(&self, text: &str) -> ScanVerdict;

    /// Classify an arbitrary JSON payload. Null is clear.
    fn scan(&self, payload: &Value) -> ScanVerdict {
        if payload.is_null() {
            return ScanVerdict::clear();
        }
        self.scan_text(&flatten_payload(payload))
    }
}

/// Rule-based classifier: structural patterns first, then proximity rules.
#[derive(Debug, Clone)]
pub struct PatternScanner {
    window: usize,
}

impl PatternScanner {
    pub fn new(window: usize) -> Self {
        Self { window }
    }
}

impl Default for PatternScanner {
    fn default() -> Self {
        Self::new(DEFAULT_PROXIMITY_WINDOW)
    }
}

impl ContentClassifier for PatternScanner {
    fn scan_text(&self, text: &str) -> ScanVerdict {
        if text.trim().is_empty() {
            return ScanVerdict::clear();
        }
        rules::match_structural(text)
            .or_else(|| rules::match_proximity(text, self.window))
            .map(ScanVerdict::blocked)
            .unwrap_or_else(ScanVerdict::clear)
    }
}

/// Recursively stringify a payload: object keys and scalar leaves, space separated.
pub fn flatten_payload(payload: &Value) -> String {
    let mut out = String::new();
    flatten_into(payload, &mut out);
    out
}

fn flatten_into(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::Bool(b) => push_word(out, if *b { "true" } else { "false" }),
        Value::Number(n) => push_word(out, &n.to_string()),
        Value::String(s) => push_word(out, s),
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                push_word(out, key);
                flatten_into(item, out);
            }
        }
    }
}

fn push_word(out: &mut String, word: &str) {
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(word);
}
