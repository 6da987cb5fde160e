// ABOUTME: Tool exposure allowlist with glob pattern matching.
// ABOUTME: Maintained apart from the catalog; a tool must appear in both to be reachable.

use glob::Pattern;

/// A single allowlist entry.
#[derive(Debug, Clone)]
pub struct AllowlistEntry {
    /// The pattern as configured (e.g. `contacts_*`).
    pub raw: String,
    pattern: Option<Pattern>,
}

impl AllowlistEntry {
    fn new(raw: &str) -> Self {
        let pattern = Pattern::new(raw).ok();
        if pattern.is_none() {
            tracing::warn!(pattern = raw, "invalid tool allowlist pattern; matching exactly");
        }
        Self {
            raw: raw.to_string(),
            pattern,
        }
    }

    fn matches(&self, tool_name: &str) -> bool {
        match &self.pattern {
            Some(p) => p.matches(tool_name),
            None => self.raw == tool_name,
        }
    }
}

/// Set of tool-name patterns that may be dispatched.
#[derive(Debug, Clone, Default)]
pub struct ToolAllowlist {
    entries: Vec<AllowlistEntry>,
}

impl ToolAllowlist {
    /// Build an allowlist from configured patterns, skipping blanks and duplicates.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for pattern in patterns {
            list.add(pattern.as_ref());
        }
        list
    }

    /// Add a pattern, skipping if the exact pattern already exists.
    pub fn add(&mut self, pattern: &str) {
        let pattern = pattern.trim();
        if pattern.is_empty() || self.entries.iter().any(|e| e.raw == pattern) {
            return;
        }
        self.entries.push(AllowlistEntry::new(pattern));
    }

    /// Check if a tool name matches any entry.
    pub fn is_allowed(&self, tool_name: &str) -> bool {
        self.entries.iter().any(|entry| entry.matches(tool_name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
