// Memory: an ordered, append-only sequence of entries (spec §3).
//
// Invariants: (i) order is preserved; (ii) the first user entry is the
// originating task; (iii) entries tagged `prompt` are not forwarded to the
// LLM -- they are internal provenance; (iv) memory is never rewritten, only
// appended. Constructor-per-type idiom grounded on `message.rs`'s
// `Message::user/assistant/system`; the `environment`/`prompt` entry types
// and the projection rules are new, taken from spec §3/§4.4 and
// `agent_languages.py::to_json_memory_messages_format` directly (the
// teacher's `Message` enum has no analogue for either).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The five entry kinds memory can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryEntryType {
    System,
    User,
    Assistant,
    Environment,
    /// Provenance only -- dropped during projection into a prompt.
    Prompt,
}

/// Payload of a memory entry: either a plain string or a structured value
/// that is serialized to indented JSON on demand during projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryContent {
    Text(String),
    Structured(Value),
}

impl MemoryContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MemoryContent::Text(s) => Some(s),
            MemoryContent::Structured(_) => None,
        }
    }
}

impl From<String> for MemoryContent {
    fn from(s: String) -> Self {
        MemoryContent::Text(s)
    }
}

impl From<&str> for MemoryContent {
    fn from(s: &str) -> Self {
        MemoryContent::Text(s.to_string())
    }
}

impl From<Value> for MemoryContent {
    fn from(v: Value) -> Self {
        MemoryContent::Structured(v)
    }
}

/// One append-only memory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: Uuid,
    pub entry_type: MemoryEntryType,
    pub content: MemoryContent,
    pub created_at: DateTime<Utc>,
    /// Present only on assistant entries recording a skipped step, per the
    /// `to_json_memory_messages_format` special case: when present the
    /// projected message content becomes "Skipped step: '<tool>' Skipped
    /// reason: <reason>" instead of the entry's own content.
    pub skipped: Option<SkippedStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedStep {
    pub tool: String,
    pub reason: String,
}

impl MemoryEntry {
    fn new(entry_type: MemoryEntryType, content: impl Into<MemoryContent>) -> Self {
        Self {
            id: Uuid::now_v7(),
            entry_type,
            content: content.into(),
            created_at: Utc::now(),
            skipped: None,
        }
    }

    pub fn system(content: impl Into<MemoryContent>) -> Self {
        Self::new(MemoryEntryType::System, content)
    }

    pub fn user(content: impl Into<MemoryContent>) -> Self {
        Self::new(MemoryEntryType::User, content)
    }

    pub fn assistant(content: impl Into<MemoryContent>) -> Self {
        Self::new(MemoryEntryType::Assistant, content)
    }

    pub fn assistant_skipped(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut entry = Self::new(MemoryEntryType::Assistant, Value::Null);
        entry.skipped = Some(SkippedStep {
            tool: tool.into(),
            reason: reason.into(),
        });
        entry
    }

    pub fn environment(content: impl Into<MemoryContent>) -> Self {
        Self::new(MemoryEntryType::Environment, content)
    }

    /// Provenance entry recording what was actually sent to the LLM. Never
    /// re-fed to the LLM on later turns (dropped by the projection).
    pub fn prompt(content: impl Into<MemoryContent>) -> Self {
        Self::new(MemoryEntryType::Prompt, content)
    }

    /// Resolve the entry's effective textual content, matching
    /// `to_json_memory_messages_format`'s "serialize to indented JSON when
    /// content is absent" rule: a `Structured` payload that isn't a string
    /// (or the synthesized `skipped` marker) renders as pretty JSON.
    pub fn resolved_content(&self) -> String {
        if let Some(skipped) = &self.skipped {
            return format!(
                "Skipped step: '{}' \nSkipped reason: {}",
                skipped.tool, skipped.reason
            );
        }
        match &self.content {
            MemoryContent::Text(s) => s.clone(),
            MemoryContent::Structured(v) => {
                serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
            }
        }
    }
}

/// Append-only ordered log of memory entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Memory {
    entries: Vec<MemoryEntry>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The only mutator: memory is never rewritten, only appended.
    pub fn push(&mut self, entry: MemoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
