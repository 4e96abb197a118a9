// Prompt Assembler (Component F, spec §4.6).
//
// A pure value type plus a stateless composition function: goals first
// (system role), then -- depending on the active language variant -- either
// an inline tool description (Variant J) or nothing (Variants N, F), then
// the projected memory. Grounded on `agent_languages.py`'s
// `construct_prompt` methods, which all share this exact ordering.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One role-tagged message in a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Immutable prompt value: a role-tagged message list plus, optionally, a
/// structured tool-schema list (carried on the side by Variant F). Never
/// mutated -- `adapt` after a parse error returns a new `Prompt` extending
/// the old one's messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub messages: Vec<PromptMessage>,
    pub tools: Option<Value>,
}

impl Prompt {
    pub fn new(messages: Vec<PromptMessage>, tools: Option<Value>) -> Self {
        Self { messages, tools }
    }

    /// Returns a new prompt with `extra` appended, leaving `self` untouched.
    pub fn extended(&self, extra: impl IntoIterator<Item = PromptMessage>) -> Self {
        let mut messages = self.messages.clone();
        messages.extend(extra);
        Self {
            messages,
            tools: self.tools.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extended_preserves_original_and_appends_new_messages() {
        let original = Prompt::new(vec![PromptMessage::system("goals")], None);
        let extended = original.extended([PromptMessage::user("more")]);
        assert_eq!(original.messages.len(), 1);
        assert_eq!(extended.messages.len(), 2);
        assert_eq!(extended.messages[1].content, "more");
    }
}
