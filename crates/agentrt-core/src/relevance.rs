// Relevance Filter (Component E, spec §4.5).
//
// Uses a separate LLM call to score every registered tool against the
// conversation + goals and reduces the registry to the top-K plus the
// mandatory terminator. Grounded directly on `python_action_registry.py`'s
// `filter_tools_by_relevance`: the five-criterion rubric text, the
// `/RELEVANT_TOOLS_START` .. `/RELEVANT_TOOLS_END` sentinel pair, the
// 60/20/20 weighting note, and the "any exception anywhere keeps the
// original registry" boundary (spec §4.5 step 8).

use std::collections::HashSet;

use serde_json::Value;

use crate::goal::Goal;
use crate::llm::LlmClient;
use crate::prompt::{Prompt, PromptMessage};
use crate::registry::{ActionRegistry, RegistrySnapshot};
use crate::tool::ToolDescriptor;

const SENTINEL_START: &str = "/RELEVANT_TOOLS_START";
const SENTINEL_END: &str = "/RELEVANT_TOOLS_END";

/// The conversation a tool's relevance is scored against. Either a raw
/// string or a chat-format transcript, of which only `system`/`user` turns
/// contribute (spec §4.5 step 2).
#[derive(Debug, Clone)]
pub enum UserInput {
    Raw(String),
    Chat(Vec<ChatTurn>),
}

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// `filter(llm, user_input, goals, max_tools) -> Registry Snapshot` (spec
/// §4.5). Stateless: holds nothing beyond the rubric text, all of which is
/// generated fresh per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct RelevanceFilter;

impl RelevanceFilter {
    pub fn new() -> Self {
        Self
    }

    /// Runs the filter against `registry`'s current snapshot and, on
    /// success, replaces it in place with the reduced subset (spec §4.5
    /// step 7, "replaces, not mutates" the individual descriptors -- the
    /// snapshot itself is swapped atomically via `ActionRegistry::replace_with`).
    /// Any failure anywhere leaves `registry` untouched and is logged, never
    /// propagated (spec §4.5 step 8, §7 `RelevanceFilterFailure`).
    pub async fn filter(
        &self,
        llm: &dyn LlmClient,
        user_input: &UserInput,
        goals: &[Goal],
        max_tools: usize,
        registry: &ActionRegistry,
    ) {
        let snapshot = registry.snapshot();

        // Step 1: empty or terminator-only registry is returned unchanged.
        let non_terminal: Vec<&std::sync::Arc<ToolDescriptor>> =
            snapshot.values().filter(|t| !t.terminal).collect();
        if non_terminal.is_empty() {
            return;
        }

        match self.select_names(llm, user_input, goals, max_tools, &snapshot).await {
            Ok(Some(mut selected)) => {
                if let Some(terminator) = snapshot.values().find(|t| t.terminal) {
                    selected.insert(terminator.name.clone());
                }
                registry.replace_with(&selected);
            }
            Ok(None) => {
                // Sentinels present but payload invalid, or not a JSON
                // array: "treat as no filtering" (spec §4.5 step 6/8).
            }
            Err(e) => {
                tracing::warn!(error = %e, "relevance filter failed; keeping full registry");
            }
        }
    }

    /// Runs the selection call and returns `Some(names)` on a clean parse,
    /// `None` when the reply's sentinel payload could not be used (treated
    /// as "no filtering"), or an error for any other failure.
    async fn select_names(
        &self,
        llm: &dyn LlmClient,
        user_input: &UserInput,
        goals: &[Goal],
        max_tools: usize,
        snapshot: &RegistrySnapshot,
    ) -> crate::error::Result<Option<HashSet<String>>> {
        let conversation_text = render_conversation(user_input);
        let goals_text = render_goals(goals);
        let tools_text = render_tools(snapshot);

        let system = PromptMessage::system(rubric_text(max_tools));
        let user = PromptMessage::user(format!(
            "User conversation:\n{conversation_text}\n\nGoals:\n{goals_text}\n\nAvailable tools:\n{tools_text}"
        ));
        let prompt = Prompt::new(vec![system, user], None);

        let reply = llm.chat(&prompt).await?;
        let known_names: HashSet<&str> = snapshot.keys().map(|s| s.as_str()).collect();

        Ok(extract_selected_names(&reply).map(|names| {
            names
                .into_iter()
                .filter(|n| known_names.contains(n.as_str()))
                .collect()
        }))
    }
}

fn render_conversation(input: &UserInput) -> String {
    match input {
        UserInput::Raw(text) => text.clone(),
        UserInput::Chat(turns) => turns
            .iter()
            .filter(|t| t.role == "system" || t.role == "user")
            .map(|t| format!("{}: {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn render_goals(goals: &[Goal]) -> String {
    goals
        .iter()
        .map(|g| format!("- {}: {}", g.name, g.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tolerates both the structured `{type, description}` parameter form and a
/// plain-string legacy form (spec §4.5 step 4).
fn render_tools(snapshot: &RegistrySnapshot) -> String {
    let mut names: Vec<&String> = snapshot.keys().collect();
    names.sort();
    names
        .into_iter()
        .filter_map(|name| snapshot.get(name))
        .filter(|t| !t.terminal)
        .map(|t| {
            let params = render_parameters(&t.public_parameters());
            format!("- {}: {}\n  parameters: {}", t.name, t.description, params)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_parameters(schema: &Value) -> String {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return "(none)".to_string();
    };
    if properties.is_empty() {
        return "(none)".to_string();
    }
    properties
        .iter()
        .map(|(name, spec)| match spec {
            Value::Object(obj) => {
                let ty = obj.get("type").and_then(Value::as_str).unwrap_or("any");
                let desc = obj.get("description").and_then(Value::as_str).unwrap_or("");
                format!("{name} ({ty}): {desc}")
            }
            Value::String(plain) => format!("{name}: {plain}"),
            other => format!("{name}: {other}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn rubric_text(max_tools: usize) -> String {
    format!(
        "You are scoring which of the available tools are relevant to the \
current conversation and goals. Score every tool against five criteria: \
Direct-Need (does the user's message directly call for this capability), \
Goal-Alignment (does it serve one of the stated goals), Problem-Solving \
(would it help resolve the user's underlying problem), Domain-Relevance \
(is it in the same domain as the conversation), and Complementary-Value \
(would it be useful alongside other selected tools). Weight the user's \
messages at roughly 60% of the decision and the goals/system context at \
roughly 20% each. Select at most {max_tools} tools. Respond with the \
selected tool names as a JSON array of strings, delimited exactly by \
{SENTINEL_START} and {SENTINEL_END} on their own lines, and nothing else \
between those sentinels but the JSON array."
    )
}

/// Locates the two sentinels and JSON-decodes the array between them.
/// Returns `None` when the sentinels are missing, the payload doesn't
/// decode, or it decodes to something other than a JSON array (spec §4.5
/// step 6: "If the array is not a list, abort... treat as no filtering").
fn extract_selected_names(reply: &str) -> Option<Vec<String>> {
    let start = reply.find(SENTINEL_START)? + SENTINEL_START.len();
    let end = reply[start..].find(SENTINEL_END)? + start;
    let body = reply[start..end].trim();

    let value: Value = serde_json::from_str(body).ok()?;
    let array = value.as_array()?;
    Some(
        array
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::testing::tool_stub;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedLlm {
        reply: Mutex<Option<String>>,
    }

    impl ScriptedLlm {
        fn ok(reply: impl Into<String>) -> Self {
            Self { reply: Mutex::new(Some(reply.into())) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(&self, _prompt: &Prompt) -> Result<String> {
            Ok(self.reply.lock().unwrap().clone().unwrap_or_default())
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn chat(&self, _prompt: &Prompt) -> Result<String> {
            Err(crate::error::AgentError::llm_transport("boom"))
        }
    }

    fn registry_with(names: &[&str]) -> ActionRegistry {
        let registry = ActionRegistry::empty();
        for name in names {
            registry.register(tool_stub(name, false));
        }
        registry.register(tool_stub("terminate", true));
        registry
    }

    #[tokio::test]
    async fn empty_or_terminator_only_registry_is_untouched() {
        let registry = ActionRegistry::empty();
        registry.register(tool_stub("terminate", true));
        let llm = FailingLlm;
        RelevanceFilter::new()
            .filter(&llm, &UserInput::Raw("hi".into()), &[], 10, &registry)
            .await;
        assert!(registry.get("terminate").is_ok());
    }

    #[tokio::test]
    async fn selected_subset_always_keeps_terminator() {
        let registry = registry_with(&["search", "calc", "weather"]);
        let llm = ScriptedLlm::ok(format!(
            "some reasoning\n{SENTINEL_START}\n[\"search\"]\n{SENTINEL_END}\nmore text"
        ));
        RelevanceFilter::new()
            .filter(&llm, &UserInput::Raw("find the weather".into()), &[], 10, &registry)
            .await;

        assert!(registry.get("search").is_ok());
        assert!(registry.get("terminate").is_ok());
        assert!(registry.get("calc").is_err());
        assert!(registry.get("weather").is_err());
    }

    #[tokio::test]
    async fn llm_failure_keeps_full_registry() {
        let registry = registry_with(&["search", "calc"]);
        let llm = FailingLlm;
        RelevanceFilter::new()
            .filter(&llm, &UserInput::Raw("anything".into()), &[], 10, &registry)
            .await;
        assert!(registry.get("search").is_ok());
        assert!(registry.get("calc").is_ok());
        assert!(registry.get("terminate").is_ok());
    }

    #[tokio::test]
    async fn invalid_json_between_sentinels_is_treated_as_no_filtering() {
        let registry = registry_with(&["search", "calc"]);
        let llm = ScriptedLlm::ok(format!("{SENTINEL_START}\nnot json\n{SENTINEL_END}"));
        RelevanceFilter::new()
            .filter(&llm, &UserInput::Raw("anything".into()), &[], 10, &registry)
            .await;
        assert!(registry.get("search").is_ok());
        assert!(registry.get("calc").is_ok());
    }

    #[tokio::test]
    async fn non_array_json_between_sentinels_is_treated_as_no_filtering() {
        let registry = registry_with(&["search", "calc"]);
        let llm = ScriptedLlm::ok(format!("{SENTINEL_START}\n{{\"not\": \"an array\"}}\n{SENTINEL_END}"));
        RelevanceFilter::new()
            .filter(&llm, &UserInput::Raw("anything".into()), &[], 10, &registry)
            .await;
        assert!(registry.get("search").is_ok());
        assert!(registry.get("calc").is_ok());
    }

    #[tokio::test]
    async fn missing_sentinels_is_treated_as_no_filtering() {
        let registry = registry_with(&["search", "calc"]);
        let llm = ScriptedLlm::ok("I think search is relevant.");
        RelevanceFilter::new()
            .filter(&llm, &UserInput::Raw("anything".into()), &[], 10, &registry)
            .await;
        assert!(registry.get("search").is_ok());
        assert!(registry.get("calc").is_ok());
    }

    #[test]
    fn chat_input_keeps_only_system_and_user_turns() {
        let turns = vec![
            ChatTurn { role: "system".into(), content: "be helpful".into() },
            ChatTurn { role: "assistant".into(), content: "ok".into() },
            ChatTurn { role: "user".into(), content: "find weather".into() },
        ];
        let rendered = render_conversation(&UserInput::Chat(turns));
        assert!(rendered.contains("be helpful"));
        assert!(rendered.contains("find weather"));
        assert!(!rendered.contains("ok"));
    }
}
