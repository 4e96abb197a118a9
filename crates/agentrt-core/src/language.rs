// Agent Language (Component D, spec §4.4).
//
// A sum type with three concrete variants, each defining how goals/memory/
// tools are rendered into a `Prompt`, how a raw LLM reply is parsed into an
// `Action`, and how the prompt is mutated after a parse failure. Grounded
// directly on `agent_languages.py`'s three classes
// (`AgentNaturalLanguage`/`AgentJsonActionLanguage`/
// `AgentFunctionCallingActionLanguage`) and `to_json_memory_messages_format`
// for the shared memory projection; the triple-quote tolerance is grounded
// on `agent/game/languages.py::ai_friendly_json_loads`.
//
// Spec §9 calls for a sum type dispatched by exhaustive match rather than
// inheritance -- `AgentLanguage` below is that sum type.

use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::config::JsonVariantConfig;
use crate::error::{AgentError, Result};
use crate::goal::Goal;
use crate::memory::{Memory, MemoryEntryType};
use crate::prompt::{Prompt, PromptMessage};
use crate::registry::RegistrySnapshot;
use crate::tool::ToolDescriptor;

/// A parsed `{tool, args}` intent, with an optional `error` field carried
/// through when a variant synthesises a terminate on an abnormal exit (spec
/// §4.4 Variant F's `EXIT_AGENT_LOOP` sentinel path).
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub tool: String,
    pub args: Value,
    pub error: Option<String>,
}

impl Action {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            args,
            error: None,
        }
    }

    /// Synthesises `{tool: "terminate", args: {message}}`. Visible within
    /// the crate so the agent loop (Component G) can build the same
    /// terminate action for iteration-limit/cancellation/retry-exhaustion
    /// exits that spec §4.7 requires outside of `Language::parse` itself.
    pub(crate) fn terminate(message: impl Into<String>) -> Self {
        Self::new("terminate", serde_json::json!({ "message": message.into() }))
    }
}

const ACTION_FORMAT: &str = "\n<Stop and think step by step. Insert a rich description of your step by step thoughts here.>\n\n```action\n{\n    \"tool\": \"tool_name\",\n    \"args\": {...fill in any required arguments here...}\n}\n```";

/// Strategy interface with three interchangeable prompt/response shapes.
/// Dispatch is by exhaustive match, never by inheritance (spec §9).
#[derive(Debug, Clone)]
pub enum AgentLanguage {
    /// The prompt contains only goals and memory; `parse` never fails.
    Natural,
    /// Every reply must contain a fenced ` ```action ` block holding a JSON
    /// `{tool, args}` object.
    JsonFenced(JsonVariantConfig),
    /// The prompt carries a structured tool-schema list; no fenced block is
    /// expected.
    NativeToolCall { allow_non_tool_output: bool },
}

fn sorted_tools(registry: &RegistrySnapshot) -> Vec<Arc<ToolDescriptor>> {
    let mut tools: Vec<Arc<ToolDescriptor>> = registry.values().cloned().collect();
    tools.sort_by(|a, b| a.name.cmp(&b.name));
    tools
}

/// Shared across all three variants (spec §4.4 "Memory projection").
fn project_memory(memory: &Memory) -> Vec<PromptMessage> {
    memory
        .entries()
        .iter()
        .filter(|entry| entry.entry_type != MemoryEntryType::Prompt)
        .map(|entry| {
            let content = entry.resolved_content();
            let role = match entry.entry_type {
                MemoryEntryType::Assistant => "assistant",
                MemoryEntryType::System => "system",
                MemoryEntryType::Environment => "user",
                MemoryEntryType::User => "user",
                MemoryEntryType::Prompt => unreachable!("filtered above"),
            };
            PromptMessage::new(role, content)
        })
        .collect()
}

fn format_goals_natural(goals: &[Goal]) -> PromptMessage {
    let instructions = goals
        .iter()
        .map(|g| g.description.clone())
        .collect::<Vec<_>>()
        .join("\n");
    PromptMessage::system(instructions)
}

const GOAL_SEP: &str = "\n-------------------\n";

fn format_goals_structured(goals: &[Goal]) -> PromptMessage {
    let instructions = goals
        .iter()
        .map(|g| format!("{}:{GOAL_SEP}{}{GOAL_SEP}", g.name, g.description))
        .collect::<Vec<_>>()
        .join("\n\n");
    PromptMessage::system(instructions)
}

fn tool_schema_json(tools: &[Arc<ToolDescriptor>]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.public_parameters(),
                })
            })
            .collect(),
    )
}

fn format_actions_json_fenced(tools: &[Arc<ToolDescriptor>]) -> PromptMessage {
    let rendered = serde_json::to_string_pretty(&tool_schema_json(tools)).unwrap_or_default();
    let content = format!(
        "\nAvailable Tools: {rendered}\n\nWhen you are done, terminate the conversation by using the \"terminate\" tool and I will \nprovide the results to the user.\n\nImportant!!! Every response MUST have an 'action' which is defined by outputting an  ```action block containing valid json.\nYou must ALWAYS respond in this format:\n\n{ACTION_FORMAT}\n"
    );
    PromptMessage::system(content)
}

fn function_call_tool_schema(tools: &[Arc<ToolDescriptor>]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|t| {
                let description: String = t.description.chars().take(1024).collect();
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": description,
                        "parameters": t.public_parameters(),
                    }
                })
            })
            .collect(),
    )
}

impl AgentLanguage {
    /// `construct(goals, memory, environment, tools) -> Prompt` (spec
    /// §4.4/§4.6). `environment` does not independently contribute content
    /// beyond what is already folded into memory in this runtime.
    pub fn construct(&self, goals: &[Goal], memory: &Memory, registry: &RegistrySnapshot) -> Prompt {
        let tools = sorted_tools(registry);
        match self {
            AgentLanguage::Natural => {
                let mut messages = vec![format_goals_natural(goals)];
                messages.extend(project_memory(memory));
                Prompt::new(messages, None)
            }
            AgentLanguage::JsonFenced(_) => {
                let mut messages = vec![format_goals_structured(goals)];
                messages.push(format_actions_json_fenced(&tools));
                messages.extend(project_memory(memory));
                Prompt::new(messages, None)
            }
            AgentLanguage::NativeToolCall { .. } => {
                let mut messages = vec![format_goals_structured(goals)];
                messages.extend(project_memory(memory));
                Prompt::new(messages, Some(function_call_tool_schema(&tools)))
            }
        }
    }

    /// `parse(reply_text) -> Action` (spec §4.4).
    pub fn parse(&self, reply: &str) -> Result<Action> {
        match self {
            AgentLanguage::Natural => Ok(Action::terminate(reply)),
            AgentLanguage::JsonFenced(_) => parse_json_fenced(reply),
            AgentLanguage::NativeToolCall { allow_non_tool_output } => {
                parse_native_tool_call(reply, *allow_non_tool_output)
            }
        }
    }

    /// `adapt(prompt, reply_text, error, retries_left) -> Prompt` (spec
    /// §4.4).
    pub fn adapt(&self, prompt: &Prompt, reply: &str, error: &AgentError) -> Prompt {
        match self {
            AgentLanguage::Natural => prompt.clone(),
            AgentLanguage::JsonFenced(config) => adapt_json_fenced(prompt, reply, error, config),
            AgentLanguage::NativeToolCall { .. } => adapt_native_tool_call(prompt, reply),
        }
    }
}

/// `ai_friendly_json_loads`: tries a plain decode first, then -- only on
/// failure, to avoid the regex cost on the common well-formed path -- a pass
/// that escapes newlines/quotes inside `"""..."""` regions before retrying.
fn parse_json_tolerant(input: &str) -> std::result::Result<Value, serde_json::Error> {
    match serde_json::from_str(input) {
        Ok(v) => Ok(v),
        Err(_) => {
            let re = Regex::new("(?s)\"\"\"(.*?)\"\"\"").expect("static regex is valid");
            let processed = re.replace_all(input, |caps: &regex::Captures| {
                let escaped = caps[1].replace('\n', "\\n").replace('"', "\\\"");
                format!("\"{escaped}\"")
            });
            serde_json::from_str(&processed)
        }
    }
}

fn parse_json_fenced(reply: &str) -> Result<Action> {
    const START_MARKER: &str = "```action";
    const END_MARKER: &str = "```";

    let stripped = reply.trim();
    let start_index = stripped
        .find(START_MARKER)
        .ok_or_else(|| AgentError::parse_failure("no ```action block found in reply"))?;
    let after_start = &stripped[start_index + START_MARKER.len()..];
    // rfind on the full stripped response, matching the original's
    // `stripped_response.rfind(end_marker)` against the *whole* string.
    let end_index = stripped
        .rfind(END_MARKER)
        .ok_or_else(|| AgentError::parse_failure("no closing fence found in reply"))?;
    if end_index < start_index + START_MARKER.len() {
        return Err(AgentError::parse_failure("closing fence precedes opening fence"));
    }
    let body_end = end_index - (start_index + START_MARKER.len());
    let body = after_start
        .get(..body_end)
        .ok_or_else(|| AgentError::parse_failure("malformed fence boundaries"))?
        .trim();

    let value = parse_json_tolerant(body).map_err(|e| AgentError::parse_failure(e.to_string()))?;
    action_from_value(value)
}

fn action_from_value(value: Value) -> Result<Action> {
    let obj = value
        .as_object()
        .ok_or_else(|| AgentError::parse_failure("parsed action is not a JSON object"))?;
    let tool = obj
        .get("tool")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::parse_failure("parsed action has no string 'tool' field"))?
        .to_string();
    let args = obj.get("args").cloned().unwrap_or(Value::Object(Default::default()));
    Ok(Action::new(tool, args))
}

fn parse_native_tool_call(reply: &str, allow_non_tool_output: bool) -> Result<Action> {
    match serde_json::from_str::<Value>(reply).ok().and_then(|v| action_from_value(v).ok()) {
        Some(action) => Ok(action),
        None if allow_non_tool_output => Ok(Action::terminate(reply)),
        None => {
            if reply.contains("EXIT_AGENT_LOOP") {
                let message = reply.replace("EXIT_AGENT_LOOP", "").trim().to_string();
                let mut action = Action::terminate(message);
                action.error = Some("Agent Loop Terminated Early".to_string());
                Ok(action)
            } else {
                Err(AgentError::parse_failure(
                    "the agent did not respond with a valid tool invocation",
                ))
            }
        }
    }
}

fn adapt_json_fenced(prompt: &Prompt, reply: &str, error: &AgentError, config: &JsonVariantConfig) -> Prompt {
    let feedback = if let AgentError::UnknownTool(name) = error {
        format!("Your last output contained an unknown action. unknown tool: {name}.")
    } else if config.truncate_parse_feedback {
        "Your last output did not contain a valid ```action block that could be parsed. \n".to_string()
    } else {
        format!(
            "Your last output did not contain a valid ```action block that could be parsed. \nPlease fix your prior response. \nMake sure that it has the correct format: \n{ACTION_FORMAT}"
        )
    };

    prompt.extended([
        PromptMessage::assistant(reply),
        PromptMessage::user(feedback),
    ])
}

fn adapt_native_tool_call(prompt: &Prompt, reply: &str) -> Prompt {
    prompt.extended([
        PromptMessage::assistant(reply),
        PromptMessage::system("CRITICAL!!! You must ALWAYS choose a tool to use. "),
        PromptMessage::user("You did not call a valid tool. Please choose an available tool and output a tool call."),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEntry;

    #[test]
    fn natural_parse_is_always_a_terminate() {
        let lang = AgentLanguage::Natural;
        let action = lang.parse("anything at all").unwrap();
        assert_eq!(action.tool, "terminate");
        assert_eq!(action.args, serde_json::json!({"message": "anything at all"}));
    }

    #[test]
    fn natural_adapt_is_identity() {
        let lang = AgentLanguage::Natural;
        let prompt = Prompt::new(vec![PromptMessage::system("goals")], None);
        let adapted = lang.adapt(&prompt, "reply", &AgentError::parse_failure("x"));
        assert_eq!(adapted, prompt);
    }

    #[test]
    fn json_fenced_parses_simple_block() {
        let lang = AgentLanguage::JsonFenced(JsonVariantConfig::default());
        let reply = "thinking...\n```action\n{\"tool\": \"say_hello\", \"args\": {\"name\": \"world\"}}\n```";
        let action = lang.parse(reply).unwrap();
        assert_eq!(action.tool, "say_hello");
        assert_eq!(action.args, serde_json::json!({"name": "world"}));
    }

    #[test]
    fn json_fenced_tolerates_triple_quoted_multiline_strings() {
        let lang = AgentLanguage::JsonFenced(JsonVariantConfig::default());
        let reply = "```action\n{\n    \"tool\": \"exec_code\",\n    \"args\": {\"code\": \"\"\"line one\nline two\"\"\"}\n}\n```";
        let action = lang.parse(reply).unwrap();
        assert_eq!(action.tool, "exec_code");
        assert_eq!(action.args["code"], "line one\nline two");
    }

    #[test]
    fn json_fenced_parse_failure_on_missing_block() {
        let lang = AgentLanguage::JsonFenced(JsonVariantConfig::default());
        assert!(lang.parse("no fenced block here").is_err());
    }

    #[test]
    fn json_fenced_adapt_truncated_feedback_is_one_line() {
        let config = JsonVariantConfig { truncate_parse_feedback: true };
        let lang = AgentLanguage::JsonFenced(config);
        let prompt = Prompt::new(vec![], None);
        let adapted = lang.adapt(&prompt, "bad reply", &AgentError::parse_failure("no block"));
        let feedback = &adapted.messages.last().unwrap().content;
        assert!(!feedback.contains(ACTION_FORMAT));
    }

    #[test]
    fn json_fenced_adapt_full_feedback_concatenates_all_lines() {
        let config = JsonVariantConfig { truncate_parse_feedback: false };
        let lang = AgentLanguage::JsonFenced(config);
        let prompt = Prompt::new(vec![], None);
        let adapted = lang.adapt(&prompt, "bad reply", &AgentError::parse_failure("no block"));
        let feedback = &adapted.messages.last().unwrap().content;
        assert!(feedback.contains(ACTION_FORMAT));
    }

    #[test]
    fn json_fenced_adapt_unknown_tool_uses_distinct_message() {
        let lang = AgentLanguage::JsonFenced(JsonVariantConfig::default());
        let prompt = Prompt::new(vec![], None);
        let adapted = lang.adapt(&prompt, "reply", &AgentError::unknown_tool("frobnicate"));
        let feedback = &adapted.messages.last().unwrap().content;
        assert!(feedback.contains("unknown action"));
        assert!(feedback.contains("frobnicate"));
    }

    #[test]
    fn native_parse_falls_back_to_terminate_when_allowed() {
        let lang = AgentLanguage::NativeToolCall { allow_non_tool_output: true };
        let action = lang.parse("I think we're done.").unwrap();
        assert_eq!(action.tool, "terminate");
        assert_eq!(action.args["message"], "I think we're done.");
    }

    #[test]
    fn native_parse_honors_exit_sentinel_when_disallowed() {
        let lang = AgentLanguage::NativeToolCall { allow_non_tool_output: false };
        let action = lang.parse("partial work EXIT_AGENT_LOOP").unwrap();
        assert_eq!(action.tool, "terminate");
        assert_eq!(action.args["message"], "partial work");
        assert_eq!(action.error.as_deref(), Some("Agent Loop Terminated Early"));
    }

    #[test]
    fn native_parse_failure_without_sentinel_or_fallback() {
        let lang = AgentLanguage::NativeToolCall { allow_non_tool_output: false };
        assert!(lang.parse("not json at all").is_err());
    }

    #[test]
    fn project_memory_drops_prompt_entries_and_maps_roles() {
        let mut memory = Memory::new();
        memory.push(MemoryEntry::user("hi"));
        memory.push(MemoryEntry::prompt(serde_json::json!({"sent": true})));
        memory.push(MemoryEntry::environment("result"));
        memory.push(MemoryEntry::assistant_skipped("search", "cancelled"));

        let projected = project_memory(&memory);
        assert_eq!(projected.len(), 3);
        assert_eq!(projected[0].role, "user");
        assert_eq!(projected[1].role, "user");
        assert_eq!(projected[2].role, "assistant");
        assert!(projected[2].content.contains("Skipped step: 'search'"));
    }
}
