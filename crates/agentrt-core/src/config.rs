// Agent loop configuration (spec §6 "Configuration inputs").
//
// `AgentLoopConfig` carries the knobs the loop itself reads each iteration.
// Field defaults and the `#[serde(default = "...")]` idiom are carried over
// from the teacher's `AgentConfig`; the fields themselves are new, taken
// directly from spec §6.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_max_parse_retries() -> u32 {
    3
}

fn default_max_tool_relevance() -> usize {
    10
}

fn default_allow_non_tool_output() -> bool {
    true
}

fn default_llm_timeout_secs() -> u64 {
    30
}

fn default_remote_op_timeout_secs() -> u64 {
    30
}

/// Configuration for one `AgentLoop` session (spec §4.7 "State" and §6
/// "Configuration inputs").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentLoopConfig {
    /// Retries available per iteration on `ParseFailure`/`UnknownTool`
    /// (default 2-3; spec §6).
    #[serde(default = "default_max_parse_retries")]
    pub max_parse_retries: u32,

    /// Top-K cap the Relevance Filter asks the prompt to respect.
    #[serde(default = "default_max_tool_relevance")]
    pub max_tool_relevance: usize,

    /// Variant F only: whether a non-JSON reply is treated as an implicit
    /// terminate rather than a `ParseFailure` (spec §4.4 Variant F).
    #[serde(default = "default_allow_non_tool_output")]
    pub allow_non_tool_output: bool,

    /// Optional hard ceiling on loop iterations; on exhaustion the loop
    /// synthesises a terminate with an "iteration limit" message.
    #[serde(default)]
    pub max_iterations: Option<u32>,

    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,

    #[serde(default = "default_remote_op_timeout_secs")]
    pub remote_op_timeout_secs: u64,
}

impl AgentLoopConfig {
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn remote_op_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_op_timeout_secs)
    }
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_parse_retries: default_max_parse_retries(),
            max_tool_relevance: default_max_tool_relevance(),
            allow_non_tool_output: default_allow_non_tool_output(),
            max_iterations: None,
            llm_timeout_secs: default_llm_timeout_secs(),
            remote_op_timeout_secs: default_remote_op_timeout_secs(),
        }
    }
}

fn default_truncate_parse_feedback() -> bool {
    true
}

/// The configuration switch spec §9 mandates for the Variant J parse-error
/// feedback: the original's `adapt_prompt_after_parsing_error` assigns only
/// the first line of a four-line f-string expression to `feedback` (the
/// remaining three lines are evaluated as dead expression statements).
/// `true` reproduces that behaviour byte-for-byte (terse feedback); `false`
/// concatenates all four lines, treating the original as a defect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JsonVariantConfig {
    #[serde(default = "default_truncate_parse_feedback")]
    pub truncate_parse_feedback: bool,
}

impl Default for JsonVariantConfig {
    fn default() -> Self {
        Self {
            truncate_parse_feedback: default_truncate_parse_feedback(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = AgentLoopConfig::default();
        assert_eq!(config.max_parse_retries, 3);
        assert_eq!(config.max_tool_relevance, 10);
        assert!(config.allow_non_tool_output);
        assert_eq!(config.max_iterations, None);
    }

    #[test]
    fn json_variant_config_defaults_to_truncated() {
        assert!(JsonVariantConfig::default().truncate_parse_feedback);
    }

    #[test]
    fn deserializes_with_partial_fields_using_defaults() {
        let config: AgentLoopConfig = serde_json::from_value(serde_json::json!({
            "max_parse_retries": 5
        }))
        .unwrap();
        assert_eq!(config.max_parse_retries, 5);
        assert_eq!(config.max_tool_relevance, 10);
    }
}
