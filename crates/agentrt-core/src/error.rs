// Error types for the agent runtime.
//
// One variant per error kind named in spec §7. `RegistryStateError` is the
// only variant that can abort construction (no terminator in the built-in
// catalogue); every other variant is recovered internally by the loop or
// converted into a terminate action before it ever reaches a caller.

use thiserror::Error;

/// Result type alias for agent runtime operations.
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The LLM reply did not conform to the active language variant's
    /// expected shape. Recovered by `Language::adapt` + retry.
    #[error("failed to parse agent reply: {0}")]
    ParseFailure(String),

    /// The parsed action named a tool that is not in the registry.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// A tool's raw callable raised. Per spec §4.2/§7 this is swallowed by
    /// the descriptor wrapper (which emits an error event and returns
    /// `None`); this variant exists so the wrapper's behavior is testable
    /// in isolation, not because it is expected to propagate to the loop.
    #[error("tool '{tool}' execution failed: {source}")]
    ToolExecutionFailure { tool: String, source: anyhow::Error },

    /// Network or non-2xx from the LLM endpoint. Not recovered by the
    /// core; surfaced to the caller of the session.
    #[error("LLM transport error: {0}")]
    LlmTransport(String),

    /// Network failure reaching the Remote-Op Bridge's enumerate endpoint,
    /// or a raw connection failure on execute (execute-op *application*
    /// failures are converted to a `{success: false, message}` value
    /// instead of raised -- see spec §7).
    #[error("remote operation transport error: {0}")]
    RemoteOpTransport(String),

    /// No terminator found when constructing a registry. Fatal at
    /// construction time, never at loop time.
    #[error("registry has no terminator tool: {0}")]
    RegistryStateError(String),

    /// Scoped entirely to the Relevance Filter. Never fatal to the loop --
    /// callers of `RelevanceFilter::filter` log this and keep the original
    /// registry.
    #[error("relevance filter failed: {0}")]
    RelevanceFilterFailure(String),

    /// Internal error with no spec-named counterpart above (e.g.
    /// malformed config).
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AgentError {
    pub fn parse_failure(msg: impl Into<String>) -> Self {
        AgentError::ParseFailure(msg.into())
    }

    pub fn unknown_tool(name: impl Into<String>) -> Self {
        AgentError::UnknownTool(name.into())
    }

    pub fn tool_execution(tool: impl Into<String>, source: anyhow::Error) -> Self {
        AgentError::ToolExecutionFailure {
            tool: tool.into(),
            source,
        }
    }

    pub fn llm_transport(msg: impl Into<String>) -> Self {
        AgentError::LlmTransport(msg.into())
    }

    pub fn remote_op_transport(msg: impl Into<String>) -> Self {
        AgentError::RemoteOpTransport(msg.into())
    }

    pub fn registry_state(msg: impl Into<String>) -> Self {
        AgentError::RegistryStateError(msg.into())
    }

    pub fn relevance_filter(msg: impl Into<String>) -> Self {
        AgentError::RelevanceFilterFailure(msg.into())
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(e: reqwest::Error) -> Self {
        AgentError::LlmTransport(e.to_string())
    }
}
