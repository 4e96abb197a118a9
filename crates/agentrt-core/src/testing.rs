// Ambient test tooling shared by this crate's own unit tests and by any
// host-process integration tests built against it.
//
// Grounded on `everruns-core/src/memory.rs`'s `MockLlmProvider`/
// `InMemoryEventEmitter`/`InMemoryAgentLoopBuilder` idiom: hand-rolled fakes
// driven by a queue of scripted replies, not a mocking crate (the teacher
// workspace carries no mocking dependency and this crate follows suit).

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{AgentError, Result};
use crate::llm::LlmClient;
use crate::prompt::Prompt;
use crate::tool::{tool_fn, ToolDescriptor};

/// A minimal tool descriptor that echoes its args back as its result.
/// Useful wherever a test needs *some* descriptor and doesn't care what it
/// does.
pub fn tool_stub(name: &str, terminal: bool) -> ToolDescriptor {
    ToolDescriptor::new(
        name,
        format!("stub tool '{name}'"),
        json!({"type": "object", "properties": {}}),
        terminal,
        [],
        tool_fn(|_ctx, args| async move { Ok(args) }),
    )
}

/// A stub `terminate` tool: returns its `args` unchanged as the session
/// result, satisfying the "terminator invariant" (spec §8 property 5)
/// wherever a test needs a minimal working registry.
pub fn terminate_stub() -> ToolDescriptor {
    let mut descriptor = tool_stub("terminate", true);
    descriptor.description = "ends the agent session".to_string();
    descriptor
}

/// A pre-scripted LLM client: each `chat` call pops the next reply off a
/// FIFO queue and records the `Prompt` it was given, so a test can both
/// script the conversation and assert on exactly what was sent.
#[derive(Default)]
pub struct MockLlmClient {
    replies: Mutex<Vec<std::result::Result<String, String>>>,
    calls: Mutex<Vec<Prompt>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a client that will return `replies` in order, one per call.
    pub fn with_replies(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let client = Self::new();
        for reply in replies {
            client.push_reply(reply.into());
        }
        client
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push(Ok(reply.into()));
    }

    pub fn push_error(&self, message: impl Into<String>) {
        self.replies.lock().unwrap().push(Err(message.into()));
    }

    /// Every `Prompt` this client has been called with, in call order.
    pub fn calls(&self) -> Vec<Prompt> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(&self, prompt: &Prompt) -> Result<String> {
        self.calls.lock().unwrap().push(prompt.clone());
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Err(AgentError::llm_transport(
                "MockLlmClient: no scripted replies left",
            ));
        }
        match replies.remove(0) {
            Ok(reply) => Ok(reply),
            Err(message) => Err(AgentError::llm_transport(message)),
        }
    }
}

/// A tool callable that always fails, for exercising the swallowed-exception
/// path (spec §7 `ToolExecutionFailure`).
pub fn failing_tool_callable() -> crate::tool::ToolCallable {
    tool_fn(|_ctx, _args: Value| async move { Err(anyhow::anyhow!("stub tool failure")) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_llm_client_returns_replies_in_order() {
        let client = MockLlmClient::with_replies(["first", "second"]);
        let prompt = Prompt::new(vec![], None);
        assert_eq!(client.chat(&prompt).await.unwrap(), "first");
        assert_eq!(client.chat(&prompt).await.unwrap(), "second");
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn mock_llm_client_errors_are_llm_transport() {
        let client = MockLlmClient::new();
        client.push_error("down");
        let prompt = Prompt::new(vec![], None);
        let err = client.chat(&prompt).await.unwrap_err();
        assert!(matches!(err, AgentError::LlmTransport(_)));
    }

    #[tokio::test]
    async fn mock_llm_client_exhaustion_errors_rather_than_panics() {
        let client = MockLlmClient::new();
        let prompt = Prompt::new(vec![], None);
        assert!(client.chat(&prompt).await.is_err());
    }
}
