// LLM endpoint client (spec §6 "LLM endpoint").
//
// A single generic client against one configured HTTP endpoint + bearer
// token, not a per-vendor driver set: spec §6 only requires "the reply is a
// string". Grounded on `everruns-core/src/openai.rs`'s reqwest
// request-building, `Authorization: Bearer` header, JSON body, and
// `Debug`-redaction-of-secrets idiom; the streaming machinery that file
// builds around `eventsource-stream` is not needed here since the loop only
// ever consumes a non-streaming `chat(&Prompt) -> Result<String>` reply.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::prompt::Prompt;

/// Abstraction over "call an LLM with a prompt, get a string back" so the
/// loop and its tests can swap in a fake without a network dependency.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, prompt: &Prompt) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [crate::prompt::PromptMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: &'a Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// One configured HTTP endpoint speaking the OpenAI-shaped chat-completions
/// contract: POST `{messages, tools?, model, temperature?, max_tokens?}`,
/// response `{choices: [{message: {content}}]}`.
#[derive(Clone)]
pub struct LlmEndpointClient {
    client: Client,
    endpoint_url: String,
    bearer_token: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl LlmEndpointClient {
    pub fn new(
        endpoint_url: impl Into<String>,
        bearer_token: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client build with static config cannot fail"),
            endpoint_url: endpoint_url.into(),
            bearer_token: bearer_token.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[async_trait]
impl LlmClient for LlmEndpointClient {
    /// Spec §6: "the core treats the endpoint as opaque: it only requires
    /// (i) the reply is a string, and (ii) for Variant F, the string
    /// JSON-decodes to `{tool, args}` on success" -- decoding the string
    /// into an `Action` is `AgentLanguage::parse`'s job, not this client's.
    async fn chat(&self, prompt: &Prompt) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: &prompt.messages,
            tools: &prompt.tools,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint_url)
            .header("Authorization", format!("Bearer {}", self.bearer_token))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::llm_transport(format!("failed to send request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::llm_transport(format!("LLM endpoint error ({status}): {body}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AgentError::llm_transport(format!("failed to decode response: {e}")))?;

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AgentError::llm_transport("response had no choices[0].message.content"))
    }
}

impl std::fmt::Debug for LlmEndpointClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmEndpointClient")
            .field("endpoint_url", &self.endpoint_url)
            .field("model", &self.model)
            .field("bearer_token", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_bearer_token() {
        let client = LlmEndpointClient::new("https://example.test/v1/chat", "super-secret", "gpt-x", Duration::from_secs(30));
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
