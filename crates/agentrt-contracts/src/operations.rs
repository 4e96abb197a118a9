// Remote operation wire contracts.
//
// These types describe the JSON shapes exchanged with a remote operation
// registry (enumerate) and with the operation-execution endpoint (execute).
// Field semantics and envelope shapes are grounded directly on
// `agent/tools/ops.py` in the original implementation: `customName`,
// `customDescription`, `bindings`, and the `parameters` / `schema` / `params`
// precedence chain, plus the `{"data": {...}}` enumerate/execute envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// How a bound parameter's value is supplied when the Remote-Op Bridge
/// compiles an `OperationDescriptor` into a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingMode {
    /// The LLM is told what to put in this parameter via an updated
    /// description; the parameter remains part of the exposed schema.
    Ai,
    /// The value is pinned by the host and hidden from the LLM entirely.
    Manual,
}

/// One parameter binding: `{mode, value}` keyed by parameter name in
/// `OperationDescriptor::bindings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    pub mode: BindingMode,
    pub value: Value,
}

/// Legacy flat parameter description, the oldest of the three schema
/// sources an operation can carry (`params` in the original).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyParam {
    pub name: String,
    pub description: String,
}

/// A remote capability fetched from the operation registry, compiled by
/// `agentrt_core::remote_ops` into a `ToolDescriptor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "customName")]
    pub custom_name: Option<String>,
    #[serde(default, rename = "customDescription")]
    pub custom_description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Preferred modern schema field.
    #[serde(default)]
    pub parameters: Option<Value>,
    /// Legacy alias for `parameters`, kept for backwards compatibility.
    #[serde(default)]
    pub schema: Option<Value>,
    /// Oldest schema source: a flat `[{name, description}]` list.
    #[serde(default)]
    pub params: Vec<LegacyParam>,
    #[serde(default)]
    pub bindings: HashMap<String, Binding>,
    #[serde(default)]
    pub path: Option<String>,
}

/// Response shape of the enumerate-operations endpoint:
/// `{"data": [OperationDescriptor, ...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumerateOperationsResponse {
    pub data: Vec<OperationDescriptor>,
}

/// The `action` sub-object of an execute-operation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationAction {
    pub name: String,
    pub payload: Value,
}

/// Body posted to the execute-operation endpoint:
/// `{"data": {"action": {...}, "conversation", "message", "assistant"}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteOperationRequest {
    pub data: ExecuteOperationRequestData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteOperationRequestData {
    pub action: OperationAction,
    #[serde(default)]
    pub conversation: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub assistant: String,
}

impl ExecuteOperationRequest {
    pub fn new(
        op_name: impl Into<String>,
        payload: Value,
        conversation: impl Into<String>,
        message: impl Into<String>,
        assistant: impl Into<String>,
    ) -> Self {
        Self {
            data: ExecuteOperationRequestData {
                action: OperationAction {
                    name: op_name.into(),
                    payload,
                },
                conversation: conversation.into(),
                message: message.into(),
                assistant: assistant.into(),
            },
        }
    }
}

/// Response shape of the execute-operation endpoint: `{success, data |
/// message}`. The `data` payload may itself be wrapped in up to three
/// nested `result`/`data` envelopes -- unwrapping is the Remote-Op Bridge's
/// job (`agentrt_core::remote_ops::unwrap_response`), not this type's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteOperationResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_enumerate_envelope() {
        let json = serde_json::json!({
            "data": [
                {
                    "id": "send_email",
                    "name": "send_email",
                    "description": "Send an email",
                    "tags": ["comms"],
                    "parameters": {"type": "object", "properties": {}},
                    "bindings": {
                        "verbose": {"mode": "manual", "value": "true"}
                    }
                }
            ]
        });
        let parsed: EnumerateOperationsResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.data.len(), 1);
        let op = &parsed.data[0];
        assert_eq!(op.id, "send_email");
        assert_eq!(op.bindings["verbose"].mode, BindingMode::Manual);
    }

    #[test]
    fn legacy_params_default_to_empty() {
        let json = serde_json::json!({"id": "x", "name": "x"});
        let op: OperationDescriptor = serde_json::from_value(json).unwrap();
        assert!(op.params.is_empty());
        assert!(op.parameters.is_none());
        assert!(op.schema.is_none());
    }
}
