// Remote-Op Bridge (Component C, spec §4.3).
//
// Fetches the set of remote operations reachable by the current principal
// and compiles each `OperationDescriptor` into an invokable `ToolDescriptor`
// whose callable POSTs a JSON body to the operation's execute endpoint.
// Grounded directly on `agent/tools/ops.py`: `get_default_ops_as_tools`'s
// POST-to-`/ops/get` enumeration call, `op_to_tool`'s
// parameters/schema/params precedence and binding application,
// `build_schema_from_params`'s substring type inference, and
// `execute_api_call`'s bounded three-level `result`/`data` unwrap and
// `{success: false, message}` failure conversion.

use std::time::Duration;

use agentrt_contracts::{
    Binding, BindingMode, EnumerateOperationsResponse, ExecuteOperationRequest,
    ExecuteOperationResponse, LegacyParam, OperationDescriptor,
};
use serde_json::{Map, Value};

use crate::action_context::ActionContext;
use crate::error::{AgentError, Result};
use crate::tool::{tool_fn, ToolDescriptor};

const ENUMERATE_PATH: &str = "/ops/get";
const EXECUTE_PATH: &str = "/assistant-api/execute-custom-auto";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches and compiles remote operations against one API base URL.
#[derive(Clone)]
pub struct RemoteOpBridge {
    client: reqwest::Client,
    api_base: String,
}

impl RemoteOpBridge {
    pub fn new(api_base: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("reqwest client build with static config cannot fail");
        Self {
            client,
            api_base: api_base.into(),
        }
    }

    /// `list_remote_ops(action_context) -> [OperationDescriptor]` (spec
    /// §4.3). Posts `{"data": {"tag": tag}}` to the ops-enumeration path.
    pub async fn list_remote_ops(&self, bearer_token: &str, tag: &str) -> Result<Vec<OperationDescriptor>> {
        let url = format!("{}{ENUMERATE_PATH}", self.api_base);
        let payload = serde_json::json!({ "data": { "tag": tag } });

        let response = self
            .client
            .post(&url)
            .bearer_auth(bearer_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AgentError::remote_op_transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| AgentError::remote_op_transport(e.to_string()))?;

        let parsed: EnumerateOperationsResponse = response
            .json()
            .await
            .map_err(|e| AgentError::remote_op_transport(e.to_string()))?;
        Ok(parsed.data)
    }

    /// Compiles one remote operation descriptor into an invokable tool.
    pub fn compile(&self, op: OperationDescriptor) -> ToolDescriptor {
        let name = effective_name(&op);
        let description = effective_description(&op);
        let schema = effective_schema(&op);
        let terminal = false;
        let tags = op.tags.clone();

        let op_id = op.id.clone();
        let bindings = op.bindings.clone();
        let client = self.client.clone();
        let api_base = self.api_base.clone();

        let callable = tool_fn(move |ctx: ActionContext, args: Value| {
            let client = client.clone();
            let api_base = api_base.clone();
            let op_id = op_id.clone();
            let bindings = bindings.clone();
            async move { invoke_remote_op(&client, &api_base, &op_id, &bindings, ctx, args).await }
        });

        let mut descriptor = ToolDescriptor::new(name, description, schema, terminal, tags, callable);
        descriptor.output = None;
        descriptor
    }
}

fn effective_name(op: &OperationDescriptor) -> String {
    match &op.custom_name {
        Some(n) if !n.trim().is_empty() => n.trim().to_string(),
        _ => op.id.clone(),
    }
}

fn effective_description(op: &OperationDescriptor) -> String {
    match &op.custom_description {
        Some(d) if !d.trim().is_empty() => d.trim().to_string(),
        _ => op.description.clone(),
    }
}

/// `parameters` -> `schema` -> `build_from(params)`, then binding application
/// (spec §4.3 rule 2-3).
fn effective_schema(op: &OperationDescriptor) -> Value {
    let mut schema = op
        .parameters
        .clone()
        .or_else(|| op.schema.clone())
        .unwrap_or_else(|| build_schema_from_params(&op.params));

    apply_ai_bindings(&mut schema, &op.bindings);
    apply_manual_binding_removal(&mut schema, &op.bindings);
    schema
}

/// Type inference from description substrings, required-ness from the
/// literal word "required" -- reproduced verbatim from
/// `build_schema_from_params` (spec §4.3 rule 2).
fn build_schema_from_params(params: &[LegacyParam]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in params {
        let description_lower = param.description.to_lowercase();
        let mut param_schema = Map::new();
        param_schema.insert("description".to_string(), Value::String(param.description.clone()));

        let inferred_type = if description_lower.contains("boolean") {
            Some("boolean")
        } else if description_lower.contains("str") || description_lower.contains("string") {
            Some("string")
        } else if ["int", "integer", "number"].iter().any(|t| description_lower.contains(t)) {
            Some("number")
        } else if description_lower.contains("array") || description_lower.contains("list") {
            Some("array")
        } else if description_lower.contains("object") || description_lower.contains("dict") {
            Some("object")
        } else {
            None
        };
        if let Some(t) = inferred_type {
            param_schema.insert("type".to_string(), Value::String(t.to_string()));
        }

        if description_lower.contains("required") {
            required.push(Value::String(param.name.clone()));
        }

        properties.insert(param.name.clone(), Value::Object(param_schema));
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema.insert("properties".to_string(), Value::Object(properties));
    schema.insert("required".to_string(), Value::Array(required));
    Value::Object(schema)
}

/// `mode = "ai"` rewrites the parameter's description in place; type and
/// required-ness are untouched (spec §4.3 rule 3).
fn apply_ai_bindings(schema: &mut Value, bindings: &std::collections::HashMap<String, Binding>) {
    let Some(properties) = schema.get_mut("properties").and_then(Value::as_object_mut) else {
        return;
    };
    for (param_name, binding) in bindings {
        if binding.mode != BindingMode::Ai {
            continue;
        }
        if let Some(Value::Object(param_schema)) = properties.get_mut(param_name) {
            param_schema.insert("description".to_string(), binding.value.clone());
        }
    }
}

/// `mode = "manual"` removes the parameter from `properties` and `required`
/// entirely (spec §4.3 rule 3 / invariant 8).
fn apply_manual_binding_removal(schema: &mut Value, bindings: &std::collections::HashMap<String, Binding>) {
    let manual_names: Vec<&String> = bindings
        .iter()
        .filter(|(_, b)| b.mode == BindingMode::Manual)
        .map(|(name, _)| name)
        .collect();
    if manual_names.is_empty() {
        return;
    }

    if let Some(properties) = schema.get_mut("properties").and_then(Value::as_object_mut) {
        for name in &manual_names {
            properties.remove(*name);
        }
    }
    if let Some(Value::Array(required)) = schema.get_mut("required") {
        required.retain(|v| !manual_names.iter().any(|n| v.as_str() == Some(n.as_str())));
    }
}

/// Coerces the literal strings `"true"`/`"false"` (case-insensitively) to
/// booleans; any other string value passes through unchanged (spec §4.3
/// rule 4, invariant 9).
fn coerce_binding_value(value: &Value) -> Value {
    match value {
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => value.clone(),
        },
        other => other.clone(),
    }
}

async fn invoke_remote_op(
    client: &reqwest::Client,
    api_base: &str,
    op_id: &str,
    bindings: &std::collections::HashMap<String, Binding>,
    ctx: ActionContext,
    args: Value,
) -> anyhow::Result<Value> {
    let mut merged = args.as_object().cloned().unwrap_or_default();
    for (param_name, binding) in bindings {
        if binding.mode == BindingMode::Manual {
            merged.insert(param_name.clone(), coerce_binding_value(&binding.value));
        }
    }

    // `conversation`/`message`/`assistant` are hardcoded to empty strings,
    // matching `execute_api_call` in the original implementation verbatim
    // rather than backfilling them from the action-context.
    let request = ExecuteOperationRequest::new(op_id, Value::Object(merged), "", "", "");
    let url = format!("{api_base}{EXECUTE_PATH}");
    let response = match client
        .post(&url)
        .bearer_auth(&ctx.bearer_token)
        .json(&request)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => return Ok(failure_value(e.to_string())),
    };

    let parsed: ExecuteOperationResponse = match response.json().await {
        Ok(p) => p,
        Err(e) => return Ok(failure_value(e.to_string())),
    };

    if !parsed.success {
        return Ok(serde_json::json!({
            "success": false,
            "message": parsed.message.unwrap_or_default(),
        }));
    }

    Ok(unwrap_response(parsed.data.unwrap_or(Value::Null)))
}

fn failure_value(message: String) -> Value {
    serde_json::json!({ "success": false, "message": message })
}

/// Bounded three-level unwrap, preferring `result` over `data` at each
/// level -- reproduced verbatim from `execute_api_call` (spec §4.3 rule 5).
fn unwrap_response(mut payload: Value) -> Value {
    for _ in 0..3 {
        let Some(obj) = payload.as_object() else { break };
        if let Some(result) = obj.get("result") {
            if !result.is_null() {
                payload = result.clone();
                continue;
            }
        }
        if let Some(data) = obj.get("data") {
            if !data.is_null() {
                payload = data.clone();
                continue;
            }
        }
        break;
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn build_schema_infers_types_from_description() {
        let params = vec![
            LegacyParam {
                name: "count".to_string(),
                description: "an integer, required".to_string(),
            },
            LegacyParam {
                name: "label".to_string(),
                description: "a string value".to_string(),
            },
            LegacyParam {
                name: "enabled".to_string(),
                description: "a boolean flag".to_string(),
            },
        ];
        let schema = build_schema_from_params(&params);
        assert_eq!(schema["properties"]["count"]["type"], "number");
        assert_eq!(schema["properties"]["label"]["type"], "string");
        assert_eq!(schema["properties"]["enabled"]["type"], "boolean");
        assert_eq!(schema["required"], serde_json::json!(["count"]));
    }

    #[test]
    fn manual_binding_removes_param_from_schema_and_required() {
        let mut schema = serde_json::json!({
            "type": "object",
            "properties": {"verbose": {"type": "boolean"}, "query": {"type": "string"}},
            "required": ["verbose", "query"]
        });
        let mut bindings = HashMap::new();
        bindings.insert(
            "verbose".to_string(),
            Binding { mode: BindingMode::Manual, value: Value::String("true".to_string()) },
        );
        apply_manual_binding_removal(&mut schema, &bindings);
        assert!(!schema["properties"].as_object().unwrap().contains_key("verbose"));
        assert_eq!(schema["required"], serde_json::json!(["query"]));
    }

    #[test]
    fn ai_binding_rewrites_description_only() {
        let mut schema = serde_json::json!({
            "properties": {"query": {"type": "string", "description": "old"}}
        });
        let mut bindings = HashMap::new();
        bindings.insert(
            "query".to_string(),
            Binding { mode: BindingMode::Ai, value: Value::String("the search text".to_string()) },
        );
        apply_ai_bindings(&mut schema, &bindings);
        assert_eq!(schema["properties"]["query"]["description"], "the search text");
        assert_eq!(schema["properties"]["query"]["type"], "string");
    }

    #[test]
    fn coerce_binding_value_only_touches_true_false_literals() {
        assert_eq!(coerce_binding_value(&Value::String("TRUE".to_string())), Value::Bool(true));
        assert_eq!(coerce_binding_value(&Value::String("False".to_string())), Value::Bool(false));
        assert_eq!(
            coerce_binding_value(&Value::String("other".to_string())),
            Value::String("other".to_string())
        );
    }

    #[test]
    fn unwrap_response_prefers_result_over_data_and_stops_at_three_levels() {
        let payload = serde_json::json!({
            "result": {
                "result": {
                    "result": {"result": {"final": true}, "data": "unused"}
                }
            }
        });
        let unwrapped = unwrap_response(payload);
        // three iterations: level0->result, level1->result, level2->result,
        // leaving the innermost {"result": ..., "data": ...} object itself.
        assert!(unwrapped.get("result").is_some());
    }

    #[test]
    fn unwrap_response_falls_back_to_data_when_result_absent() {
        let payload = serde_json::json!({"data": {"final": true}});
        let unwrapped = unwrap_response(payload);
        assert_eq!(unwrapped, serde_json::json!({"final": true}));
    }

    #[test]
    fn effective_name_prefers_custom_name() {
        let op = OperationDescriptor {
            id: "send_email".to_string(),
            name: "send_email".to_string(),
            description: "sends an email".to_string(),
            custom_name: Some("  emailer  ".to_string()),
            custom_description: None,
            tags: vec![],
            parameters: None,
            schema: None,
            params: vec![],
            bindings: HashMap::new(),
            path: None,
        };
        assert_eq!(effective_name(&op), "emailer");
    }

    #[test]
    fn effective_name_falls_back_to_id_when_custom_name_blank() {
        let op = OperationDescriptor {
            id: "send_email".to_string(),
            name: "send_email".to_string(),
            description: "sends an email".to_string(),
            custom_name: Some("   ".to_string()),
            custom_description: None,
            tags: vec![],
            parameters: None,
            schema: None,
            params: vec![],
            bindings: HashMap::new(),
            path: None,
        };
        assert_eq!(effective_name(&op), "send_email");
    }
}
