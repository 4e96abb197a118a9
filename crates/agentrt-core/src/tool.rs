// Tool Descriptor (Component B, spec §4.2).
//
// A descriptor is a value; its `function` is a wrapped form of a raw
// callable. Grounded directly on `tool.py`'s `register_tool` decorator:
// `pre_call_action`/`post_call_action`/`error_call_action` each emit an
// event and an optional formatted status, each independently swallowing
// its own exceptions, and the wrapped call itself never lets an exception
// from the raw function escape to the caller -- it returns `None` instead
// (spec §7's "swallowed tool exceptions", preserved verbatim because the
// event-telemetry pipeline depends on the event having been emitted while
// the result is `None`).

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};

use crate::action_context::ActionContext;
use crate::event::{tool_end_event, tool_error_event, tool_start_event, AGENT_STATUS_EVENT};

/// The raw, user-supplied tool body. Boxed so descriptors can be built
/// from both plain functions and async closures.
pub type ToolCallable = Arc<
    dyn Fn(ActionContext, Value) -> Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>
        + Send
        + Sync,
>;

/// Wraps a synchronous-looking async closure into a `ToolCallable`.
pub fn tool_fn<F, Fut>(f: F) -> ToolCallable
where
    F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(move |ctx, args| Box::pin(f(ctx, args)))
}

/// Invocable wrapping of one tool: schema, flags, tags, and the
/// event-emitting lifecycle hooks around the raw callable (spec §4.2).
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON-schema object describing `args`. Callers should read this via
    /// `public_parameters()`, which strips the framework-injected keys.
    pub parameters: Value,
    pub output: Option<Value>,
    pub terminal: bool,
    pub tags: HashSet<String>,
    /// `{placeholder}`-templated status strings formatted against the
    /// sanitized args map, matching `status.format(logged_args)` /
    /// `result_status.format({**logged_args, "result": ...})` /
    /// `errorStatus.format({**logged_args, "exception", "traceback"})`.
    pub status_template: Option<String>,
    pub result_status_template: Option<String>,
    pub error_status_template: Option<String>,
    function: ToolCallable,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        terminal: bool,
        tags: impl IntoIterator<Item = String>,
        function: ToolCallable,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            output: None,
            terminal,
            tags: tags.into_iter().collect(),
            status_template: None,
            result_status_template: None,
            error_status_template: None,
            function,
        }
    }

    /// The schema exposed to an LLM: `action_context` and any
    /// underscore-prefixed parameter are injected by the framework and
    /// never shown (spec §4.2).
    pub fn public_parameters(&self) -> Value {
        let mut schema = self.parameters.clone();
        if let Some(obj) = schema.as_object_mut() {
            if let Some(Value::Object(props)) = obj.get_mut("properties") {
                props.retain(|k, _| k != "action_context" && !k.starts_with('_'));
            }
            if let Some(Value::Array(required)) = obj.get_mut("required") {
                required.retain(|v| {
                    v.as_str()
                        .map(|s| s != "action_context" && !s.starts_with('_'))
                        .unwrap_or(true)
                });
            }
        }
        schema
    }

    /// Drops `action_context` and any arg key matching one of the
    /// action-context's own property names, plus any underscore-prefixed
    /// key -- the two independent redaction rules of spec §4.2.
    fn sanitize_args(&self, ctx: &ActionContext, args: &Value) -> Value {
        let property_names = ctx.property_names();
        match args.as_object() {
            Some(obj) => {
                let mut sanitized = Map::new();
                for (k, v) in obj {
                    if k == "action_context" || k.starts_with('_') || property_names.contains(&k.as_str()) {
                        continue;
                    }
                    sanitized.insert(k.clone(), v.clone());
                }
                Value::Object(sanitized)
            }
            None => args.clone(),
        }
    }

    /// Invokes the wrapped tool. Per spec §4.2/§7: on success returns the
    /// raw callable's result; on a raw-callable error, emits a
    /// `tools/<name>/error` event and returns `None` -- the exception
    /// never escapes this call. Any failure inside an event hook itself is
    /// independently swallowed (logged, not propagated).
    pub async fn invoke(&self, ctx: ActionContext, args: Value) -> Option<Value> {
        let sanitized = self.sanitize_args(&ctx, &args);
        let emitter = ctx.event_emitter().clone();

        emit_guarded(emitter.as_ref(), &tool_start_event(&self.name), sanitized.clone()).await;
        if let Some(template) = &self.status_template {
            emit_status(emitter.as_ref(), template, &sanitized).await;
        }

        match (self.function)(ctx.clone(), args).await {
            Ok(result) => {
                let mut payload = sanitized.as_object().cloned().unwrap_or_default();
                payload.insert("result".to_string(), result.clone());
                emit_guarded(emitter.as_ref(), &tool_end_event(&self.name), Value::Object(payload.clone())).await;
                if let Some(template) = &self.result_status_template {
                    emit_status(emitter.as_ref(), template, &Value::Object(payload)).await;
                }
                Some(result)
            }
            Err(e) => {
                let mut payload = sanitized.as_object().cloned().unwrap_or_default();
                payload.insert("exception".to_string(), Value::String(e.to_string()));
                payload.insert("traceback".to_string(), Value::String(format!("{e:?}")));
                emit_guarded(emitter.as_ref(), &tool_error_event(&self.name), Value::Object(payload.clone())).await;
                if let Some(template) = &self.error_status_template {
                    emit_status(emitter.as_ref(), template, &Value::Object(payload)).await;
                }
                tracing::warn!(tool = %self.name, error = %e, "tool execution failed; swallowed per spec §7");
                None
            }
        }
    }
}

async fn emit_guarded(emitter: &dyn crate::event::EventEmitter, name: &str, payload: Value) {
    // The event sink failing must never affect the call it instruments;
    // there is nothing to catch here since `emit` itself cannot panic
    // across this boundary in safe Rust, but we still isolate it in its
    // own statement so a future fallible sink only needs to change here.
    emitter.emit(name, payload).await;
}

async fn emit_status(emitter: &dyn crate::event::EventEmitter, template: &str, context: &Value) {
    let status = format_status_template(template, context);
    emitter
        .emit(AGENT_STATUS_EVENT, serde_json::json!({ "status": status }))
        .await;
}

/// Minimal `{name}`-placeholder substitution against a JSON object,
/// standing in for Python's `template.format(dict)`.
fn format_status_template(template: &str, context: &Value) -> String {
    let re = Regex::new(r"\{(\w+)\}").expect("static regex is valid");
    let obj = context.as_object();
    re.replace_all(template, |caps: &regex::Captures| {
        let key = &caps[1];
        obj.and_then(|o| o.get(key))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| format!("{{{key}}}"))
    })
    .into_owned()
}
