// Event Emitter (Component H, spec §4.8).
//
// An opaque sink attached to the action-context as `incremental_event()`.
// The loop and the tool wrappers push named events; the sink forwards them
// out of band. Failures in the sink must never affect correctness of the
// loop or the wrapped call.
//
// Grounded on `tool.py`'s `send_event(name, payload)` callable contract and
// the teacher's `events.rs` enum-of-named-events idiom -- but spec §6's
// event names are open-ended (`tools/<arbitrary-tool-name>/start`), which a
// closed Rust enum can't name, so the event name here is a `String` built
// through a small set of constructor helpers instead.

use async_trait::async_trait;
use serde_json::Value;

/// Event name helpers matching spec §6's exact naming scheme.
pub fn tool_start_event(tool_name: &str) -> String {
    format!("tools/{tool_name}/start")
}

pub fn tool_end_event(tool_name: &str) -> String {
    format!("tools/{tool_name}/end")
}

pub fn tool_error_event(tool_name: &str) -> String {
    format!("tools/{tool_name}/error")
}

pub const AGENT_STATUS_EVENT: &str = "agent/status";

/// Trait for emitting out-of-band progress events during a turn.
///
/// Implementations can forward events to a queue, a WebSocket, or a log.
/// Any failure inside `emit` must be handled by the caller independently
/// of the call it instruments -- the emitter itself never raises into the
/// tool-invocation flow (enforced by `ToolDescriptor::invoke`, not here).
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event_name: &str, payload: Value);
}

/// Discards all events. Useful when a host has no progress sink wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventEmitter;

#[async_trait]
impl EventEmitter for NoopEventEmitter {
    async fn emit(&self, _event_name: &str, _payload: Value) {}
}

/// Collects every emitted event in memory, in order. Used by tests to
/// assert on the exact event sequence a wrapped tool call produces.
#[derive(Debug, Default)]
pub struct RecordingEventEmitter {
    events: tokio::sync::Mutex<Vec<(String, Value)>>,
}

impl RecordingEventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventEmitter for RecordingEventEmitter {
    async fn emit(&self, event_name: &str, payload: Value) {
        self.events
            .lock()
            .await
            .push((event_name.to_string(), payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_spec_scheme() {
        assert_eq!(tool_start_event("search"), "tools/search/start");
        assert_eq!(tool_end_event("search"), "tools/search/end");
        assert_eq!(tool_error_event("search"), "tools/search/error");
    }

    #[tokio::test]
    async fn recording_emitter_preserves_order() {
        let emitter = RecordingEventEmitter::new();
        emitter.emit("a", Value::Null).await;
        emitter.emit("b", Value::Null).await;
        let events = emitter.events().await;
        assert_eq!(events[0].0, "a");
        assert_eq!(events[1].0, "b");
    }
}
