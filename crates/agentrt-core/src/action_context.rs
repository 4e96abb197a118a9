// Action-Context: the per-invocation envelope passed to every tool
// function (spec §3). Lifetime = one LLM turn; must not be retained past
// the turn. Grounded on `ops.py`'s `ActionContext` usage
// (`access_token`/`current_user`/`session_id`/`agent_id`/`message_id`
// properties read by `call_api`) and `tool.py`'s
// `action_context.incremental_event()` / `action_context.properties`
// usage for argument sanitization.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::event::EventEmitter;

/// Turn-scoped invocation envelope. Shared read-only across every tool
/// call within one turn via `Arc`; never retained past the turn.
#[derive(Clone)]
pub struct ActionContext {
    pub principal: String,
    pub bearer_token: String,
    pub session_id: String,
    pub agent_id: String,
    pub message_id: String,
    event_emitter: Arc<dyn EventEmitter>,
    cancelled: Arc<AtomicBool>,
}

impl ActionContext {
    pub fn new(
        principal: impl Into<String>,
        bearer_token: impl Into<String>,
        session_id: impl Into<String>,
        agent_id: impl Into<String>,
        message_id: impl Into<String>,
        event_emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        Self {
            principal: principal.into(),
            bearer_token: bearer_token.into(),
            session_id: session_id.into(),
            agent_id: agent_id.into(),
            message_id: message_id.into(),
            event_emitter,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn event_emitter(&self) -> &Arc<dyn EventEmitter> {
        &self.event_emitter
    }

    /// Argument keys hidden from sanitized event payloads and from the
    /// public parameter schema, in addition to any key starting with `_`
    /// (spec §4.2's "two independent redaction rules").
    pub fn property_names(&self) -> [&'static str; 5] {
        [
            "principal",
            "bearer_token",
            "session_id",
            "agent_id",
            "message_id",
        ]
    }

    /// Cooperative cancellation flag, checked before each LLM call and
    /// before each tool invocation (spec §5). A tool that wants to be
    /// interruptible must poll this itself.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NoopEventEmitter;

    #[test]
    fn cancellation_flag_is_shared_across_clones() {
        let ctx = ActionContext::new("u", "tok", "sess", "agent", "msg", Arc::new(NoopEventEmitter));
        let clone = ctx.clone();
        assert!(!ctx.is_cancelled());
        clone.cancel();
        assert!(ctx.is_cancelled());
    }
}
