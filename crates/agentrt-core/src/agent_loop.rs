// Agent Loop (Component G, spec §4.7).
//
// The driver. Maintains memory, calls the Assembler (via `Language::construct`),
// calls the LLM, calls `Language::parse`, enforces the retry policy on parse
// failure, dispatches via the Action Registry, records the outcome, and
// terminates on a terminal tool. Grounded on `everruns-core/src/executor.rs`'s
// `AgentLoop<...>` struct shape (generic over collaborators, `tracing` spans
// per phase, a single `run` entry point) for the Rust *structuring* idiom;
// the per-iteration parse/retry/adapt/dispatch protocol itself is new, built
// directly from spec §4.7 -- the teacher's loop has no language-variant or
// retry-adapt concept at all.

use serde_json::Value;

use crate::action_context::ActionContext;
use crate::config::AgentLoopConfig;
use crate::error::Result;
use crate::goal::Goal;
use crate::language::{Action, AgentLanguage};
use crate::llm::LlmClient;
use crate::memory::{Memory, MemoryEntry};
use crate::registry::{ActionRegistry, RegistrySnapshot};

/// State for one agent session (spec §4.7 "State"). Owns `memory` and
/// `registry` exclusively for the session's lifetime (spec §3 Ownership).
pub struct AgentLoop {
    memory: Memory,
    registry: ActionRegistry,
    language: AgentLanguage,
    goals: Vec<Goal>,
    llm: std::sync::Arc<dyn LlmClient>,
    config: AgentLoopConfig,
}

impl AgentLoop {
    /// Constructs a session. Fails with `RegistryStateError` if `registry`
    /// was never built from a catalogue carrying a `terminate` tool --
    /// "the loop is not allowed to run a registry that lacks it" (spec
    /// §4.1) -- and otherwise guarantees the terminator is present in the
    /// live snapshot before the first iteration (spec §8 property 5).
    pub fn new(
        goals: Vec<Goal>,
        registry: ActionRegistry,
        language: AgentLanguage,
        llm: std::sync::Arc<dyn LlmClient>,
        config: AgentLoopConfig,
    ) -> Result<Self> {
        registry.register_terminate()?;
        Ok(Self {
            memory: Memory::new(),
            registry,
            language,
            goals,
            llm,
            config,
        })
    }

    /// Seeds memory with the originating task before the first iteration
    /// (spec §3 Memory invariant ii: "the first user entry is the
    /// originating task").
    pub fn seed_task(&mut self, task: impl Into<crate::memory::MemoryContent>) {
        self.memory.push(MemoryEntry::user(task));
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Runs iterations until a terminal tool is invoked, `max_iterations`
    /// is reached, or `action_context` is cancelled (spec §4.7
    /// "Cancellation / bounds"). Returns whatever the terminal tool
    /// returned (spec §6 "Terminator contract").
    pub async fn run(&mut self, action_context: ActionContext) -> Result<Value> {
        tracing::info!(session_id = %action_context.session_id, "starting agent loop");
        let mut iteration: u32 = 0;
        loop {
            if let Some(max) = self.config.max_iterations {
                if iteration >= max {
                    tracing::warn!(session_id = %action_context.session_id, max, "iteration limit reached");
                    let snapshot = self.registry.snapshot();
                    let action = Action::terminate("agent loop reached its iteration limit");
                    let (result, _terminal) =
                        self.dispatch_and_record(action, &snapshot, &action_context).await?;
                    return Ok(result);
                }
            }
            if action_context.is_cancelled() {
                tracing::info!(session_id = %action_context.session_id, "session cancelled");
                let snapshot = self.registry.snapshot();
                let action = Action::terminate("agent loop session was cancelled");
                let (result, _terminal) =
                    self.dispatch_and_record(action, &snapshot, &action_context).await?;
                return Ok(result);
            }

            tracing::debug!(session_id = %action_context.session_id, iteration, "running iteration");
            let (action, snapshot) = self.resolve_action(&action_context).await?;
            let (result, terminal) = self.dispatch_and_record(action, &snapshot, &action_context).await?;
            if terminal {
                tracing::info!(session_id = %action_context.session_id, iterations = iteration + 1, "agent loop terminated");
                return Ok(result);
            }
            iteration += 1;
        }
    }

    /// Steps 1-5 of the per-iteration protocol: construct the prompt, call
    /// the LLM, parse the reply, and -- on `ParseFailure` or `UnknownTool`
    /// -- adapt and retry up to `max_parse_retries` times. On exhaustion,
    /// records the failure in memory and returns a synthesized terminate
    /// action rather than propagating the parse error (spec §7: "the
    /// caller never sees raw parse errors").
    async fn resolve_action(&mut self, ctx: &ActionContext) -> Result<(Action, RegistrySnapshot)> {
        let snapshot = self.registry.snapshot();
        let prompt = self.language.construct(&self.goals, &self.memory, &snapshot);

        if ctx.is_cancelled() {
            return Ok((Action::terminate("agent loop session was cancelled"), snapshot));
        }
        let mut reply = self.llm.chat(&prompt).await?;
        self.memory.push(MemoryEntry::prompt(
            serde_json::to_value(&prompt).unwrap_or(Value::Null),
        ));

        let mut current_prompt = prompt;
        let mut retries_left = self.config.max_parse_retries;

        loop {
            let err = match self.language.parse(&reply) {
                Ok(action) if snapshot.contains_key(&action.tool) => return Ok((action, snapshot)),
                Ok(action) => crate::error::AgentError::unknown_tool(action.tool),
                Err(err) => err,
            };

            if retries_left == 0 {
                tracing::warn!(session_id = %ctx.session_id, %err, "parse retries exhausted");
                let message = format!("agent loop could not resolve a valid action: {err}");
                self.memory.push(MemoryEntry::assistant(message.clone()));
                return Ok((Action::terminate(message), snapshot));
            }

            tracing::debug!(session_id = %ctx.session_id, %err, retries_left, "adapting prompt after parse failure");
            current_prompt = self.language.adapt(&current_prompt, &reply, &err);
            retries_left -= 1;

            if ctx.is_cancelled() {
                return Ok((Action::terminate("agent loop session was cancelled"), snapshot));
            }
            reply = self.llm.chat(&current_prompt).await?;
        }
    }

    /// Steps 6-7: looks up the descriptor in `snapshot` (the same snapshot
    /// `resolve_action` resolved the tool name against, so dispatch never
    /// observes a different registry mid-iteration -- spec §8 property 4),
    /// invokes it, and appends the intent/result memory entries.
    async fn dispatch_and_record(
        &mut self,
        action: Action,
        snapshot: &RegistrySnapshot,
        ctx: &ActionContext,
    ) -> Result<(Value, bool)> {
        let descriptor = snapshot
            .get(&action.tool)
            .cloned()
            .ok_or_else(|| crate::error::AgentError::unknown_tool(action.tool.clone()))?;

        let result = descriptor.invoke(ctx.clone(), action.args.clone()).await;
        let result_value = result.unwrap_or(Value::Null);

        self.memory.push(MemoryEntry::assistant(
            serde_json::json!({ "tool": action.tool, "args": action.args }),
        ));
        self.memory.push(MemoryEntry::environment(result_value.clone()));

        Ok((result_value, descriptor.terminal))
    }
}
