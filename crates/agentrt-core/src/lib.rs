//! Agent orchestration runtime: the think -> act -> observe loop that drives
//! a conversational LLM through a registry of callable tools until it emits
//! a terminal action.
//!
//! Key design decisions:
//! - Three interchangeable prompt/response shapes (`AgentLanguage::Natural`/
//!   `JsonFenced`/`NativeToolCall`) dispatched by exhaustive match, not
//!   inheritance.
//! - The built-in tool catalogue is a builder-populated, process-wide
//!   read-mostly map (`BuiltinCatalogue`); a session's `ActionRegistry` is a
//!   copy-on-replace view into it.
//! - `ActionContext` is a first-class parameter of every tool callable, not
//!   an implicit kwarg; framework-injected keys are stripped before events
//!   are emitted and before the schema is shown to an LLM.
//! - Tool execution failures are swallowed by the descriptor wrapper (an
//!   error event is emitted, the call returns `None`) rather than
//!   propagated -- preserved verbatim per spec, not a defect introduced
//!   here.
//! - Remote operations (`remote_ops`) compile a wire-level
//!   `OperationDescriptor` into the same `ToolDescriptor` shape as any
//!   built-in tool, so the loop never distinguishes local from remote
//!   capabilities.

pub mod action_context;
pub mod agent_loop;
pub mod config;
pub mod error;
pub mod event;
pub mod goal;
pub mod language;
pub mod llm;
pub mod memory;
pub mod prompt;
pub mod registry;
pub mod relevance;
pub mod remote_ops;
pub mod tool;

// Hand-rolled test doubles (`MockLlmClient`, tool/registry stubs) shared by
// this crate's own unit tests and available to host-process integration
// tests built against it.
pub mod testing;

pub use action_context::ActionContext;
pub use agent_loop::AgentLoop;
pub use config::{AgentLoopConfig, JsonVariantConfig};
pub use error::{AgentError, Result};
pub use event::{EventEmitter, NoopEventEmitter, RecordingEventEmitter};
pub use goal::Goal;
pub use language::{Action, AgentLanguage};
pub use llm::{LlmClient, LlmEndpointClient};
pub use memory::{Memory, MemoryContent, MemoryEntry, MemoryEntryType};
pub use prompt::{Prompt, PromptMessage};
pub use registry::{ActionRegistry, BuiltinCatalogue, BuiltinCatalogueBuilder, RegistrySnapshot};
pub use relevance::{ChatTurn, RelevanceFilter, UserInput};
pub use remote_ops::RemoteOpBridge;
pub use tool::{tool_fn, ToolCallable, ToolDescriptor};
