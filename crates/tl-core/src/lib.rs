//! Domain types, event taxonomy, and store/provider/plugin contracts for
//! the turn execution engine.
//!
//! This crate has no engine logic — it's the shared vocabulary that
//! `tl-stores` and `tl-engine` build on.

pub mod agent_state;
pub mod artifact;
pub mod error;
pub mod event;
pub mod message;
pub mod plugin;
pub mod provider;
pub mod sse;
pub mod store;
pub mod task_state;

pub use agent_state::{AgentState, AgentStatus};
pub use artifact::{Artifact, ArtifactHeader, ArtifactStatus, CreateArtifactRequest};
pub use error::{Error, ErrorKind, Result};
pub use event::{ContextEvent, Event, FinishReason, TaskStatus, Usage};
pub use message::{LlmMessage, ToolCall, ToolCallFunction, ToolDefinition};
pub use plugin::{EventStream, LocalToolOutcome, PluginContext, SystemPrompt, SystemPromptPlugin, SystemPromptPosition, ToolPlugin};
pub use provider::{ChatRequest, LlmProvider};
pub use store::{AgentStore, ArtifactStore, MessageStore, TaskStateStore};
pub use task_state::TaskState;
