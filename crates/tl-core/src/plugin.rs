//! Plugin contract (spec §4.2): capability-tagged traits, not an
//! inheritance hierarchy. A concrete plugin implements either or both.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use serde_json::Value;

use crate::error::Result;
use crate::event::ContextEvent;
use crate::message::{ToolCall, ToolDefinition};

/// Position of a system prompt relative to the rest of the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SystemPromptPosition {
    Before,
    After,
}

/// A system-prompt contribution from a plugin.
///
/// Rendered into the message list in `(position, position_sequence
/// ascending)` order (spec §4.2).
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    pub content: String,
    pub position: SystemPromptPosition,
    pub position_sequence: i64,
    pub metadata: Value,
    pub source: Option<String>,
}

impl SystemPrompt {
    pub fn new(content: impl Into<String>, position: SystemPromptPosition) -> Self {
        SystemPrompt {
            content: content.into(),
            position,
            position_sequence: 0,
            metadata: Value::Null,
            source: None,
        }
    }

    pub fn with_sequence(mut self, seq: i64) -> Self {
        self.position_sequence = seq;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Context handed to plugins when they're asked to contribute prompts or
/// execute a tool call.
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub context_id: String,
    pub task_id: String,
    /// Opaque authentication/authorization context threaded through from
    /// the caller; the core never inspects it (spec §1 Non-goals).
    pub auth_context: Option<Value>,
}

pub type EventStream = Pin<Box<dyn Stream<Item = ContextEvent> + Send>>;

/// A plugin that contributes system prompts.
#[async_trait]
pub trait SystemPromptPlugin: Send + Sync {
    async fn generate_system_prompts(&self, ctx: &PluginContext) -> Result<Vec<SystemPrompt>>;
}

/// A plugin that contributes and executes tools.
///
/// The executing plugin is responsible for emitting its own
/// `tool-complete` (and optionally `tool-progress`, `internal:tool-message`)
/// events; the tool runner prepends `tool-start` and stamps context
/// (spec §4.2, §4.4).
#[async_trait]
pub trait ToolPlugin: Send + Sync {
    fn list_tools(&self) -> Vec<ToolDefinition>;

    fn get_tool(&self, id: &str) -> Option<ToolDefinition> {
        self.list_tools().into_iter().find(|t| t.id == id)
    }

    async fn execute_tool(&self, call: &ToolCall, ctx: &PluginContext) -> Result<EventStream>;
}

/// A handler's raw result before it's turned into a `tool-complete` event
/// (used by the local-tools reference plugin, spec §4.2).
#[derive(Debug, Clone)]
pub struct LocalToolOutcome {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub messages: Vec<crate::message::LlmMessage>,
}

impl LocalToolOutcome {
    pub fn ok(result: Value) -> Self {
        LocalToolOutcome { success: true, result: Some(result), error: None, messages: Vec::new() }
    }

    pub fn err(error: impl Into<String>) -> Self {
        LocalToolOutcome { success: false, result: None, error: Some(error.into()), messages: Vec::new() }
    }

    pub fn with_messages(mut self, messages: Vec<crate::message::LlmMessage>) -> Self {
        self.messages = messages;
        self
    }
}
