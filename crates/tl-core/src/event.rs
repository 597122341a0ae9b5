//! The event taxonomy (spec §4.1) — the system's lingua franca.
//!
//! Three families plus an internal/debug family: task lifecycle,
//! content/reasoning/tools, artifact writes, and `internal:*` events that
//! never reach an external stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::ToolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Working,
    WaitingInput,
    WaitingAuth,
    WaitingSubtask,
    Completed,
    Failed,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The full event union. Tagged by `kind` on the wire.
///
/// `kind() == "internal:..."` events never appear on an external stream
/// (see [`Event::is_external`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Event {
    // ── Task lifecycle ──────────────────────────────────────────
    #[serde(rename = "task-created")]
    TaskCreated {
        task_id: String,
        initiator: String,
        #[serde(default)]
        parent_task_id: Option<String>,
        metadata: Value,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "task-status")]
    TaskStatus {
        status: TaskStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "task-complete")]
    TaskComplete {
        content: String,
        metadata: Value,
        timestamp: DateTime<Utc>,
    },

    // ── Content / reasoning / tools ─────────────────────────────
    #[serde(rename = "content-delta")]
    ContentDelta {
        index: u32,
        text: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "content-complete")]
    ContentComplete {
        content: String,
        finish_reason: FinishReason,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "tool-call")]
    ToolCallEvent {
        tool_call: ToolCall,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "tool-start")]
    ToolStart {
        tool_call_id: String,
        tool_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "tool-progress")]
    ToolProgress {
        tool_call_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "tool-complete")]
    ToolComplete {
        tool_call_id: String,
        tool_name: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "thought-stream")]
    ThoughtStream {
        text: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "llm-usage")]
    LlmUsage {
        usage: Usage,
        timestamp: DateTime<Utc>,
    },

    // ── Artifact writes ─────────────────────────────────────────
    #[serde(rename = "file-write")]
    FileWrite {
        artifact_id: String,
        index: u32,
        chunk: String,
        complete: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "data-write")]
    DataWrite {
        artifact_id: String,
        data: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "dataset-write")]
    DatasetWrite {
        artifact_id: String,
        index: u32,
        rows: Value,
        complete: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        schema: Option<Value>,
        timestamp: DateTime<Utc>,
    },

    // ── Internal / debug ─────────────────────────────────────────
    #[serde(rename = "internal:llm-call")]
    InternalLlmCall {
        model: Option<String>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "internal:tool-start")]
    InternalToolStart {
        tool_name: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "internal:tool-complete")]
    InternalToolComplete {
        tool_name: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "internal:checkpoint")]
    InternalCheckpoint {
        iteration: u32,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "internal:thought-process")]
    InternalThoughtProcess {
        text: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "internal:tool-message")]
    InternalToolMessage {
        message: crate::message::LlmMessage,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// `kind` as it appears on the wire (the serde tag value).
    pub fn kind(&self) -> &'static str {
        match self {
            Event::TaskCreated { .. } => "task-created",
            Event::TaskStatus { .. } => "task-status",
            Event::TaskComplete { .. } => "task-complete",
            Event::ContentDelta { .. } => "content-delta",
            Event::ContentComplete { .. } => "content-complete",
            Event::ToolCallEvent { .. } => "tool-call",
            Event::ToolStart { .. } => "tool-start",
            Event::ToolProgress { .. } => "tool-progress",
            Event::ToolComplete { .. } => "tool-complete",
            Event::ThoughtStream { .. } => "thought-stream",
            Event::LlmUsage { .. } => "llm-usage",
            Event::FileWrite { .. } => "file-write",
            Event::DataWrite { .. } => "data-write",
            Event::DatasetWrite { .. } => "dataset-write",
            Event::InternalLlmCall { .. } => "internal:llm-call",
            Event::InternalToolStart { .. } => "internal:tool-start",
            Event::InternalToolComplete { .. } => "internal:tool-complete",
            Event::InternalCheckpoint { .. } => "internal:checkpoint",
            Event::InternalThoughtProcess { .. } => "internal:thought-process",
            Event::InternalToolMessage { .. } => "internal:tool-message",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::TaskCreated { timestamp, .. }
            | Event::TaskStatus { timestamp, .. }
            | Event::TaskComplete { timestamp, .. }
            | Event::ContentDelta { timestamp, .. }
            | Event::ContentComplete { timestamp, .. }
            | Event::ToolCallEvent { timestamp, .. }
            | Event::ToolStart { timestamp, .. }
            | Event::ToolProgress { timestamp, .. }
            | Event::ToolComplete { timestamp, .. }
            | Event::ThoughtStream { timestamp, .. }
            | Event::LlmUsage { timestamp, .. }
            | Event::FileWrite { timestamp, .. }
            | Event::DataWrite { timestamp, .. }
            | Event::DatasetWrite { timestamp, .. }
            | Event::InternalLlmCall { timestamp, .. }
            | Event::InternalToolStart { timestamp, .. }
            | Event::InternalToolComplete { timestamp, .. }
            | Event::InternalCheckpoint { timestamp, .. }
            | Event::InternalThoughtProcess { timestamp, .. }
            | Event::InternalToolMessage { timestamp, .. } => *timestamp,
        }
    }

    /// An event is external iff its kind does not start with `internal:`.
    pub fn is_external(&self) -> bool {
        !self.kind().starts_with("internal:")
    }

    /// `true` for the `content-complete` variant that ends a turn (i.e.
    /// `finish_reason != ToolCalls`) — the loop-runner's stop condition.
    pub fn is_terminal_content_complete(&self) -> bool {
        matches!(
            self,
            Event::ContentComplete { finish_reason, .. } if *finish_reason != FinishReason::ToolCalls
        )
    }

    pub fn as_tool_complete(&self) -> Option<(&str, &str, bool)> {
        match self {
            Event::ToolComplete { tool_call_id, tool_name, success, .. } => {
                Some((tool_call_id, tool_name, *success))
            }
            _ => None,
        }
    }
}

/// A raw [`Event`] stamped with the task/context it belongs to, plus a
/// breadcrumb path accumulated as it bubbles up through nested runners
/// (spec §4.1: `path?: string[]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEvent {
    #[serde(flatten)]
    pub event: Event,
    pub context_id: String,
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    /// Set when this event belongs to a child task (sub-agent) spawned
    /// from a parent turn; such events must never contribute messages to
    /// the parent loop's history (spec §4.6).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,
}

impl ContextEvent {
    pub fn new(event: Event, context_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        ContextEvent {
            event,
            context_id: context_id.into(),
            task_id: task_id.into(),
            path: Vec::new(),
            parent_task_id: None,
        }
    }

    /// Prepend a breadcrumb segment (e.g. `"tool:search"`) as the event
    /// bubbles up through a nested runner.
    pub fn with_path_prefix(mut self, segment: impl Into<String>) -> Self {
        self.path.insert(0, segment.into());
        self
    }

    pub fn is_child_task_event(&self) -> bool {
        self.parent_task_id.is_some()
    }

    pub fn is_external(&self) -> bool {
        self.event.is_external()
    }
}
