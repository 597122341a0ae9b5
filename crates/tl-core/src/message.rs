//! Conversation messages and tool-call records, provider-agnostic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One message in the conversation history (spec §3 `LLMMessage`).
///
/// A tagged union by `role`. `Assistant` optionally carries `tool_calls`;
/// `Tool` mandatorily carries `tool_call_id`, which must match the id of a
/// tool call in a preceding `Assistant` message within the same context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum LlmMessage {
    System { content: String },
    User { content: String },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        content: String,
        tool_call_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        LlmMessage::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        LlmMessage::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        LlmMessage::Assistant { content: content.into(), tool_calls: Vec::new() }
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        LlmMessage::Assistant { content: content.into(), tool_calls }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        LlmMessage::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
            name: Some(name.into()),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            LlmMessage::System { content }
            | LlmMessage::User { content }
            | LlmMessage::Assistant { content, .. }
            | LlmMessage::Tool { content, .. } => content,
        }
    }
}

/// A single structured tool invocation requested by the model.
///
/// `name` must match `^[A-Za-z0-9_-]+$` (validated in the tool runner, not
/// at deserialization, so malformed calls can still be reported as an
/// event rather than rejected at the wire boundary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_tool_call_type")]
    pub call_type: String,
    pub function: ToolCallFunction,
}

fn default_tool_call_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        ToolCall {
            id: id.into(),
            call_type: "function".to_string(),
            function: ToolCallFunction { name: name.into(), arguments },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// `^[A-Za-z0-9_-]+$`.
    pub fn has_valid_name(&self) -> bool {
        !self.function.name.is_empty()
            && self
                .function
                .name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }
}

/// A tool's wire-format description, as handed to the LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub id: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub parameters: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_tool_names() {
        let tc = ToolCall::new("c1", "add_numbers-2", serde_json::json!({}));
        assert!(tc.has_valid_name());
    }

    #[test]
    fn rejects_invalid_tool_names() {
        let tc = ToolCall::new("c1", "add numbers!", serde_json::json!({}));
        assert!(!tc.has_valid_name());
    }

    #[test]
    fn message_content_accessor() {
        let m = LlmMessage::user("hi");
        assert_eq!(m.content(), "hi");
    }
}
