//! Reference [`ToolPlugin`] for locally-implemented tools (spec §4.2, §4.9).
//!
//! Each registered [`LocalTool`] validates its arguments against a declared
//! JSON Schema before the handler ever runs; a schema failure becomes a
//! `tool-complete { success: false }` event rather than a panic or a
//! rejected call, since malformed arguments are a normal, reportable outcome
//! (spec §4.4 edge case).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::BoxFuture;
use jsonschema::JSONSchema;
use serde_json::Value;

use tl_core::error::{Error, Result};
use tl_core::event::Event;
use tl_core::message::{ToolCall, ToolDefinition};
use tl_core::plugin::{EventStream, LocalToolOutcome, PluginContext, ToolPlugin};

type Handler = Box<dyn Fn(Value) -> BoxFuture<'static, LocalToolOutcome> + Send + Sync>;

pub struct LocalTool {
    definition: ToolDefinition,
    schema: JSONSchema,
    handler: Handler,
}

impl LocalTool {
    /// `parameters` must be a valid JSON Schema document; an invalid one is
    /// a programmer error (tool registration happens at startup, not per
    /// call), so this panics rather than threading a `Result` through every
    /// call site that builds a local tool set.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: impl Fn(Value) -> BoxFuture<'static, LocalToolOutcome> + Send + Sync + 'static,
    ) -> Self {
        let schema = JSONSchema::compile(&parameters).expect("local tool parameters must be a valid JSON Schema");
        LocalTool {
            definition: ToolDefinition { id: id.into(), description: description.into(), icon: None, parameters },
            schema,
            handler: Box::new(handler),
        }
    }
}

#[derive(Default)]
pub struct LocalToolPlugin {
    tools: HashMap<String, LocalTool>,
}

impl LocalToolPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, tool: LocalTool) -> Self {
        self.tools.insert(tool.definition.id.clone(), tool);
        self
    }
}

#[async_trait]
impl ToolPlugin for LocalToolPlugin {
    fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    async fn execute_tool(&self, call: &ToolCall, _ctx: &PluginContext) -> Result<EventStream> {
        let Some(tool) = self.tools.get(call.name()) else {
            return Err(Error::ToolNotFound(call.name().to_string()));
        };

        let tool_call_id = call.id.clone();
        let tool_name = call.name().to_string();
        let arguments = call.function.arguments.clone();

        let validation = tool.schema.validate(&arguments);
        let outcome = match validation {
            Err(errors) => {
                let message = errors.map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
                LocalToolOutcome::err(format!("invalid arguments: {message}"))
            }
            Ok(()) => (tool.handler)(arguments).await,
        };

        Ok(Box::pin(async_stream::stream! {
            let timestamp = Utc::now();
            for message in &outcome.messages {
                yield tl_core::event::ContextEvent::new(
                    Event::InternalToolMessage { message: message.clone(), timestamp },
                    String::new(),
                    String::new(),
                );
            }
            yield tl_core::event::ContextEvent::new(
                Event::ToolComplete {
                    tool_call_id,
                    tool_name,
                    success: outcome.success,
                    result: outcome.result,
                    error: outcome.error,
                    timestamp,
                },
                String::new(),
                String::new(),
            );
        }))
    }
}
