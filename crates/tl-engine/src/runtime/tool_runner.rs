//! Tool dispatch (spec §4.4): resolves a [`ToolCall`] to the plugin that
//! declared it and turns the plugin's own event stream into a
//! `tool-start` + `<plugin events>` + (guaranteed) `tool-complete` sequence.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures_util::StreamExt;
use tracing::{info_span, Instrument};

use tl_core::error::{Error, Result};
use tl_core::event::{ContextEvent, Event};
use tl_core::message::ToolCall;
use tl_core::plugin::{EventStream, PluginContext, ToolPlugin};

/// Per-call bookkeeping, recorded for tracing only — not a persisted
/// artifact (SPEC_FULL §1 "supplemented features").
#[derive(Debug, Clone)]
pub struct ToolExecutionRecord {
    pub tool_call_id: String,
    pub tool_name: String,
    pub duration_ms: u64,
    pub success: bool,
}

/// Holds registered plugins in registration order. When more than one
/// plugin declares the same tool id, the first one registered wins — spec
/// §9 Open Question, resolved in DESIGN.md.
pub struct ToolRunner {
    plugins: Vec<Arc<dyn ToolPlugin>>,
}

impl ToolRunner {
    pub fn new(plugins: Vec<Arc<dyn ToolPlugin>>) -> Self {
        ToolRunner { plugins }
    }

    fn resolve(&self, tool_id: &str) -> Option<&Arc<dyn ToolPlugin>> {
        self.plugins.iter().find(|p| p.get_tool(tool_id).is_some())
    }

    pub fn list_tool_definitions(&self) -> Vec<tl_core::message::ToolDefinition> {
        let mut seen = std::collections::HashSet::new();
        let mut defs = Vec::new();
        for plugin in &self.plugins {
            for def in plugin.list_tools() {
                if seen.insert(def.id.clone()) {
                    defs.push(def);
                }
            }
        }
        defs
    }

    /// Dispatches one tool call, yielding `tool-start`, then the plugin's
    /// own events (stamped with context/task and a `tool:<name>` path
    /// segment), then `tool-complete` — synthesizing a failing
    /// `tool-complete` if the call can't be dispatched or the plugin's
    /// stream never produced one (spec §4.4 edge case).
    pub async fn dispatch(&self, call: ToolCall, ctx: &PluginContext) -> EventStream {
        let span = info_span!("tool.call", tool_call_id = %call.id, tool_name = %call.name());
        self.dispatch_inner(call, ctx).instrument(span).await
    }

    async fn dispatch_inner(&self, call: ToolCall, ctx: &PluginContext) -> EventStream {
        let started = Instant::now();
        let tool_call_id = call.id.clone();
        let tool_name = call.name().to_string();

        if !call.has_valid_name() {
            return Self::failed_stream(ctx, tool_call_id, tool_name, "invalid tool call name".to_string());
        }

        let Some(plugin) = self.resolve(call.name()).cloned() else {
            return Self::unresolved_stream(ctx, call);
        };

        let inner = match plugin.execute_tool(&call, ctx).await {
            Ok(stream) => stream,
            Err(err) => return Self::failed_stream(ctx, tool_call_id, tool_name, err.to_string()),
        };

        let context_id = ctx.context_id.clone();
        let task_id = ctx.task_id.clone();
        let start_event = ContextEvent::new(
            Event::ToolStart { tool_call_id: tool_call_id.clone(), tool_name: tool_name.clone(), icon: None, timestamp: Utc::now() },
            context_id.clone(),
            task_id.clone(),
        );

        let stamped = inner.map(move |ce| {
            ContextEvent {
                context_id: context_id.clone(),
                task_id: task_id.clone(),
                ..ce
            }
            .with_path_prefix(format!("tool:{tool_name}"))
        });

        let mut saw_complete = false;
        let mut success = false;
        let tail_ctx = (ctx.context_id.clone(), ctx.task_id.clone());
        let tool_name_for_tail = call.name().to_string();
        let tool_call_id_for_tail = tool_call_id.clone();

        Box::pin(async_stream::stream! {
            yield start_event;
            futures_util::pin_mut!(stamped);
            while let Some(event) = stamped.next().await {
                if let Some((_, _, ok)) = event.event.as_tool_complete() {
                    saw_complete = true;
                    success = ok;
                }
                yield event;
            }
            if !saw_complete {
                yield ContextEvent::new(
                    Event::ToolComplete {
                        tool_call_id: tool_call_id_for_tail.clone(),
                        tool_name: tool_name_for_tail.clone(),
                        success: false,
                        result: None,
                        error: Some("tool stream ended without a tool-complete event".to_string()),
                        timestamp: Utc::now(),
                    },
                    tail_ctx.0,
                    tail_ctx.1,
                );
            }
            let record = ToolExecutionRecord {
                tool_call_id: tool_call_id_for_tail,
                tool_name: tool_name_for_tail,
                duration_ms: started.elapsed().as_millis() as u64,
                success,
            };
            tracing::debug!(tool_call_id = %record.tool_call_id, tool_name = %record.tool_name, duration_ms = record.duration_ms, success = record.success, "tool call finished");
        })
    }

    /// An unresolved tool id (spec §4.4 step 2, §7 NotFound) re-emits the
    /// original `tool-call` event unchanged and stops — no `tool-start`/
    /// `tool-complete` is synthesized, so an upstream consumer can decide
    /// how to handle a call nothing declared, instead of a bogus "no plugin
    /// declares tool" result getting folded into history.
    fn unresolved_stream(ctx: &PluginContext, call: ToolCall) -> EventStream {
        let context_id = ctx.context_id.clone();
        let task_id = ctx.task_id.clone();
        Box::pin(async_stream::stream! {
            yield ContextEvent::new(
                Event::ToolCallEvent { tool_call: call, timestamp: Utc::now() },
                context_id,
                task_id,
            );
        })
    }

    fn failed_stream(ctx: &PluginContext, tool_call_id: String, tool_name: String, error: String) -> EventStream {
        let context_id = ctx.context_id.clone();
        let task_id = ctx.task_id.clone();
        Box::pin(async_stream::stream! {
            yield ContextEvent::new(
                Event::ToolStart { tool_call_id: tool_call_id.clone(), tool_name: tool_name.clone(), icon: None, timestamp: Utc::now() },
                context_id.clone(),
                task_id.clone(),
            );
            yield ContextEvent::new(
                Event::ToolComplete { tool_call_id, tool_name, success: false, result: None, error: Some(error), timestamp: Utc::now() },
                context_id,
                task_id,
            );
        })
    }

    /// Convenience used by `ErrorNotFound` callers that want a `Result`
    /// instead of a synthesized failure event (e.g. a caller validating a
    /// tool id before scheduling a call at all).
    pub fn require(&self, tool_id: &str) -> Result<()> {
        if self.resolve(tool_id).is_some() {
            Ok(())
        } else {
            Err(Error::ToolNotFound(tool_id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::local_tools::{LocalTool, LocalToolPlugin};
    use futures_util::future::BoxFuture;
    use serde_json::json;
    use tl_core::plugin::LocalToolOutcome;

    fn echo_plugin() -> Arc<dyn ToolPlugin> {
        let tool = LocalTool::new(
            "echo",
            "echoes",
            json!({ "type": "object" }),
            |args: serde_json::Value| -> BoxFuture<'static, LocalToolOutcome> {
                Box::pin(async move { LocalToolOutcome::ok(args) })
            },
        );
        Arc::new(LocalToolPlugin::new().register(tool))
    }

    fn ctx() -> PluginContext {
        PluginContext { context_id: "ctx-1".into(), task_id: "task-1".into(), auth_context: None }
    }

    #[tokio::test]
    async fn dispatch_yields_start_then_complete() {
        let runner = ToolRunner::new(vec![echo_plugin()]);
        let call = ToolCall::new("c1", "echo", json!({}));
        let mut stream = runner.dispatch(call, &ctx()).await;
        let first = stream.next().await.unwrap();
        assert!(matches!(first.event, Event::ToolStart { .. }));
        let second = stream.next().await.unwrap();
        assert!(matches!(second.event, Event::ToolComplete { success: true, .. }));
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_reemits_the_original_call_and_stops() {
        let runner = ToolRunner::new(vec![echo_plugin()]);
        let call = ToolCall::new("c1", "does-not-exist", json!({}));
        let mut stream = runner.dispatch(call, &ctx()).await;
        let first = stream.next().await.unwrap();
        assert!(matches!(first.event, Event::ToolCallEvent { ref tool_call, .. } if tool_call.id == "c1"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn events_carry_a_tool_path_segment() {
        let runner = ToolRunner::new(vec![echo_plugin()]);
        let call = ToolCall::new("c1", "echo", json!({}));
        let mut stream = runner.dispatch(call, &ctx()).await;
        let _start = stream.next().await.unwrap();
        let complete = stream.next().await.unwrap();
        assert_eq!(complete.path, vec!["tool:echo"]);
    }
}
