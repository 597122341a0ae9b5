//! One iteration (spec §4.5): a single LLM call, followed by dispatching
//! whatever tool calls that call's terminal `content-complete` carried.
//!
//! The loop runner decides whether another iteration is warranted; an
//! iteration never loops on its own.

use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::Mutex;
use tracing::info_span;

use tl_core::error::Result;
use tl_core::event::{ContextEvent, Event, FinishReason};
use tl_core::message::{LlmMessage, ToolDefinition};
use tl_core::plugin::{EventStream, PluginContext};
use tl_core::provider::{ChatRequest, LlmProvider};

use super::tool_runner::ToolRunner;

/// Accumulates the facts the loop runner needs once an iteration's stream
/// has been fully drained: the messages to append to history, and whether
/// the turn is done.
#[derive(Debug, Clone, Default)]
pub struct IterationOutcome {
    pub new_messages: Vec<LlmMessage>,
    pub finish_reason: Option<FinishReason>,
    pub had_tool_calls: bool,
}

pub struct IterationRunner {
    provider: Arc<dyn LlmProvider>,
    tool_runner: Arc<ToolRunner>,
}

impl IterationRunner {
    pub fn new(provider: Arc<dyn LlmProvider>, tool_runner: Arc<ToolRunner>) -> Self {
        IterationRunner { provider, tool_runner }
    }

    /// Runs one iteration, writing into `outcome` as the stream is driven.
    /// The caller must fully drain the returned stream before reading
    /// `outcome` — it is only complete once the stream ends.
    pub async fn run(
        &self,
        ctx: PluginContext,
        history: Vec<LlmMessage>,
        tools: Vec<ToolDefinition>,
        outcome: Arc<Mutex<IterationOutcome>>,
    ) -> Result<EventStream> {
        let span = info_span!("llm.call", context_id = %ctx.context_id, task_id = %ctx.task_id);
        let _enter = span.enter();

        let request = ChatRequest { messages: history, tools, stream: true, session_id: ctx.context_id.clone() };
        let provider_stream = self.provider.call(request).await?;
        let tool_runner = self.tool_runner.clone();
        let context_id = ctx.context_id.clone();
        let task_id = ctx.task_id.clone();

        Ok(Box::pin(async_stream::stream! {
            futures_util::pin_mut!(provider_stream);
            let mut pending_tool_calls = Vec::new();

            while let Some(event) = provider_stream.next().await {
                if let Event::ContentComplete { ref content, finish_reason, ref tool_calls, .. } = event {
                    let mut guard = outcome.lock();
                    guard.finish_reason = Some(finish_reason);
                    guard.had_tool_calls = !tool_calls.is_empty();
                    guard.new_messages.push(LlmMessage::assistant_with_tool_calls(content.clone(), tool_calls.clone()));
                    pending_tool_calls = tool_calls.clone();
                }
                yield ContextEvent::new(event, context_id.clone(), task_id.clone());
            }

            for call in pending_tool_calls {
                yield ContextEvent::new(
                    Event::ToolCallEvent { tool_call: call.clone(), timestamp: chrono::Utc::now() },
                    context_id.clone(),
                    task_id.clone(),
                );

                let dispatch_ctx = PluginContext { context_id: context_id.clone(), task_id: task_id.clone(), auth_context: ctx.auth_context.clone() };
                let tool_stream = tool_runner.dispatch(call.clone(), &dispatch_ctx).await;
                futures_util::pin_mut!(tool_stream);
                while let Some(tool_event) = tool_stream.next().await {
                    if let Some((tool_call_id, tool_name, success)) = tool_event.event.as_tool_complete() {
                        let content = match &tool_event.event {
                            Event::ToolComplete { result: Some(result), .. } => result.to_string(),
                            Event::ToolComplete { error: Some(error), .. } => error.clone(),
                            Event::ToolComplete { success: true, .. } => "Success".to_string(),
                            _ => "Error executing tool".to_string(),
                        };
                        let _ = success;
                        outcome.lock().new_messages.push(LlmMessage::tool_result(tool_call_id, tool_name, content));
                    }
                    // An unresolved tool id re-emits the original `tool-call`
                    // event with no `tool-complete` (spec §4.4 step 2); there
                    // is nothing to fold into history for it.
                    yield tool_event;
                }
            }
        }))
    }
}
