//! The loop (spec §4.6): repeated iterations against one conversation until
//! a terminal `content-complete`, cancellation, or the iteration cap.

use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tracing::{info_span, warn};

use tl_core::error::Result;
use tl_core::event::{ContextEvent, Event, FinishReason, TaskStatus};
use tl_core::message::{LlmMessage, ToolDefinition};
use tl_core::plugin::{EventStream, PluginContext};
use tl_core::store::MessageStore;

use super::cancel::CancelToken;
use super::iteration_runner::{IterationOutcome, IterationRunner};

#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    pub max_iterations: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig { max_iterations: 25 }
    }
}

pub struct LoopRunner {
    iteration_runner: Arc<IterationRunner>,
    messages: Arc<dyn MessageStore>,
    config: LoopConfig,
}

impl LoopRunner {
    pub fn new(iteration_runner: Arc<IterationRunner>, messages: Arc<dyn MessageStore>, config: LoopConfig) -> Self {
        LoopRunner { iteration_runner, messages, config }
    }

    pub async fn run(
        &self,
        ctx: PluginContext,
        user_message: LlmMessage,
        tools: Vec<ToolDefinition>,
        cancel: CancelToken,
    ) -> Result<EventStream> {
        let history_length = self.messages.get_all(&ctx.context_id).await?.len();
        self.messages.append(&ctx.context_id, vec![user_message]).await?;

        let span = info_span!("turn", context_id = %ctx.context_id, task_id = %ctx.task_id);
        let _enter = span.enter();

        let iteration_runner = self.iteration_runner.clone();
        let message_store = self.messages.clone();
        let max_iterations = self.config.max_iterations;
        let context_id = ctx.context_id.clone();
        let task_id = ctx.task_id.clone();

        Ok(Box::pin(async_stream::stream! {
            yield ContextEvent::new(
                Event::TaskCreated {
                    task_id: task_id.clone(),
                    initiator: "user".to_string(),
                    parent_task_id: None,
                    metadata: serde_json::json!({ "historyLength": history_length }),
                    timestamp: Utc::now(),
                },
                context_id.clone(),
                task_id.clone(),
            );

            yield ContextEvent::new(
                Event::TaskStatus { status: TaskStatus::Working, message: None, timestamp: Utc::now() },
                context_id.clone(),
                task_id.clone(),
            );

            let mut last_assistant_content = String::new();
            let mut stopped = false;

            for iteration in 0..max_iterations {
                if cancel.is_cancelled() {
                    yield ContextEvent::new(
                        Event::TaskStatus { status: TaskStatus::Canceled, message: Some("cancelled between iterations".into()), timestamp: Utc::now() },
                        context_id.clone(),
                        task_id.clone(),
                    );
                    stopped = true;
                    break;
                }

                let history = match message_store.get_all(&context_id).await {
                    Ok(history) => history,
                    Err(err) => {
                        warn!(error = %err, "failed to load history for iteration");
                        yield ContextEvent::new(
                            Event::TaskStatus { status: TaskStatus::Failed, message: Some(err.to_string()), timestamp: Utc::now() },
                            context_id.clone(),
                            task_id.clone(),
                        );
                        stopped = true;
                        break;
                    }
                };

                let outcome = Arc::new(Mutex::new(IterationOutcome::default()));
                let iter_ctx = PluginContext { context_id: context_id.clone(), task_id: task_id.clone(), auth_context: ctx.auth_context.clone() };

                let iteration_stream = match iteration_runner.run(iter_ctx, history, tools.clone(), outcome.clone()).await {
                    Ok(stream) => stream,
                    Err(err) => {
                        yield ContextEvent::new(
                            Event::TaskStatus { status: TaskStatus::Failed, message: Some(err.to_string()), timestamp: Utc::now() },
                            context_id.clone(),
                            task_id.clone(),
                        );
                        stopped = true;
                        break;
                    }
                };

                futures_util::pin_mut!(iteration_stream);
                while let Some(event) = iteration_stream.next().await {
                    if let Event::ContentComplete { ref content, .. } = event.event {
                        last_assistant_content = content.clone();
                    }
                    yield event;
                }

                yield ContextEvent::new(
                    Event::InternalCheckpoint { iteration, timestamp: Utc::now() },
                    context_id.clone(),
                    task_id.clone(),
                );

                let outcome = outcome.lock().clone();
                if let Err(err) = message_store.append(&context_id, outcome.new_messages).await {
                    warn!(error = %err, "failed to persist iteration messages");
                }

                if let Some(finish_reason) = outcome.finish_reason {
                    if finish_reason != FinishReason::ToolCalls {
                        // Invariant 1 / S1: exactly one terminal event, ending
                        // with `task-complete`.
                        yield ContextEvent::new(
                            Event::TaskComplete { content: last_assistant_content.clone(), metadata: serde_json::Value::Null, timestamp: Utc::now() },
                            context_id.clone(),
                            task_id.clone(),
                        );
                        stopped = true;
                        break;
                    }
                }
            }

            if !stopped {
                yield ContextEvent::new(
                    Event::TaskStatus {
                        status: TaskStatus::Failed,
                        message: Some("max iterations reached".to_string()),
                        timestamp: Utc::now(),
                    },
                    context_id.clone(),
                    task_id.clone(),
                );
                yield ContextEvent::new(
                    Event::TaskComplete { content: String::new(), metadata: serde_json::Value::Null, timestamp: Utc::now() },
                    context_id.clone(),
                    task_id.clone(),
                );
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::tool_runner::ToolRunner;
    use crate::test_support::ScriptedProvider;
    use tl_core::event::FinishReason;
    use tl_stores::InMemoryMessageStore;

    fn ctx() -> PluginContext {
        PluginContext { context_id: "ctx-1".into(), task_id: "task-1".into(), auth_context: None }
    }

    #[tokio::test]
    async fn stops_after_one_iteration_on_stop_finish_reason() {
        let provider = Arc::new(ScriptedProvider::single_reply("done", FinishReason::Stop));
        let tool_runner = Arc::new(ToolRunner::new(vec![]));
        let iteration_runner = Arc::new(IterationRunner::new(provider, tool_runner));
        let messages: Arc<dyn MessageStore> = Arc::new(InMemoryMessageStore::new());
        let runner = LoopRunner::new(iteration_runner, messages.clone(), LoopConfig::default());

        let stream = runner
            .run(ctx(), LlmMessage::user("hi"), vec![], CancelToken::new())
            .await
            .unwrap();
        futures_util::pin_mut!(stream);
        let mut statuses = Vec::new();
        let mut saw_task_created = false;
        let mut final_content = None;
        while let Some(ev) = stream.next().await {
            match ev.event {
                Event::TaskCreated { .. } => saw_task_created = true,
                Event::TaskStatus { status, .. } => statuses.push(status),
                Event::TaskComplete { content, .. } => final_content = Some(content),
                _ => {}
            }
        }
        assert!(saw_task_created);
        assert_eq!(statuses, vec![TaskStatus::Working]);
        assert_eq!(final_content.as_deref(), Some("done"));

        let history = messages.get_all("ctx-1").await.unwrap();
        assert_eq!(history.len(), 2); // user + assistant
    }

    #[tokio::test]
    async fn cancellation_between_iterations_stops_the_loop() {
        let call = tl_core::message::ToolCall::new("c1", "noop", serde_json::json!({}));
        let provider = Arc::new(ScriptedProvider::single_reply_with_tool_calls("", vec![call]));
        let tool_runner = Arc::new(ToolRunner::new(vec![]));
        let iteration_runner = Arc::new(IterationRunner::new(provider, tool_runner));
        let messages: Arc<dyn MessageStore> = Arc::new(InMemoryMessageStore::new());
        let runner = LoopRunner::new(iteration_runner, messages, LoopConfig { max_iterations: 5 });

        let cancel = CancelToken::new();
        cancel.cancel();
        let stream = runner.run(ctx(), LlmMessage::user("hi"), vec![], cancel).await.unwrap();
        futures_util::pin_mut!(stream);
        let mut statuses = Vec::new();
        while let Some(ev) = stream.next().await {
            if let Event::TaskStatus { status, .. } = ev.event {
                statuses.push(status);
            }
        }
        assert_eq!(statuses, vec![TaskStatus::Working, TaskStatus::Canceled]);
    }
}
