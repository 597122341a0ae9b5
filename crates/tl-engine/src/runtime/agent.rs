//! The agent (spec §4.6 top level): owns lifecycle state for one context
//! and hands each turn to a [`LoopRunner`].

use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use tracing::info;

use tl_core::agent_state::{AgentState, AgentStatus};
use tl_core::error::Result;
use tl_core::event::{ContextEvent, Event, TaskStatus};
use tl_core::message::{LlmMessage, ToolDefinition};
use tl_core::plugin::{EventStream, PluginContext};
use tl_core::store::AgentStore;

use super::cancel::CancelMap;
use super::loop_runner::LoopRunner;

pub struct Agent {
    loop_runner: Arc<LoopRunner>,
    agent_store: Arc<dyn AgentStore>,
    cancel_map: Arc<CancelMap>,
}

impl Agent {
    pub fn new(loop_runner: Arc<LoopRunner>, agent_store: Arc<dyn AgentStore>, cancel_map: Arc<CancelMap>) -> Self {
        Agent { loop_runner, agent_store, cancel_map }
    }

    /// Loads (or creates) the `AgentState` for a context, verifying the
    /// shutdown, busy, and error lifecycle guards (spec §4.7/§8 invariant 10)
    /// before handing the turn to the loop runner. A rejected turn never
    /// returns a bare `Err` from this function — it returns a stream that
    /// carries a single `task-status: failed` event and then completes, so
    /// callers can treat every accepted call uniformly as an event stream.
    pub async fn handle_turn(
        &self,
        context_id: &str,
        task_id: &str,
        user_message: LlmMessage,
        tools: Vec<ToolDefinition>,
    ) -> Result<EventStream> {
        let now = Utc::now();
        let mut state = match self.agent_store.load(context_id).await? {
            Some(state) => state,
            None => AgentState::new(now),
        };

        if let Some(message) = Self::rejection_reason(&state) {
            return Ok(Self::rejected_stream(context_id, task_id, message));
        }

        state.status = AgentStatus::Busy;
        state.turn_count += 1;
        state.last_activity = now;
        self.agent_store.save(context_id, state).await?;

        info!(context_id, task_id, "starting turn");
        let cancel = self.cancel_map.register(task_id);
        let ctx = PluginContext { context_id: context_id.to_string(), task_id: task_id.to_string(), auth_context: None };
        let inner = self.loop_runner.run(ctx, user_message, tools, cancel).await?;

        let agent_store = self.agent_store.clone();
        let cancel_map = self.cancel_map.clone();
        let context_id = context_id.to_string();
        let task_id = task_id.to_string();

        Ok(Box::pin(async_stream::stream! {
            futures_util::pin_mut!(inner);
            let mut terminal = false;
            while let Some(event) = inner.next().await {
                match event.event {
                    Event::TaskStatus { status, .. } => {
                        terminal = matches!(status, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Canceled);
                    }
                    Event::TaskComplete { .. } => terminal = true,
                    _ => {}
                }
                yield event;
            }
            cancel_map.remove(&task_id);
            if terminal {
                if let Ok(Some(mut state)) = agent_store.load(&context_id).await {
                    state.status = AgentStatus::Idle;
                    state.last_activity = Utc::now();
                    let _ = agent_store.save(&context_id, state).await;
                }
            }
        }))
    }

    /// Returns the rejection message for a turn that must not start given
    /// the agent's current lifecycle state (spec §4.7): a shut-down agent
    /// never accepts new turns (invariant 10), a busy agent is already
    /// executing one (S6), and an agent left in `error` needs an explicit
    /// recovery before it can accept work again.
    fn rejection_reason(state: &AgentState) -> Option<String> {
        if !state.can_transition_out_of_shutdown() {
            return Some("agent is shut down and cannot accept new turns".to_string());
        }
        match state.status {
            AgentStatus::Busy => Some("agent is already executing a turn".to_string()),
            AgentStatus::Error => Some("agent is in an error state and cannot accept new turns".to_string()),
            _ => None,
        }
    }

    /// A single-event stream carrying `task-status: failed` for a turn that
    /// was rejected before the loop runner ever saw it (spec §4.7/§7.5/S6).
    fn rejected_stream(context_id: &str, task_id: &str, message: String) -> EventStream {
        let context_id = context_id.to_string();
        let task_id = task_id.to_string();
        Box::pin(async_stream::stream! {
            yield ContextEvent::new(
                Event::TaskStatus { status: TaskStatus::Failed, message: Some(message), timestamp: Utc::now() },
                context_id,
                task_id,
            );
        })
    }

    /// Requests cancellation of an in-flight turn; returns `false` if no
    /// turn with that `task_id` is currently registered.
    pub fn cancel(&self, task_id: &str) -> bool {
        self.cancel_map.cancel(task_id)
    }

    pub async fn shutdown(&self, context_id: &str) -> Result<()> {
        let mut state = self.agent_store.load(context_id).await?.unwrap_or_else(|| AgentState::new(Utc::now()));
        state.status = AgentStatus::Shutdown;
        state.last_activity = Utc::now();
        self.agent_store.save(context_id, state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::iteration_runner::IterationRunner;
    use crate::runtime::loop_runner::LoopConfig;
    use crate::runtime::tool_runner::ToolRunner;
    use crate::test_support::ScriptedProvider;
    use futures_util::StreamExt;
    use tl_core::event::FinishReason;
    use tl_core::store::MessageStore;
    use tl_stores::{InMemoryAgentStore, InMemoryMessageStore};

    fn build_agent(provider: Arc<ScriptedProvider>) -> Agent {
        let tool_runner = Arc::new(ToolRunner::new(vec![]));
        let iteration_runner = Arc::new(IterationRunner::new(provider, tool_runner));
        let messages: Arc<dyn MessageStore> = Arc::new(InMemoryMessageStore::new());
        let loop_runner = Arc::new(LoopRunner::new(iteration_runner, messages, LoopConfig::default()));
        let agent_store: Arc<dyn AgentStore> = Arc::new(InMemoryAgentStore::new());
        Agent::new(loop_runner, agent_store, Arc::new(CancelMap::new()))
    }

    #[tokio::test]
    async fn turn_transitions_back_to_idle_on_completion() {
        let provider = Arc::new(ScriptedProvider::single_reply("hi", FinishReason::Stop));
        let agent = build_agent(provider);

        let stream = agent.handle_turn("ctx-1", "task-1", LlmMessage::user("hello"), vec![]).await.unwrap();
        futures_util::pin_mut!(stream);
        while stream.next().await.is_some() {}

        let state = agent.agent_store.load("ctx-1").await.unwrap().unwrap();
        assert_eq!(state.status, AgentStatus::Idle);
        assert_eq!(state.turn_count, 1);
    }

    #[tokio::test]
    async fn shutdown_blocks_further_turns() {
        let provider = Arc::new(ScriptedProvider::single_reply("hi", FinishReason::Stop));
        let agent = build_agent(provider);
        agent.shutdown("ctx-1").await.unwrap();

        let stream = agent.handle_turn("ctx-1", "task-1", LlmMessage::user("hello"), vec![]).await.unwrap();
        futures_util::pin_mut!(stream);
        let mut saw_failed = false;
        while let Some(ev) = stream.next().await {
            if let Event::TaskStatus { status: TaskStatus::Failed, .. } = ev.event {
                saw_failed = true;
            }
        }
        assert!(saw_failed);

        let state = agent.agent_store.load("ctx-1").await.unwrap().unwrap();
        assert_eq!(state.status, AgentStatus::Shutdown);
    }

    #[tokio::test]
    async fn busy_agent_rejects_a_second_concurrent_turn() {
        let provider = Arc::new(ScriptedProvider::single_reply("hi", FinishReason::Stop));
        let agent = build_agent(provider);

        let mut state = agent.agent_store.load("ctx-1").await.unwrap().unwrap_or_else(|| AgentState::new(Utc::now()));
        state.status = AgentStatus::Busy;
        agent.agent_store.save("ctx-1", state).await.unwrap();

        let stream = agent.handle_turn("ctx-1", "task-2", LlmMessage::user("hello"), vec![]).await.unwrap();
        futures_util::pin_mut!(stream);
        let mut saw_failed = false;
        while let Some(ev) = stream.next().await {
            if let Event::TaskStatus { status: TaskStatus::Failed, .. } = ev.event {
                saw_failed = true;
            }
        }
        assert!(saw_failed);
    }
}
