//! Scripted [`LlmProvider`] and [`ToolPlugin`] fixtures shared by this
//! crate's unit tests and its `tests/` integration suite.
//!
//! Kept as a regular (non-`cfg(test)`) module so integration tests, which
//! compile against the crate as an external dependency, can reach it too.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use tl_core::error::Result;
use tl_core::event::{Event, FinishReason};
use tl_core::message::ToolCall;
use tl_core::provider::{ChatRequest, EventStream, LlmProvider};

/// One scripted turn: either a plain reply or a reply carrying tool calls.
#[derive(Clone)]
pub struct ScriptedTurn {
    pub content: String,
    pub finish_reason: FinishReason,
    pub tool_calls: Vec<ToolCall>,
}

/// A provider that replays a fixed script of turns, one per `call()`
/// invocation, then repeats its last turn forever (so a buggy loop that
/// keeps calling past the script's end doesn't panic — it just never
/// terminates itself, which the iteration cap is there to catch).
pub struct ScriptedProvider {
    turns: Vec<ScriptedTurn>,
    cursor: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        assert!(!turns.is_empty(), "ScriptedProvider needs at least one turn");
        ScriptedProvider { turns, cursor: AtomicUsize::new(0) }
    }

    pub fn single_reply(content: impl Into<String>, finish_reason: FinishReason) -> Self {
        Self::new(vec![ScriptedTurn { content: content.into(), finish_reason, tool_calls: Vec::new() }])
    }

    pub fn single_reply_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::new(vec![ScriptedTurn { content: content.into(), finish_reason: FinishReason::ToolCalls, tool_calls }])
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn call(&self, _request: ChatRequest) -> Result<EventStream<Event>> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst).min(self.turns.len() - 1);
        let turn = self.turns[index].clone();
        let events = vec![
            Event::ContentDelta { index: 0, text: turn.content.clone(), timestamp: Utc::now() },
            Event::ContentComplete {
                content: turn.content,
                finish_reason: turn.finish_reason,
                tool_calls: turn.tool_calls,
                timestamp: Utc::now(),
            },
        ];
        Ok(Box::pin(tokio_stream::iter(events)))
    }
}

/// A provider whose every call fails, for exercising provider-error paths.
pub struct FailingProvider;

#[async_trait]
impl LlmProvider for FailingProvider {
    async fn call(&self, _request: ChatRequest) -> Result<EventStream<Event>> {
        Err(tl_core::error::Error::Provider("scripted provider failure".to_string()))
    }
}

pub fn arc_scripted(turns: Vec<ScriptedTurn>) -> Arc<dyn LlmProvider> {
    Arc::new(ScriptedProvider::new(turns))
}
