//! LLM provider contract (spec §6). The concrete HTTP streaming adapter is
//! an external collaborator (spec §1) — only the trait and request shape
//! live here; a scripted/mock implementation lives with the tests and CLI.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::Result;
use crate::message::{LlmMessage, ToolDefinition};

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<LlmMessage>,
    pub tools: Vec<ToolDefinition>,
    pub stream: bool,
    pub session_id: String,
}

pub type EventStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// `call({messages, tools, stream: true, sessionId}) -> stream<Event>`.
///
/// The provider MUST emit, in order: zero or more `content-delta` (with
/// monotone `index` starting at 0), at most one `content-complete`. It MAY
/// also emit `llm-usage` (any position) and `thought-stream` (interleaved
/// with deltas).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn call(&self, request: ChatRequest) -> Result<EventStream<crate::event::Event>>;
}
