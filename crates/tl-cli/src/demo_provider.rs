//! A tiny scripted stand-in for a real LLM backend, used only by the CLI
//! demo (spec §1: real provider adapters are out of scope).
//!
//! If the latest user message contains `"weather"`, the demo asks the
//! `get_weather` local tool for a second iteration; otherwise it just
//! echoes the message back and stops.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use tl_core::error::Result;
use tl_core::event::{Event, FinishReason};
use tl_core::message::{LlmMessage, ToolCall};
use tl_core::provider::{ChatRequest, EventStream, LlmProvider};

pub struct DemoProvider;

#[async_trait]
impl LlmProvider for DemoProvider {
    async fn call(&self, request: ChatRequest) -> Result<EventStream<Event>> {
        let just_ran_tool = matches!(request.messages.last(), Some(LlmMessage::Tool { .. }));

        let (content, finish_reason, tool_calls) = if just_ran_tool {
            let weather = request.messages.last().map(LlmMessage::content).unwrap_or_default();
            (format!("Here's what I found: {weather}"), FinishReason::Stop, Vec::new())
        } else {
            let last_user = request
                .messages
                .iter()
                .rev()
                .find_map(|m| matches!(m, LlmMessage::User { .. }).then(|| m.content().to_string()))
                .unwrap_or_default();

            if last_user.to_lowercase().contains("weather") {
                let call = ToolCall::new(
                    format!("call-{}", request.messages.len()),
                    "get_weather",
                    json!({ "query": last_user }),
                );
                (String::new(), FinishReason::ToolCalls, vec![call])
            } else {
                (format!("You said: {last_user}"), FinishReason::Stop, Vec::new())
            }
        };

        let events = vec![
            Event::ContentDelta { index: 0, text: content.clone(), timestamp: Utc::now() },
            Event::ContentComplete { content, finish_reason, tool_calls, timestamp: Utc::now() },
        ];
        Ok(Box::pin(tokio_stream::iter(events)))
    }
}
