//! In-memory [`MessageStore`](tl_core::MessageStore), keyed by context id.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use tl_core::error::Result;
use tl_core::message::LlmMessage;
use tl_core::store::{CompactOptions, GetRecentOptions, MessageStore};

/// Rough per-role token cost used for the `max_tokens` budget — a
/// placeholder heuristic (4 characters per token), since real tokenisation
/// is explicitly out of scope (spec §1 Non-goals).
fn approx_tokens(message: &LlmMessage) -> u64 {
    (message.content().len() as u64 / 4).max(1)
}

#[derive(Default)]
pub struct InMemoryMessageStore {
    inner: RwLock<HashMap<String, Vec<LlmMessage>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn get_all(&self, context_id: &str) -> Result<Vec<LlmMessage>> {
        Ok(self.inner.read().get(context_id).cloned().unwrap_or_default())
    }

    async fn get_recent(&self, context_id: &str, options: GetRecentOptions) -> Result<Vec<LlmMessage>> {
        let all = self.inner.read().get(context_id).cloned().unwrap_or_default();

        let windowed: Vec<LlmMessage> = match options.max_messages {
            Some(n) if n < all.len() => all[all.len() - n..].to_vec(),
            _ => all,
        };

        let Some(budget) = options.max_tokens else {
            return Ok(windowed);
        };

        // Trim-to-budget from the most recent message backward.
        let mut kept: Vec<LlmMessage> = Vec::new();
        let mut used = 0u64;
        for message in windowed.into_iter().rev() {
            let cost = approx_tokens(&message);
            if used + cost > budget && !kept.is_empty() {
                break;
            }
            used += cost;
            kept.push(message);
        }
        kept.reverse();
        Ok(kept)
    }

    async fn append(&self, context_id: &str, messages: Vec<LlmMessage>) -> Result<()> {
        self.inner.write().entry(context_id.to_string()).or_default().extend(messages);
        Ok(())
    }

    async fn compact(&self, context_id: &str, options: CompactOptions) -> Result<()> {
        let mut guard = self.inner.write();
        let Some(history) = guard.get_mut(context_id) else {
            return Ok(());
        };
        if history.len() <= options.keep_recent {
            return Ok(());
        }
        let split_at = history.len() - options.keep_recent;
        let dropped = split_at;
        let summary = LlmMessage::system(format!(
            "[{} summary of {dropped} earlier messages]",
            options.strategy
        ));
        let recent = history.split_off(split_at);
        *history = std::iter::once(summary).chain(recent).collect();
        Ok(())
    }

    async fn clear(&self, context_id: &str) -> Result<()> {
        self.inner.write().remove(context_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_and_get_all_round_trip() {
        let store = InMemoryMessageStore::new();
        store.append("ctx", vec![LlmMessage::user("hi")]).await.unwrap();
        store.append("ctx", vec![LlmMessage::assistant("hello")]).await.unwrap();
        let all = store.get_all("ctx").await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn get_recent_respects_max_messages() {
        let store = InMemoryMessageStore::new();
        for i in 0..5 {
            store.append("ctx", vec![LlmMessage::user(format!("m{i}"))]).await.unwrap();
        }
        let recent = store
            .get_recent("ctx", GetRecentOptions { max_messages: Some(2), max_tokens: None })
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content(), "m3");
        assert_eq!(recent[1].content(), "m4");
    }

    #[tokio::test]
    async fn compact_prepends_summary_and_keeps_recent() {
        let store = InMemoryMessageStore::new();
        for i in 0..10 {
            store.append("ctx", vec![LlmMessage::user(format!("m{i}"))]).await.unwrap();
        }
        store
            .compact("ctx", CompactOptions { strategy: "summarization".into(), keep_recent: 3 })
            .await
            .unwrap();
        let all = store.get_all("ctx").await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[1].content(), "m7");
    }

    #[tokio::test]
    async fn clear_removes_context() {
        let store = InMemoryMessageStore::new();
        store.append("ctx", vec![LlmMessage::user("hi")]).await.unwrap();
        store.clear("ctx").await.unwrap();
        assert!(store.get_all("ctx").await.unwrap().is_empty());
    }
}
