//! In-memory [`AgentStore`], one [`AgentState`] per context.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use tl_core::agent_state::AgentState;
use tl_core::error::Result;
use tl_core::store::AgentStore;

#[derive(Default)]
pub struct InMemoryAgentStore {
    inner: RwLock<HashMap<String, AgentState>>,
}

impl InMemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentStore for InMemoryAgentStore {
    async fn load(&self, context_id: &str) -> Result<Option<AgentState>> {
        Ok(self.inner.read().get(context_id).cloned())
    }

    async fn save(&self, context_id: &str, state: AgentState) -> Result<()> {
        self.inner.write().insert(context_id.to_string(), state);
        Ok(())
    }

    async fn delete(&self, context_id: &str) -> Result<()> {
        self.inner.write().remove(context_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn save_then_load_round_trip() {
        let store = InMemoryAgentStore::new();
        store.save("ctx-1", AgentState::new(Utc::now())).await.unwrap();
        let loaded = store.load("ctx-1").await.unwrap();
        assert!(loaded.is_some());
    }

    #[tokio::test]
    async fn load_missing_context_returns_none() {
        let store = InMemoryAgentStore::new();
        assert!(store.load("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_state() {
        let store = InMemoryAgentStore::new();
        store.save("ctx-1", AgentState::new(Utc::now())).await.unwrap();
        store.delete("ctx-1").await.unwrap();
        assert!(store.load("ctx-1").await.unwrap().is_none());
    }
}
