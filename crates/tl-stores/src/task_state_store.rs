//! In-memory [`TaskStateStore`], the substrate the cleanup sweep reads from.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use tl_core::error::Result;
use tl_core::store::TaskStateStore;
use tl_core::task_state::TaskState;

#[derive(Default)]
pub struct InMemoryTaskStateStore {
    inner: RwLock<HashMap<String, TaskState>>,
}

impl InMemoryTaskStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStateStore for InMemoryTaskStateStore {
    async fn save(&self, state: TaskState) -> Result<()> {
        self.inner.write().insert(state.task_id.clone(), state);
        Ok(())
    }

    async fn get(&self, task_id: &str) -> Result<Option<TaskState>> {
        Ok(self.inner.read().get(task_id).cloned())
    }

    async fn list_expired(&self, ttl: Duration, now: DateTime<Utc>) -> Result<Vec<TaskState>> {
        Ok(self
            .inner
            .read()
            .values()
            .filter(|s| s.is_expired(ttl, now))
            .cloned()
            .collect())
    }

    async fn delete(&self, task_id: &str) -> Result<()> {
        self.inner.write().remove(task_id);
        Ok(())
    }
}
