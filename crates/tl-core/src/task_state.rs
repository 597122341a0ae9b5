//! Loop checkpoint state, sufficient for the cleanup service to know what's
//! expired (spec §3 `TaskState`, §5 cleanup sweep).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub task_id: String,
    pub context_id: String,
    pub iteration: u32,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskState {
    pub fn new(task_id: impl Into<String>, context_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        TaskState {
            task_id: task_id.into(),
            context_id: context_id.into(),
            iteration: 0,
            completed: false,
            created_at: now,
            completed_at: None,
        }
    }

    /// Expired once `completed_at + ttl` has elapsed. A task that never
    /// completed is never eligible (a running turn is never cancelled by
    /// cleanup, spec §5).
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match self.completed_at {
            Some(completed_at) => now - completed_at >= ttl,
            None => false,
        }
    }
}
