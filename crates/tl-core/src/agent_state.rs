//! Per-context agent lifecycle state (spec §3 `AgentState`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Created,
    Idle,
    Busy,
    Shutdown,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub status: AgentStatus,
    pub turn_count: u64,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl AgentState {
    pub fn new(now: DateTime<Utc>) -> Self {
        AgentState {
            status: AgentStatus::Created,
            turn_count: 0,
            last_activity: now,
            created_at: now,
            error: None,
            metadata: None,
        }
    }

    /// `shutdown` is terminal: no transition is permitted out of it
    /// (spec §8 invariant 10).
    pub fn can_transition_out_of_shutdown(&self) -> bool {
        self.status != AgentStatus::Shutdown
    }
}
