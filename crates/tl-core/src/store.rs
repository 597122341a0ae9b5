//! External store contracts (spec §6). Concrete in-memory implementations
//! live in the `tl-stores` crate; these traits are the interface the
//! engine programs against.

use async_trait::async_trait;
use serde_json::Value;

use crate::agent_state::AgentState;
use crate::artifact::{Artifact, CreateArtifactRequest};
use crate::error::Result;
use crate::message::LlmMessage;
use crate::task_state::TaskState;

#[derive(Debug, Clone, Default)]
pub struct GetRecentOptions {
    pub max_messages: Option<usize>,
    pub max_tokens: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CompactOptions {
    pub strategy: String,
    pub keep_recent: usize,
}

/// Conversation history, keyed by `context_id`. Token budgeting is the
/// store's concern (spec §6).
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn get_all(&self, context_id: &str) -> Result<Vec<LlmMessage>>;

    async fn get_recent(&self, context_id: &str, options: GetRecentOptions) -> Result<Vec<LlmMessage>>;

    async fn append(&self, context_id: &str, messages: Vec<LlmMessage>) -> Result<()>;

    async fn compact(&self, context_id: &str, options: CompactOptions) -> Result<()>;

    async fn clear(&self, context_id: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct AppendChunkOptions {
    pub is_last_chunk: bool,
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AppendBatchOptions {
    pub is_last_batch: bool,
}

/// Artifact persistence (spec §4.8, §6). Key is `(context_id, artifact_id)`.
///
/// `get_artifact` returns `Ok(None)` for a non-existent artifact; all other
/// operations against a non-existent artifact, or through the wrong
/// accessor, return an `Err`.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn create_file_artifact(
        &self,
        req: CreateArtifactRequest,
        mime_type: String,
        encoding: String,
    ) -> Result<Artifact>;

    async fn create_data_artifact(&self, req: CreateArtifactRequest) -> Result<Artifact>;

    async fn create_dataset_artifact(
        &self,
        req: CreateArtifactRequest,
        column_schema: Option<Value>,
    ) -> Result<Artifact>;

    async fn append_file_chunk(
        &self,
        context_id: &str,
        artifact_id: &str,
        chunk: String,
        options: AppendChunkOptions,
    ) -> Result<Artifact>;

    async fn write_data(&self, context_id: &str, artifact_id: &str, data: Value) -> Result<Artifact>;

    async fn append_dataset_batch(
        &self,
        context_id: &str,
        artifact_id: &str,
        rows: Value,
        options: AppendBatchOptions,
    ) -> Result<Artifact>;

    async fn get_artifact(&self, context_id: &str, artifact_id: &str) -> Result<Option<Artifact>>;

    async fn list_artifacts(&self, context_id: &str) -> Result<Vec<Artifact>>;

    async fn get_file_content(&self, context_id: &str, artifact_id: &str) -> Result<String>;

    async fn get_data_content(&self, context_id: &str, artifact_id: &str) -> Result<Value>;

    async fn get_dataset_rows(&self, context_id: &str, artifact_id: &str) -> Result<Vec<Value>>;

    /// Removes all artifacts scoped to the given context (used by cleanup).
    async fn delete_context(&self, context_id: &str) -> Result<()>;
}

/// Per-agent persisted lifecycle state (spec §6 `AgentStore`).
#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn load(&self, context_id: &str) -> Result<Option<AgentState>>;

    async fn save(&self, context_id: &str, state: AgentState) -> Result<()>;

    async fn delete(&self, context_id: &str) -> Result<()>;
}

/// Loop-checkpoint persistence, used by the cleanup service's TTL sweep.
#[async_trait]
pub trait TaskStateStore: Send + Sync {
    async fn save(&self, state: TaskState) -> Result<()>;

    async fn get(&self, task_id: &str) -> Result<Option<TaskState>>;

    async fn list_expired(&self, ttl: chrono::Duration, now: chrono::DateTime<chrono::Utc>) -> Result<Vec<TaskState>>;

    async fn delete(&self, task_id: &str) -> Result<()>;
}
