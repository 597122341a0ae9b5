//! Artifact scheduler (spec §4.3): serial per-`(context_id, artifact_id)`,
//! parallel across keys.
//!
//! Wraps any [`ArtifactStore`] and funnels each mutating call through a
//! lazily-created `tokio::sync::Mutex` keyed by `(context_id, artifact_id)`.
//! Tokio's mutex queues waiters FIFO, so two calls racing for the same key
//! execute in submission order; calls against different keys never block
//! each other.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use tl_core::artifact::{Artifact, CreateArtifactRequest};
use tl_core::error::Result;
use tl_core::store::{AppendBatchOptions, AppendChunkOptions, ArtifactStore};

type Key = (String, String);

pub struct ArtifactScheduler<S> {
    inner: S,
    locks: SyncMutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

impl<S: ArtifactStore> ArtifactScheduler<S> {
    pub fn new(inner: S) -> Self {
        ArtifactScheduler { inner, locks: SyncMutex::new(HashMap::new()) }
    }

    fn lane(&self, context_id: &str, artifact_id: &str) -> Arc<AsyncMutex<()>> {
        let key = (context_id.to_string(), artifact_id.to_string());
        self.locks.lock().entry(key).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: ArtifactStore> ArtifactStore for ArtifactScheduler<S> {
    async fn create_file_artifact(
        &self,
        req: CreateArtifactRequest,
        mime_type: String,
        encoding: String,
    ) -> Result<Artifact> {
        let lane = self.lane(&req.context_id, &req.artifact_id);
        let _guard = lane.lock().await;
        self.inner.create_file_artifact(req, mime_type, encoding).await
    }

    async fn create_data_artifact(&self, req: CreateArtifactRequest) -> Result<Artifact> {
        let lane = self.lane(&req.context_id, &req.artifact_id);
        let _guard = lane.lock().await;
        self.inner.create_data_artifact(req).await
    }

    async fn create_dataset_artifact(
        &self,
        req: CreateArtifactRequest,
        column_schema: Option<Value>,
    ) -> Result<Artifact> {
        let lane = self.lane(&req.context_id, &req.artifact_id);
        let _guard = lane.lock().await;
        self.inner.create_dataset_artifact(req, column_schema).await
    }

    async fn append_file_chunk(
        &self,
        context_id: &str,
        artifact_id: &str,
        chunk: String,
        options: AppendChunkOptions,
    ) -> Result<Artifact> {
        let lane = self.lane(context_id, artifact_id);
        let _guard = lane.lock().await;
        self.inner.append_file_chunk(context_id, artifact_id, chunk, options).await
    }

    async fn write_data(&self, context_id: &str, artifact_id: &str, data: Value) -> Result<Artifact> {
        let lane = self.lane(context_id, artifact_id);
        let _guard = lane.lock().await;
        self.inner.write_data(context_id, artifact_id, data).await
    }

    async fn append_dataset_batch(
        &self,
        context_id: &str,
        artifact_id: &str,
        rows: Value,
        options: AppendBatchOptions,
    ) -> Result<Artifact> {
        let lane = self.lane(context_id, artifact_id);
        let _guard = lane.lock().await;
        self.inner.append_dataset_batch(context_id, artifact_id, rows, options).await
    }

    async fn get_artifact(&self, context_id: &str, artifact_id: &str) -> Result<Option<Artifact>> {
        self.inner.get_artifact(context_id, artifact_id).await
    }

    async fn list_artifacts(&self, context_id: &str) -> Result<Vec<Artifact>> {
        self.inner.list_artifacts(context_id).await
    }

    async fn get_file_content(&self, context_id: &str, artifact_id: &str) -> Result<String> {
        self.inner.get_file_content(context_id, artifact_id).await
    }

    async fn get_data_content(&self, context_id: &str, artifact_id: &str) -> Result<Value> {
        self.inner.get_data_content(context_id, artifact_id).await
    }

    async fn get_dataset_rows(&self, context_id: &str, artifact_id: &str) -> Result<Vec<Value>> {
        self.inner.get_dataset_rows(context_id, artifact_id).await
    }

    async fn delete_context(&self, context_id: &str) -> Result<()> {
        self.inner.delete_context(context_id).await
    }
}
