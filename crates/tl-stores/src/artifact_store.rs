//! In-memory [`ArtifactStore`], keyed by `(context_id, artifact_id)`
//! (spec §3 invariant a, §4.8).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;

use tl_core::artifact::{
    Artifact, ArtifactHeader, ArtifactOperation, ArtifactStatus, CreateArtifactRequest,
    DataArtifact, DatasetArtifact, FileArtifact,
};
use tl_core::error::{Error, Result};
use tl_core::store::{AppendBatchOptions, AppendChunkOptions, ArtifactStore};

type Key = (String, String);

#[derive(Default)]
pub struct InMemoryArtifactStore {
    inner: RwLock<HashMap<Key, Artifact>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(context_id: &str, artifact_id: &str) -> Key {
        (context_id.to_string(), artifact_id.to_string())
    }

    fn header(req: &CreateArtifactRequest) -> ArtifactHeader {
        let now = Utc::now();
        ArtifactHeader {
            artifact_id: req.artifact_id.clone(),
            task_id: req.task_id.clone(),
            context_id: req.context_id.clone(),
            status: ArtifactStatus::Building,
            version: 1,
            operations: vec![ArtifactOperation::new("create", now)],
            created_at: now,
            updated_at: now,
            completed_at: None,
            name: req.name.clone(),
        }
    }

    /// Builds the header for a `create` call that overrides an existing
    /// artifact (spec §3(d)/§4.8/S5/invariant 8): `created_at` survives from
    /// the prior record, `version` is bumped rather than reset, and the
    /// reset is recorded as a `reset` operation rather than a `create`.
    fn header_for_override(req: &CreateArtifactRequest, prior: &ArtifactHeader) -> ArtifactHeader {
        let now = Utc::now();
        ArtifactHeader {
            artifact_id: req.artifact_id.clone(),
            task_id: req.task_id.clone(),
            context_id: req.context_id.clone(),
            status: ArtifactStatus::Building,
            version: prior.version + 1,
            operations: vec![ArtifactOperation::new("reset", now)],
            created_at: prior.created_at,
            updated_at: now,
            completed_at: None,
            name: req.name.clone(),
        }
    }

    /// Enforces spec §3 invariant a: creating over an existing artifact_id
    /// without `override: true` is a conflict, regardless of artifact kind.
    fn check_create(&self, guard: &HashMap<Key, Artifact>, req: &CreateArtifactRequest) -> Result<()> {
        let key = Self::key(&req.context_id, &req.artifact_id);
        if guard.contains_key(&key) && !req.r#override {
            return Err(Error::ArtifactConflict {
                context_id: req.context_id.clone(),
                artifact_id: req.artifact_id.clone(),
            });
        }
        Ok(())
    }

    /// Builds the header for a `create_*` call: a fresh header, unless the
    /// request overrides an existing artifact, in which case the prior
    /// record's `created_at`/`version` carry forward (spec §3(d)/§4.8/S5).
    fn header_for(guard: &HashMap<Key, Artifact>, req: &CreateArtifactRequest) -> ArtifactHeader {
        let key = Self::key(&req.context_id, &req.artifact_id);
        match guard.get(&key) {
            Some(existing) if req.r#override => Self::header_for_override(req, existing.header()),
            _ => Self::header(req),
        }
    }

    fn touch(header: &mut ArtifactHeader, op: &str) {
        header.version += 1;
        header.updated_at = Utc::now();
        header.operations.push(ArtifactOperation::new(op, header.updated_at));
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn create_file_artifact(
        &self,
        req: CreateArtifactRequest,
        mime_type: String,
        encoding: String,
    ) -> Result<Artifact> {
        let mut guard = self.inner.write();
        self.check_create(&guard, &req)?;
        let header = Self::header_for(&guard, &req);
        let artifact = Artifact::File(FileArtifact {
            header,
            chunks: Vec::new(),
            mime_type,
            encoding,
            total_chunks: 0,
            total_size: 0,
        });
        guard.insert(Self::key(&req.context_id, &req.artifact_id), artifact.clone());
        Ok(artifact)
    }

    async fn create_data_artifact(&self, req: CreateArtifactRequest) -> Result<Artifact> {
        let mut guard = self.inner.write();
        self.check_create(&guard, &req)?;
        let header = Self::header_for(&guard, &req);
        let artifact = Artifact::Data(DataArtifact { header, data: Value::Null });
        guard.insert(Self::key(&req.context_id, &req.artifact_id), artifact.clone());
        Ok(artifact)
    }

    async fn create_dataset_artifact(
        &self,
        req: CreateArtifactRequest,
        column_schema: Option<Value>,
    ) -> Result<Artifact> {
        let mut guard = self.inner.write();
        self.check_create(&guard, &req)?;
        let header = Self::header_for(&guard, &req);
        let artifact = Artifact::Dataset(DatasetArtifact {
            header,
            row_batches: Vec::new(),
            column_schema,
        });
        guard.insert(Self::key(&req.context_id, &req.artifact_id), artifact.clone());
        Ok(artifact)
    }

    async fn append_file_chunk(
        &self,
        context_id: &str,
        artifact_id: &str,
        chunk: String,
        options: AppendChunkOptions,
    ) -> Result<Artifact> {
        let mut guard = self.inner.write();
        let key = Self::key(context_id, artifact_id);
        let artifact = guard.get_mut(&key).ok_or_else(|| Error::ArtifactNotFound {
            context_id: context_id.to_string(),
            artifact_id: artifact_id.to_string(),
        })?;
        let Artifact::File(file) = artifact else {
            return Err(Error::ArtifactTypeMismatch {
                context_id: context_id.to_string(),
                artifact_id: artifact_id.to_string(),
                expected: "file",
            });
        };
        // Empty chunks are a no-op write but still count toward is_last_chunk
        // (spec §4.8 edge case: empty-chunk handling).
        if !chunk.is_empty() {
            file.total_size += chunk.len() as u64;
            file.total_chunks += 1;
            file.chunks.push(chunk);
        }
        if options.is_last_chunk {
            file.header.status = ArtifactStatus::Complete;
            file.header.completed_at = Some(Utc::now());
        }
        if !chunk.is_empty() || options.is_last_chunk {
            Self::touch(&mut file.header, "append-chunk");
        }
        Ok(artifact.clone())
    }

    async fn write_data(&self, context_id: &str, artifact_id: &str, data: Value) -> Result<Artifact> {
        let mut guard = self.inner.write();
        let key = Self::key(context_id, artifact_id);
        let artifact = guard.get_mut(&key).ok_or_else(|| Error::ArtifactNotFound {
            context_id: context_id.to_string(),
            artifact_id: artifact_id.to_string(),
        })?;
        let Artifact::Data(da) = artifact else {
            return Err(Error::ArtifactTypeMismatch {
                context_id: context_id.to_string(),
                artifact_id: artifact_id.to_string(),
                expected: "data",
            });
        };
        da.data = data;
        da.header.status = ArtifactStatus::Complete;
        da.header.completed_at = Some(Utc::now());
        Self::touch(&mut da.header, "write-data");
        Ok(artifact.clone())
    }

    async fn append_dataset_batch(
        &self,
        context_id: &str,
        artifact_id: &str,
        rows: Value,
        options: AppendBatchOptions,
    ) -> Result<Artifact> {
        let mut guard = self.inner.write();
        let key = Self::key(context_id, artifact_id);
        let artifact = guard.get_mut(&key).ok_or_else(|| Error::ArtifactNotFound {
            context_id: context_id.to_string(),
            artifact_id: artifact_id.to_string(),
        })?;
        let Artifact::Dataset(ds) = artifact else {
            return Err(Error::ArtifactTypeMismatch {
                context_id: context_id.to_string(),
                artifact_id: artifact_id.to_string(),
                expected: "dataset",
            });
        };
        ds.row_batches.push(rows);
        if options.is_last_batch {
            ds.header.status = ArtifactStatus::Complete;
            ds.header.completed_at = Some(Utc::now());
        }
        Self::touch(&mut ds.header, "append-batch");
        Ok(artifact.clone())
    }

    async fn get_artifact(&self, context_id: &str, artifact_id: &str) -> Result<Option<Artifact>> {
        Ok(self.inner.read().get(&Self::key(context_id, artifact_id)).cloned())
    }

    async fn list_artifacts(&self, context_id: &str) -> Result<Vec<Artifact>> {
        Ok(self
            .inner
            .read()
            .iter()
            .filter(|((ctx, _), _)| ctx == context_id)
            .map(|(_, a)| a.clone())
            .collect())
    }

    async fn get_file_content(&self, context_id: &str, artifact_id: &str) -> Result<String> {
        let guard = self.inner.read();
        let artifact = guard.get(&Self::key(context_id, artifact_id)).ok_or_else(|| Error::ArtifactNotFound {
            context_id: context_id.to_string(),
            artifact_id: artifact_id.to_string(),
        })?;
        artifact
            .as_file()
            .map(|f| f.chunks.concat())
            .ok_or_else(|| Error::ArtifactTypeMismatch {
                context_id: context_id.to_string(),
                artifact_id: artifact_id.to_string(),
                expected: "file",
            })
    }

    async fn get_data_content(&self, context_id: &str, artifact_id: &str) -> Result<Value> {
        let guard = self.inner.read();
        let artifact = guard.get(&Self::key(context_id, artifact_id)).ok_or_else(|| Error::ArtifactNotFound {
            context_id: context_id.to_string(),
            artifact_id: artifact_id.to_string(),
        })?;
        artifact
            .as_data()
            .map(|d| d.data.clone())
            .ok_or_else(|| Error::ArtifactTypeMismatch {
                context_id: context_id.to_string(),
                artifact_id: artifact_id.to_string(),
                expected: "data",
            })
    }

    async fn get_dataset_rows(&self, context_id: &str, artifact_id: &str) -> Result<Vec<Value>> {
        let guard = self.inner.read();
        let artifact = guard.get(&Self::key(context_id, artifact_id)).ok_or_else(|| Error::ArtifactNotFound {
            context_id: context_id.to_string(),
            artifact_id: artifact_id.to_string(),
        })?;
        artifact
            .as_dataset()
            .map(|d| d.row_batches.clone())
            .ok_or_else(|| Error::ArtifactTypeMismatch {
                context_id: context_id.to_string(),
                artifact_id: artifact_id.to_string(),
                expected: "dataset",
            })
    }

    async fn delete_context(&self, context_id: &str) -> Result<()> {
        self.inner.write().retain(|(ctx, _), _| ctx != context_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(artifact_id: &str) -> CreateArtifactRequest {
        CreateArtifactRequest {
            artifact_id: artifact_id.to_string(),
            task_id: "task-1".into(),
            context_id: "ctx-1".into(),
            name: None,
            r#override: false,
        }
    }

    #[tokio::test]
    async fn create_then_conflict_without_override() {
        let store = InMemoryArtifactStore::new();
        store.create_data_artifact(req("a1")).await.unwrap();
        let err = store.create_data_artifact(req("a1")).await.unwrap_err();
        assert_eq!(err.kind(), tl_core::error::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn create_with_override_succeeds() {
        let store = InMemoryArtifactStore::new();
        let original = store.create_data_artifact(req("a1")).await.unwrap();
        let mut r = req("a1");
        r.r#override = true;
        let artifact = store.create_data_artifact(r).await.unwrap();
        assert_eq!(artifact.header().version, original.header().version + 1);
        assert_eq!(artifact.header().created_at, original.header().created_at);
        assert_eq!(artifact.header().status, ArtifactStatus::Building);
        assert_eq!(artifact.header().operations.last().unwrap().kind, "reset");
    }

    #[tokio::test]
    async fn file_chunks_accumulate_and_complete() {
        let store = InMemoryArtifactStore::new();
        store
            .create_file_artifact(req("f1"), "text/plain".into(), "utf-8".into())
            .await
            .unwrap();
        store
            .append_file_chunk("ctx-1", "f1", "hello ".into(), AppendChunkOptions { is_last_chunk: false, encoding: None })
            .await
            .unwrap();
        let artifact = store
            .append_file_chunk("ctx-1", "f1", "world".into(), AppendChunkOptions { is_last_chunk: true, encoding: None })
            .await
            .unwrap();
        assert_eq!(artifact.header().status, ArtifactStatus::Complete);
        let content = store.get_file_content("ctx-1", "f1").await.unwrap();
        assert_eq!(content, "hello world");
    }

    #[tokio::test]
    async fn empty_chunk_is_noop_but_can_still_complete() {
        let store = InMemoryArtifactStore::new();
        store
            .create_file_artifact(req("f1"), "text/plain".into(), "utf-8".into())
            .await
            .unwrap();
        let artifact = store
            .append_file_chunk("ctx-1", "f1", String::new(), AppendChunkOptions { is_last_chunk: true, encoding: None })
            .await
            .unwrap();
        assert_eq!(artifact.as_file().unwrap().total_chunks, 0);
        assert_eq!(artifact.header().status, ArtifactStatus::Complete);
    }

    #[tokio::test]
    async fn type_mismatch_on_wrong_accessor() {
        let store = InMemoryArtifactStore::new();
        store.create_data_artifact(req("d1")).await.unwrap();
        let err = store
            .append_file_chunk("ctx-1", "d1", "x".into(), AppendChunkOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), tl_core::error::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn not_found_for_unknown_artifact() {
        let store = InMemoryArtifactStore::new();
        let err = store.get_file_content("ctx-1", "missing").await.unwrap_err();
        assert_eq!(err.kind(), tl_core::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn delete_context_removes_all_its_artifacts() {
        let store = InMemoryArtifactStore::new();
        store.create_data_artifact(req("a1")).await.unwrap();
        store.create_data_artifact(req("a2")).await.unwrap();
        store.delete_context("ctx-1").await.unwrap();
        assert!(store.list_artifacts("ctx-1").await.unwrap().is_empty());
    }
}
