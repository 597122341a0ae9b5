//! Artifact data model (spec §3, §4.8): file / data / dataset, all
//! context-scoped, versioned, and operation-logged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Building,
    Complete,
    Failed,
}

/// One entry in an artifact's append-only operation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactOperation {
    pub kind: String,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl ArtifactOperation {
    pub fn new(kind: impl Into<String>, at: DateTime<Utc>) -> Self {
        ArtifactOperation { kind: kind.into(), at, detail: None }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Fields common to every artifact kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub artifact_id: String,
    pub task_id: String,
    pub context_id: String,
    pub status: ArtifactStatus,
    pub version: u64,
    pub operations: Vec<ArtifactOperation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileArtifact {
    #[serde(flatten)]
    pub header: ArtifactHeader,
    pub chunks: Vec<String>,
    pub mime_type: String,
    pub encoding: String,
    pub total_chunks: u32,
    pub total_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataArtifact {
    #[serde(flatten)]
    pub header: ArtifactHeader,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetArtifact {
    #[serde(flatten)]
    pub header: ArtifactHeader,
    pub row_batches: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_schema: Option<Value>,
}

/// The artifact tagged union (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    File(FileArtifact),
    Data(DataArtifact),
    Dataset(DatasetArtifact),
}

impl Artifact {
    pub fn header(&self) -> &ArtifactHeader {
        match self {
            Artifact::File(a) => &a.header,
            Artifact::Data(a) => &a.header,
            Artifact::Dataset(a) => &a.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut ArtifactHeader {
        match self {
            Artifact::File(a) => &mut a.header,
            Artifact::Data(a) => &mut a.header,
            Artifact::Dataset(a) => &mut a.header,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Artifact::File(_) => "file",
            Artifact::Data(_) => "data",
            Artifact::Dataset(_) => "dataset",
        }
    }

    pub fn as_file(&self) -> Option<&FileArtifact> {
        match self {
            Artifact::File(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataArtifact> {
        match self {
            Artifact::Data(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dataset(&self) -> Option<&DatasetArtifact> {
        match self {
            Artifact::Dataset(a) => Some(a),
            _ => None,
        }
    }
}

/// Identifying key for create/override calls; the (context_id, artifact_id)
/// pair is the unique key (spec §3 invariant a).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateArtifactRequest {
    pub artifact_id: String,
    pub task_id: String,
    pub context_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub r#override: bool,
}
