//! Shared error type used across the turn-engine crates.
//!
//! Errors are classified by [`ErrorKind`] rather than by matching every
//! variant — callers that only care about "is this a validation problem or
//! a conflict" use [`Error::kind`] instead of a giant match.

/// The error taxonomy from spec §7, independent of the concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Provider,
    Lifecycle,
    Cleanup,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid tool call: {0}")]
    InvalidToolCall(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("artifact not found: {context_id}/{artifact_id}")]
    ArtifactNotFound {
        context_id: String,
        artifact_id: String,
    },

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("artifact already exists: {context_id}/{artifact_id}. Use override: true or a different artifactId.")]
    ArtifactConflict {
        context_id: String,
        artifact_id: String,
    },

    #[error("artifact {context_id}/{artifact_id} is not a {expected} artifact")]
    ArtifactTypeMismatch {
        context_id: String,
        artifact_id: String,
        expected: &'static str,
    },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("agent lifecycle: {0}")]
    Lifecycle(String),

    #[error("cleanup sweep: {0}")]
    Cleanup(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidToolCall(_) | Error::InvalidArguments(_) => ErrorKind::Validation,
            Error::ArtifactNotFound { .. } | Error::ToolNotFound(_) => ErrorKind::NotFound,
            Error::ArtifactConflict { .. } => ErrorKind::Conflict,
            Error::ArtifactTypeMismatch { .. } => ErrorKind::Validation,
            Error::Provider(_) => ErrorKind::Provider,
            Error::Lifecycle(_) => ErrorKind::Lifecycle,
            Error::Cleanup(_) => ErrorKind::Cleanup,
            Error::Other(_) => ErrorKind::Provider,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
