use std::fmt;

use thiserror::Error;

/// Kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Pod,
    Node,
    Deployment,
    Service,
    PersistentVolume,
    PersistentVolumeClaim,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Pod => "pod",
            ResourceKind::Node => "node",
            ResourceKind::Deployment => "deployment",
            ResourceKind::Service => "service",
            ResourceKind::PersistentVolume => "persistent volume",
            ResourceKind::PersistentVolumeClaim => "persistent volume claim",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },

    /// A conditional create lost against an existing key.
    #[error("a {kind} with id {id} already exists")]
    Duplicate { kind: ResourceKind, id: String },

    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("container runtime error: {0}")]
    Runtime(#[source] anyhow::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("malformed record: {0}")]
    Codec(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn duplicate(kind: ResourceKind, id: impl Into<String>) -> Self {
        Error::Duplicate {
            kind,
            id: id.into(),
        }
    }

    pub fn store(err: impl Into<anyhow::Error>) -> Self {
        Error::Store(err.into())
    }

    pub fn runtime(err: impl Into<anyhow::Error>) -> Self {
        Error::Runtime(err.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
