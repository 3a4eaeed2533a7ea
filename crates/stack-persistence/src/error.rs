//! Errores de persistencia.
//! Mapea errores de IO / serde a variantes semánticas y, hacia fuera, a
//! `StackError`.

use std::io;
use std::path::PathBuf;

use stack_core::StackError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("malformed document {path}: {source}")]
    Malformed { path: PathBuf, source: serde_json::Error },
    #[error("cannot encode document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("no home directory configured (set STACKFLOW_HOME)")]
    NoHome,
    #[error(transparent)]
    Stack(#[from] StackError),
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Errores de IO que suelen desaparecer al reintentar.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io { source, .. } => {
                matches!(source.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
            }
            _ => false,
        }
    }
}

impl From<PersistenceError> for StackError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Stack(inner) => inner,
            other => StackError::Internal(format!("persistence: {other}")),
        }
    }
}
