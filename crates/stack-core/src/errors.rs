//! Taxonomía de errores del core.
//!
//! Los errores de ensamblado (`MissingComponent`, `StackValidation`) abortan la
//! creación del stack completo. Los de resolución (`NotFound`,
//! `AmbiguousCapability`) abortan el deploy al planificar, antes de crear el
//! contexto del run. Las fallas en tiempo de ejecución de un step
//! no pasan por aquí: quedan como estado `failed` en el ledger.

use thiserror::Error;

use crate::model::{ComponentKind, PayloadType};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum StackError {
    #[error("stack is missing mandatory components: {}", join_kinds(.kinds))]
    MissingComponent { kinds: Vec<ComponentKind> },
    #[error("stack validation failed for component '{component}': {reason}")]
    StackValidation { component: String, reason: String },
    #[error("more than one component of kind {0} in stack")]
    DuplicateKind(ComponentKind),
    #[error("ambiguous producer for payload type '{payload_type}': candidates {}", .candidates.join(", "))]
    AmbiguousCapability { payload_type: PayloadType, candidates: Vec<String> },
    #[error("{what} '{name}' not found (known: {})", join_known(.known))]
    NotFound { what: String, name: String, known: Vec<String> },
    #[error("{what} '{name}' already exists")]
    AlreadyExists { what: String, name: String },
    #[error("{what} '{name}' is in use by {holder}")]
    InUse { what: String, name: String, holder: String },
    #[error("version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },
    #[error("invalid step graph: {0}")]
    InvalidGraph(String),
    #[error("artifact io: {0}")]
    ArtifactIo(String),
    #[error("service '{service}' not running after {attempts} attempts")]
    ServiceTimeout { service: String, attempts: u32 },
    #[error("internal: {0}")]
    Internal(String),
}

impl StackError {
    pub fn not_found(what: &str, name: impl Into<String>, known: Vec<String>) -> Self {
        Self::NotFound { what: what.to_string(), name: name.into(), known }
    }

    pub fn already_exists(what: &str, name: impl Into<String>) -> Self {
        Self::AlreadyExists { what: what.to_string(), name: name.into() }
    }
}

fn join_kinds(kinds: &[ComponentKind]) -> String {
    kinds.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", ")
}

fn join_known(known: &[String]) -> String {
    if known.is_empty() {
        "none".to_string()
    } else {
        known.join(", ")
    }
}

/// Clasificación gruesa de errores para logging y decisiones del caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Ensamblado o import inválido; reintentar sin cambios no sirve.
    Validation,
    /// Falla al resolver flavor / producer.
    Resolution,
    /// Colisión de nombres o recurso en uso.
    Conflict,
    /// IO, servicios y errores internos.
    Runtime,
}

pub fn classify_error(err: &StackError) -> ErrorClass {
    match err {
        StackError::MissingComponent { .. }
        | StackError::StackValidation { .. }
        | StackError::DuplicateKind(_)
        | StackError::VersionMismatch { .. }
        | StackError::InvalidGraph(_) => ErrorClass::Validation,
        StackError::AmbiguousCapability { .. } | StackError::NotFound { .. } => ErrorClass::Resolution,
        StackError::AlreadyExists { .. } | StackError::InUse { .. } => ErrorClass::Conflict,
        StackError::ArtifactIo(_) | StackError::ServiceTimeout { .. } | StackError::Internal(_) => ErrorClass::Runtime,
    }
}
