use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::constants::STEP_IDENTITY_KEY;

/// Estado de una ejecución.
///
/// Transiciones válidas: `Running -> Completed`, `Running -> Failed`. `Cached`
/// se registra directamente como estado inicial y terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Cached,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }

    /// Sólo ejecuciones terminadas con éxito pueden servir de fuente de cache.
    pub fn is_cache_source(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Cached)
    }
}

/// Un intento concreto de ejecutar un step dentro de un run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    /// Contextos asociados (pipeline + run).
    pub contexts: Vec<Uuid>,
    /// Parámetros resueltos, incluida la clave reservada de identidad.
    pub parameters: Value,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub fingerprint: Option<String>,
    pub properties: BTreeMap<String, Value>,
    pub seq: u64, // asignado por el MetadataStore al registrar el inicio
}

impl ExecutionRecord {
    pub fn new(contexts: Vec<Uuid>, parameters: Value, status: ExecutionStatus, fingerprint: Option<String>) -> Self {
        let now = Utc::now();
        Self { id: Uuid::new_v4(),
               contexts,
               parameters,
               status,
               start_time: now,
               end_time: if status.is_terminal() { Some(now) } else { None },
               fingerprint,
               properties: BTreeMap::new(),
               seq: 0 }
    }

    /// Decodifica el nombre del step desde la clave reservada de parámetros.
    pub fn step_name(&self) -> Option<&str> {
        self.parameters.get(STEP_IDENTITY_KEY).and_then(|id| id.get("name")).and_then(|n| n.as_str())
    }

    pub fn belongs_to(&self, context_id: Uuid) -> bool {
        self.contexts.contains(&context_id)
    }
}
