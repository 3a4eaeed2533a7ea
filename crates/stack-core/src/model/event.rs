use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventDirection {
    Input,
    Output,
}

/// Vínculo entrada/salida entre una ejecución y un artifact. Es la única
/// fuente de parentesco: ninguna ejecución guarda un puntero a su padre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub execution_id: Uuid,
    pub artifact_id: Uuid,
    /// Nombre del input/output declarado en el step.
    pub name: String,
    pub direction: EventDirection,
    pub timestamp: DateTime<Utc>,
    /// Reloj lógico del ledger, asignado por el MetadataStore. Es el orden que
    /// se usa para decidir "estrictamente anterior".
    pub seq: u64,
}

impl EventRecord {
    pub fn new(execution_id: Uuid, artifact_id: Uuid, name: impl Into<String>, direction: EventDirection) -> Self {
        Self { execution_id,
               artifact_id,
               name: name.into(),
               direction,
               timestamp: Utc::now(),
               seq: 0 }
    }
}
