//! Registros del ledger de metadata.
//!
//! El ledger nunca se reescribe: el estado final de una ejecución se agrega
//! como `ExecutionFinished` y los índices del store lo pliegan sobre el
//! registro de inicio.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::model::{ArtifactRecord, ContextRecord, EventRecord, ExecutionRecord, ExecutionStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerRecordKind {
    /// Invariante: nombre único por kind de contexto.
    ContextCreated(ContextRecord),
    /// Todos sus contextos deben existir.
    ExecutionStarted(ExecutionRecord),
    ArtifactRecorded(ArtifactRecord),
    /// La ejecución y el artifact deben existir.
    EventRecorded(EventRecord),
    /// Sólo válido sobre una ejecución `running`.
    ExecutionFinished {
        execution_id: Uuid,
        status: ExecutionStatus,
        end_time: DateTime<Utc>,
        properties: BTreeMap<String, Value>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub seq: u64, // orden de append, empieza en 1
    pub ts: DateTime<Utc>,
    pub kind: LedgerRecordKind,
}
