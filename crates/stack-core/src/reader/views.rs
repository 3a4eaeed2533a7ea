use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::constants::{PIPELINE_PROPERTY, STACK_PROPERTY};
use crate::model::{ArtifactRecord, ContextRecord, ExecutionStatus, PayloadType};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineView {
    pub id: Uuid,
    pub name: String,
    pub properties: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl From<ContextRecord> for PipelineView {
    fn from(ctx: ContextRecord) -> Self {
        Self { id: ctx.id,
               name: ctx.name,
               properties: ctx.properties,
               created_at: ctx.created_at }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunView {
    pub id: Uuid,
    pub name: String,
    pub properties: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub seq: u64,
}

impl RunView {
    pub fn pipeline_name(&self) -> Option<&str> {
        self.properties.get(PIPELINE_PROPERTY).and_then(|v| v.as_str())
    }

    pub fn stack_name(&self) -> Option<&str> {
        self.properties.get(STACK_PROPERTY).and_then(|v| v.as_str())
    }
}

impl From<ContextRecord> for RunView {
    fn from(ctx: ContextRecord) -> Self {
        Self { id: ctx.id,
               name: ctx.name,
               properties: ctx.properties,
               created_at: ctx.created_at,
               seq: ctx.seq }
    }
}

/// Una ejecución vista como step de un run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub execution_id: Uuid,
    pub run_id: Uuid,
    pub name: String,
    pub status: ExecutionStatus,
    /// Parámetros resueltos sin claves reservadas.
    pub params: Value,
    pub fingerprint: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Ejecución de la que se tomó el cache (sólo `cached`).
    pub cache_source: Option<Uuid>,
    pub failure: Option<String>,
    pub properties: BTreeMap<String, Value>,
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactView {
    pub id: Uuid,
    /// Nombre del input/output en el step que se está mirando.
    pub name: String,
    pub type_name: String,
    pub uri: String,
    pub producer: String,
    pub payload_type: PayloadType,
    pub properties: BTreeMap<String, Value>,
    /// Ejecución de la que el artifact es output lógico.
    pub producer_step_id: Option<Uuid>,
}

impl ArtifactView {
    pub(crate) fn new(name: String, record: ArtifactRecord, producer_step_id: Option<Uuid>) -> Self {
        Self { id: record.id,
               name,
               type_name: record.type_name,
               uri: record.uri,
               producer: record.producer,
               payload_type: record.payload_type,
               properties: record.properties,
               producer_step_id }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepArtifacts {
    pub inputs: BTreeMap<String, ArtifactView>,
    pub outputs: BTreeMap<String, ArtifactView>,
}
