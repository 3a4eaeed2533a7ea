use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    Pipeline,
    Run,
}

/// Contexto de agrupación (pipeline o run). Las ejecuciones se asocian a
/// contextos; no existe otra relación explícita entre ellos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub id: Uuid,
    pub kind: ContextKind,
    /// Único por `kind`.
    pub name: String,
    pub properties: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub seq: u64, // asignado por el MetadataStore
}

impl ContextRecord {
    pub fn new(kind: ContextKind, name: impl Into<String>, properties: BTreeMap<String, Value>) -> Self {
        Self { id: Uuid::new_v4(),
               kind,
               name: name.into(),
               properties,
               created_at: Utc::now(),
               seq: 0 }
    }
}
