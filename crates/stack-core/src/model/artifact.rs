//! Artifact persistido. El contenido vive en el artifact store bajo `uri`; el
//! ledger sólo guarda la descripción y el producer que sabe leerlo.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::PayloadType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: Uuid,
    /// Categoría del artifact (`DataArtifact`, `ModelArtifact`, ...).
    pub type_name: String,
    pub uri: String,
    /// Id del producer que escribió el payload.
    pub producer: String,
    pub payload_type: PayloadType,
    pub properties: BTreeMap<String, Value>,
}
