use dashmap::DashMap;
use uuid::Uuid;

use crate::errors::StackError;

/// Almacenamiento de bytes de artifacts direccionado por URI.
pub trait ArtifactStore: Send + Sync {
    fn root_uri(&self) -> &str;

    fn write(&self, uri: &str, bytes: &[u8]) -> Result<(), StackError>;

    fn read(&self, uri: &str) -> Result<Vec<u8>, StackError>;

    fn exists(&self, uri: &str) -> bool;

    /// URI bajo la cual se guarda el output `output` del step `step` en `run`.
    fn artifact_uri(&self, run: &str, step: &str, output: &str, artifact_id: Uuid) -> String {
        format!("{}/{}/{}/{}/{}", self.root_uri().trim_end_matches('/'), run, step, output, artifact_id)
    }
}

/// Artifact store en memoria. Cada URI se escribe una sola vez.
#[derive(Debug)]
pub struct InMemoryArtifactStore {
    root: String,
    blobs: DashMap<String, Vec<u8>>,
}

impl InMemoryArtifactStore {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into(),
               blobs: DashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl Default for InMemoryArtifactStore {
    fn default() -> Self {
        Self::new("memory://artifacts")
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn root_uri(&self) -> &str {
        &self.root
    }

    fn write(&self, uri: &str, bytes: &[u8]) -> Result<(), StackError> {
        match self.blobs.entry(uri.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(StackError::ArtifactIo(format!("uri already written: {uri}")))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(bytes.to_vec());
                Ok(())
            }
        }
    }

    fn read(&self, uri: &str) -> Result<Vec<u8>, StackError> {
        self.blobs
            .get(uri)
            .map(|b| b.value().clone())
            .ok_or_else(|| StackError::ArtifactIo(format!("no artifact at {uri}")))
    }

    fn exists(&self, uri: &str) -> bool {
        self.blobs.contains_key(uri)
    }
}
