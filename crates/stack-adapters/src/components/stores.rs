use std::sync::Arc;

use stack_core::{ArtifactStore, ComponentRecord, InMemoryArtifactStore, InMemoryMetadataStore, MetadataStore, StackComponent,
                 StackError};

/// Artifact store `memory`. La clave de configuración `root` fija la raíz de
/// las URIs (por defecto `memory://<nombre>`).
#[derive(Debug)]
pub struct MemoryArtifactStore {
    record: ComponentRecord,
    store: InMemoryArtifactStore,
}

impl MemoryArtifactStore {
    pub fn new(record: ComponentRecord) -> Self {
        let root = record.config_str("root")
                         .map(str::to_string)
                         .unwrap_or_else(|| format!("memory://{}", record.name));
        Self { store: InMemoryArtifactStore::new(root),
               record }
    }

    pub fn factory(record: ComponentRecord) -> Result<Arc<dyn StackComponent>, StackError> {
        if let Some(root) = record.configuration.get("root") {
            if !root.is_string() {
                return Err(StackError::StackValidation { component: record.name.clone(),
                                                         reason: "configuration 'root' must be a string".into() });
            }
        }
        Ok(Arc::new(Self::new(record)))
    }

    pub fn blob_count(&self) -> usize {
        self.store.len()
    }
}

impl StackComponent for MemoryArtifactStore {
    fn record(&self) -> &ComponentRecord {
        &self.record
    }

    fn as_artifact_store(&self) -> Option<&dyn ArtifactStore> {
        Some(&self.store)
    }
}

/// Metadata store `memory`: el ledger vive lo que vive el componente.
#[derive(Debug)]
pub struct MemoryMetadataStore {
    record: ComponentRecord,
    ledger: InMemoryMetadataStore,
}

impl MemoryMetadataStore {
    pub fn new(record: ComponentRecord) -> Self {
        Self { record,
               ledger: InMemoryMetadataStore::new() }
    }

    pub fn factory(record: ComponentRecord) -> Result<Arc<dyn StackComponent>, StackError> {
        Ok(Arc::new(Self::new(record)))
    }
}

impl StackComponent for MemoryMetadataStore {
    fn record(&self) -> &ComponentRecord {
        &self.record
    }

    fn as_metadata_store(&self) -> Option<&dyn MetadataStore> {
        Some(&self.ledger)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use stack_core::{ComponentKind, Configuration};

    use super::*;

    #[test]
    fn blobs_written_through_the_component_are_counted() {
        let mut config = Configuration::new();
        config.insert("root".into(), json!("memory://custom"));
        let component = MemoryArtifactStore::new(ComponentRecord::new(ComponentKind::ArtifactStore, "memory", "blobs", config));
        assert_eq!(component.blob_count(), 0);
        let store = component.as_artifact_store().unwrap();
        assert_eq!(store.root_uri(), "memory://custom");
        store.write("memory://custom/a", b"1").unwrap();
        store.write("memory://custom/b", b"2").unwrap();
        assert!(store.write("memory://custom/a", b"3").is_err());
        assert_eq!(component.blob_count(), 2);
    }

    #[test]
    fn non_string_root_is_rejected() {
        let mut config = Configuration::new();
        config.insert("root".into(), json!(7));
        let record = ComponentRecord::new(ComponentKind::ArtifactStore, "memory", "blobs", config);
        assert!(MemoryArtifactStore::factory(record).is_err());
    }
}
