//! Bundles de plugins built-in y su rutina de instalación.
//!
//! `BuiltinBundle` se activa en el arranque; `ContainerBundle` queda declarado
//! y sólo se activa si alguien resuelve un flavor que aún no existe.

use std::sync::Arc;

use log::info;
use stack_core::{ComponentKind, FlavorRegistry, PayloadType, PluginBundle, StackError, TypeCapabilityRegistry};

use crate::components::{ContainerStepOperator, LocalOrchestrator, MemoryArtifactStore, MemoryMetadataStore, RecordOnlyComponent};
use crate::producers::builtin_producers;
use crate::service::InProcessMetadataStore;

/// Flavor genérico para los kinds opcionales sin backend propio.
pub const DEFAULT_FLAVOR: &str = "default";

const OPTIONAL_KINDS: [ComponentKind; 6] = [ComponentKind::ContainerRegistry,
                                             ComponentKind::StepOperator,
                                             ComponentKind::SecretsManager,
                                             ComponentKind::FeatureStore,
                                             ComponentKind::ModelDeployer,
                                             ComponentKind::ExperimentTracker];

#[derive(Debug, Default)]
pub struct BuiltinBundle;

impl PluginBundle for BuiltinBundle {
    fn name(&self) -> &str {
        "builtin"
    }

    fn activate(&self, flavors: &FlavorRegistry, capabilities: &TypeCapabilityRegistry) -> Result<(), StackError> {
        flavors.register(ComponentKind::Orchestrator, "local", Arc::new(LocalOrchestrator::factory));
        flavors.register(ComponentKind::ArtifactStore, "memory", Arc::new(MemoryArtifactStore::factory));
        flavors.register(ComponentKind::MetadataStore, "memory", Arc::new(MemoryMetadataStore::factory));
        flavors.register(ComponentKind::MetadataStore, "in_process", Arc::new(InProcessMetadataStore::factory));
        for kind in OPTIONAL_KINDS {
            flavors.register(kind, DEFAULT_FLAVOR, Arc::new(RecordOnlyComponent::factory));
        }

        for producer in builtin_producers() {
            capabilities.register_producer(producer);
        }
        capabilities.declare_type("integer", [PayloadType::from("number")]);
        capabilities.declare_type("markdown", [PayloadType::from("text")]);
        Ok(())
    }
}

/// Flavors que dependen de contenedores: `docker` (step operator) y `oci`
/// (container registry).
#[derive(Debug, Default)]
pub struct ContainerBundle;

impl PluginBundle for ContainerBundle {
    fn name(&self) -> &str {
        "containers"
    }

    fn activate(&self, flavors: &FlavorRegistry, _capabilities: &TypeCapabilityRegistry) -> Result<(), StackError> {
        flavors.register(ComponentKind::StepOperator, "docker", Arc::new(ContainerStepOperator::factory));
        flavors.register(ComponentKind::ContainerRegistry, "oci", Arc::new(RecordOnlyComponent::factory));
        Ok(())
    }
}

/// Rutina de inicialización: registra los bundles conocidos en `flavors`.
pub fn install_builtin(flavors: &FlavorRegistry) -> Result<(), StackError> {
    flavors.activate_bundle(Arc::new(BuiltinBundle))?;
    flavors.add_bundle(Arc::new(ContainerBundle));
    info!("builtin flavors installed: orchestrator={:?} metadata_store={:?}",
          flavors.flavors_for(ComponentKind::Orchestrator),
          flavors.flavors_for(ComponentKind::MetadataStore));
    Ok(())
}
