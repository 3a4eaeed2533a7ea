//! Registro inmutable de un componente (backend enchufable) del stack.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Configuración opaca de un componente; el core no interpreta sus valores.
pub type Configuration = BTreeMap<String, Value>;

/// Rol que un componente cumple dentro de un stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Orchestrator,
    ArtifactStore,
    MetadataStore,
    ContainerRegistry,
    StepOperator,
    SecretsManager,
    FeatureStore,
    ModelDeployer,
    ExperimentTracker,
}

impl ComponentKind {
    /// Kinds que todo stack debe tener exactamente una vez.
    pub const MANDATORY: [ComponentKind; 3] =
        [ComponentKind::Orchestrator, ComponentKind::ArtifactStore, ComponentKind::MetadataStore];

    pub const ALL: [ComponentKind; 9] = [ComponentKind::Orchestrator,
                                         ComponentKind::ArtifactStore,
                                         ComponentKind::MetadataStore,
                                         ComponentKind::ContainerRegistry,
                                         ComponentKind::StepOperator,
                                         ComponentKind::SecretsManager,
                                         ComponentKind::FeatureStore,
                                         ComponentKind::ModelDeployer,
                                         ComponentKind::ExperimentTracker];

    pub fn is_mandatory(self) -> bool {
        Self::MANDATORY.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Orchestrator => "orchestrator",
            ComponentKind::ArtifactStore => "artifact_store",
            ComponentKind::MetadataStore => "metadata_store",
            ComponentKind::ContainerRegistry => "container_registry",
            ComponentKind::StepOperator => "step_operator",
            ComponentKind::SecretsManager => "secrets_manager",
            ComponentKind::FeatureStore => "feature_store",
            ComponentKind::ModelDeployer => "model_deployer",
            ComponentKind::ExperimentTracker => "experiment_tracker",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descripción de una instancia de backend. Una vez registrada no cambia:
/// modificarla implica borrarla y volver a registrarla.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub kind: ComponentKind,
    pub flavor: String,
    /// Único dentro de su `kind`.
    pub name: String,
    pub id: Uuid,
    pub configuration: Configuration,
}

impl ComponentRecord {
    pub fn new(kind: ComponentKind, flavor: impl Into<String>, name: impl Into<String>, configuration: Configuration) -> Self {
        Self { kind,
               flavor: flavor.into(),
               name: name.into(),
               id: Uuid::new_v4(),
               configuration }
    }

    /// Lee una clave de configuración como string.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.configuration.get(key).and_then(|v| v.as_str())
    }
}
