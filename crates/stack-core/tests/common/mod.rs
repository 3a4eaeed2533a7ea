#![allow(dead_code)]

use std::sync::Arc;

use serde_json::Value;
use stack_core::registry::ComponentFactory;
use stack_core::{ArtifactStore, ComponentKind, ComponentRecord, FlavorRegistry, InMemoryArtifactStore,
                 InMemoryMetadataStore, MetadataStore, Orchestrator, Payload, PayloadType, Producer, ProducerDescriptor,
                 Stack, StackComponent, StackError, StackValidator, StepContext, StepDefinition, StepRunResult,
                 TypeCapabilityRegistry};

/// Componente de prueba: expone la capacidad que corresponde a su kind y un
/// validador opcional.
#[derive(Debug)]
pub struct TestComponent {
    pub record: ComponentRecord,
    pub validator: Option<StackValidator>,
    pub artifacts: InMemoryArtifactStore,
    pub metadata: InMemoryMetadataStore,
    pub expose: bool,
}

impl TestComponent {
    pub fn new(kind: ComponentKind, name: &str) -> Self {
        Self { record: ComponentRecord::new(kind, "test", name, Default::default()),
               validator: None,
               artifacts: InMemoryArtifactStore::default(),
               metadata: InMemoryMetadataStore::new(),
               expose: true }
    }

    pub fn with_validator(mut self, validator: StackValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.expose = false;
        self
    }

    pub fn arc(self) -> Arc<dyn StackComponent> {
        Arc::new(self)
    }
}

impl Orchestrator for TestComponent {
    fn run_step(&self, step: &dyn StepDefinition, ctx: &StepContext) -> StepRunResult {
        step.run(ctx)
    }
}

impl StackComponent for TestComponent {
    fn record(&self) -> &ComponentRecord {
        &self.record
    }

    fn validator(&self) -> Option<StackValidator> {
        self.validator.clone()
    }

    fn as_orchestrator(&self) -> Option<&dyn Orchestrator> {
        (self.expose && self.record.kind == ComponentKind::Orchestrator).then_some(self as &dyn Orchestrator)
    }

    fn as_artifact_store(&self) -> Option<&dyn ArtifactStore> {
        (self.expose && self.record.kind == ComponentKind::ArtifactStore).then_some(&self.artifacts as &dyn ArtifactStore)
    }

    fn as_metadata_store(&self) -> Option<&dyn MetadataStore> {
        (self.expose && self.record.kind == ComponentKind::MetadataStore).then_some(&self.metadata as &dyn MetadataStore)
    }
}

pub fn mandatory() -> Vec<Arc<dyn StackComponent>> {
    vec![TestComponent::new(ComponentKind::Orchestrator, "orch").arc(),
         TestComponent::new(ComponentKind::ArtifactStore, "arts").arc(),
         TestComponent::new(ComponentKind::MetadataStore, "meta").arc()]
}

pub fn local_stack() -> Stack {
    Stack::assemble("local", mandatory()).unwrap()
}

/// Factory del flavor "test" para cualquier kind.
pub fn test_factory() -> ComponentFactory {
    Arc::new(|record: ComponentRecord| -> Result<Arc<dyn StackComponent>, StackError> {
        let validator = match record.config_str("requires") {
            Some("container_registry") => Some(StackValidator::requires([ComponentKind::ContainerRegistry])),
            _ => None,
        };
        Ok(Arc::new(TestComponent { record,
                                    validator,
                                    artifacts: InMemoryArtifactStore::default(),
                                    metadata: InMemoryMetadataStore::new(),
                                    expose: true }))
    })
}

pub fn flavors_with_test() -> Arc<FlavorRegistry> {
    let flavors = Arc::new(FlavorRegistry::new(Arc::new(TypeCapabilityRegistry::new())));
    for kind in ComponentKind::ALL {
        flavors.register(kind, "test", test_factory());
    }
    flavors
}

/// Producer JSON trivial para uno o más tipos.
#[derive(Debug)]
pub struct JsonProducer {
    pub id: String,
    pub types: Vec<PayloadType>,
}

impl JsonProducer {
    pub fn new(id: &str, types: &[&str]) -> Arc<dyn Producer> {
        Arc::new(Self { id: id.to_string(),
                        types: types.iter().map(|t| PayloadType::from(*t)).collect() })
    }
}

impl Producer for JsonProducer {
    fn descriptor(&self) -> ProducerDescriptor {
        ProducerDescriptor { id: self.id.clone(),
                             payload_types: self.types.clone() }
    }

    fn save(&self, payload: &Payload, store: &dyn ArtifactStore, uri: &str) -> Result<(), StackError> {
        let bytes = serde_json::to_vec(&payload.value).map_err(|e| StackError::ArtifactIo(e.to_string()))?;
        store.write(uri, &bytes)
    }

    fn load(&self, payload_type: &PayloadType, store: &dyn ArtifactStore, uri: &str) -> Result<Payload, StackError> {
        let value: Value = serde_json::from_slice(&store.read(uri)?).map_err(|e| StackError::ArtifactIo(e.to_string()))?;
        Ok(Payload::new(payload_type.clone(), value))
    }
}
