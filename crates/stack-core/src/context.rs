//! Contexto de ejecución explícito: configuración + registries + store.
//!
//! Se construye al arrancar el proceso y se pasa por referencia; no hay
//! estado global.

use std::sync::Arc;

use log::info;

use crate::config::StackflowConfig;
use crate::engine::{deploy, RunConfig, RunHandle};
use crate::errors::StackError;
use crate::model::Payload;
use crate::reader::{ArtifactView, MetadataGraphReader};
use crate::registry::{FlavorRegistry, TypeCapabilityRegistry};
use crate::service::{provision_and_wait, LivenessPolicy};
use crate::stack::{InMemoryStackStore, Stack, StackStore};
use crate::step::StepGraph;

pub struct StackflowContext {
    config: StackflowConfig,
    capabilities: Arc<TypeCapabilityRegistry>,
    flavors: Arc<FlavorRegistry>,
    stacks: Arc<dyn StackStore>,
}

impl StackflowContext {
    /// Contexto con registries vacíos y store en memoria.
    pub fn new(config: StackflowConfig) -> Self {
        let capabilities = Arc::new(TypeCapabilityRegistry::new());
        let flavors = Arc::new(FlavorRegistry::new(capabilities));
        let stacks: Arc<dyn StackStore> = Arc::new(InMemoryStackStore::new(flavors.clone()));
        Self::with_store(config, flavors, stacks)
    }

    /// Contexto sobre un store propio (p.ej. uno persistente). El store debe
    /// haberse construido con el mismo `flavors`.
    pub fn with_store(config: StackflowConfig, flavors: Arc<FlavorRegistry>, stacks: Arc<dyn StackStore>) -> Self {
        Self { config,
               capabilities: flavors.capabilities().clone(),
               flavors,
               stacks }
    }

    pub fn config(&self) -> &StackflowConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Arc<TypeCapabilityRegistry> {
        &self.capabilities
    }

    pub fn flavors(&self) -> &Arc<FlavorRegistry> {
        &self.flavors
    }

    pub fn stacks(&self) -> &dyn StackStore {
        self.stacks.as_ref()
    }

    /// Ejecuta sobre un stack ya obtenido. El flag de cache del config global
    /// puede apagar el cache de cualquier run.
    pub fn deploy(&self, stack: &Stack, graph: &StepGraph, mut run: RunConfig) -> Result<RunHandle, StackError> {
        run.enable_cache = run.enable_cache && self.config.enable_cache;
        deploy(graph, stack, &self.capabilities, run)
    }

    pub fn deploy_on(&self, stack_name: &str, graph: &StepGraph, run: RunConfig) -> Result<RunHandle, StackError> {
        let stack = self.stacks.get_stack(stack_name)?;
        self.deploy(&stack, graph, run)
    }

    /// Ejecuta sobre el stack activo de `scope` (o del scope por defecto).
    pub fn deploy_active(&self, scope: Option<&str>, graph: &StepGraph, run: RunConfig) -> Result<RunHandle, StackError> {
        let scope = scope.unwrap_or(&self.config.default_scope);
        let stack = self.stacks.active_stack(scope)?;
        self.deploy(&stack, graph, run)
    }

    pub fn reader<'s>(&self, stack: &'s Stack) -> Result<MetadataGraphReader<'s>, StackError> {
        Ok(MetadataGraphReader::new(stack.metadata_store()?))
    }

    pub fn read_artifact(&self, stack: &Stack, artifact: &ArtifactView) -> Result<Payload, StackError> {
        self.reader(stack)?.read_artifact(artifact, stack.artifact_store()?, &self.capabilities)
    }

    /// Provisiona y espera cada servicio de fondo del stack.
    pub fn provision_services(&self, stack: &Stack) -> Result<usize, StackError> {
        let policy = LivenessPolicy::from_config(&self.config);
        let mut provisioned = 0;
        for kind in stack.kinds() {
            let Some(component) = stack.component(kind) else {
                continue;
            };
            if let Some(service) = component.as_service() {
                provision_and_wait(service, &policy)?;
                info!("service '{}' of stack '{}' is running", service.name(), stack.name());
                provisioned += 1;
            }
        }
        Ok(provisioned)
    }
}

impl std::fmt::Debug for StackflowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackflowContext")
         .field("config", &self.config)
         .field("flavors", &self.flavors)
         .field("stacks", &self.stacks.list_stacks())
         .finish()
    }
}
