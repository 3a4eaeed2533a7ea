//! stackflow
//!
//! Punto de entrada de la librería: arma el `StackflowContext` con los
//! bundles built-in y, si hay `home_dir` configurado, con el store
//! persistente en disco.
//!
//! Los crates del workspace se re-exportan para que un cliente pueda depender
//! sólo de éste.

use std::sync::Arc;

use log::info;
pub use stack_adapters;
pub use stack_core;
use stack_core::{ComponentKind, Configuration, FlavorRegistry, InMemoryStackStore, Stack, StackDefinition, StackError, StackStore,
                 StackflowConfig, StackflowContext, TypeCapabilityRegistry};
pub use stack_persistence;
use stack_persistence::FileStackStore;

/// Nombre del stack que `ensure_default_stack` crea y activa.
pub const DEFAULT_STACK: &str = "default";

/// Construye el contexto de runtime: registries, bundles built-in y store.
pub fn bootstrap(config: StackflowConfig) -> Result<StackflowContext, StackError> {
    let capabilities = Arc::new(TypeCapabilityRegistry::new());
    let flavors = Arc::new(FlavorRegistry::new(capabilities));
    stack_adapters::install_builtin(&flavors)?;

    let stacks: Arc<dyn StackStore> = match &config.home_dir {
        Some(home) => {
            info!("using persistent stack store under {}", home.display());
            Arc::new(FileStackStore::open_in_home(&config, flavors.clone())?)
        }
        None => Arc::new(InMemoryStackStore::new(flavors.clone())),
    };
    Ok(StackflowContext::with_store(config, flavors, stacks))
}

/// Garantiza un stack local (`local` + `memory` + `memory`) llamado
/// `default`, activo en el scope por defecto si ese scope no tiene ninguno.
/// Idempotente.
pub fn ensure_default_stack(ctx: &StackflowContext) -> Result<Arc<Stack>, StackError> {
    let store = ctx.stacks();
    if let Ok(stack) = store.get_stack(DEFAULT_STACK) {
        return Ok(stack);
    }
    let wanted = [(ComponentKind::Orchestrator, "local"),
                  (ComponentKind::ArtifactStore, "memory"),
                  (ComponentKind::MetadataStore, "memory")];
    let mut definition = StackDefinition::new();
    for (kind, flavor) in wanted {
        if store.get_component(kind, DEFAULT_STACK).is_err() {
            store.register_component(kind, flavor, DEFAULT_STACK, Configuration::new())?;
        }
        definition.insert(kind, DEFAULT_STACK.to_string());
    }
    let stack = store.register_stack(DEFAULT_STACK, &definition)?;
    let scope = &ctx.config().default_scope;
    if store.active_stack(scope).is_err() {
        store.set_active_stack(DEFAULT_STACK, scope)?;
    }
    Ok(stack)
}
