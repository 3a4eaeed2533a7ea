//! Registro (kind, flavor) -> constructor de componentes, con activación
//! perezosa de bundles de plugins.
//!
//! Contrato de `resolve`: si el flavor no está, se ejecuta una única pasada de
//! activación sobre todos los bundles conocidos y se reintenta exactamente una
//! vez; luego falla con `NotFound` listando los flavors conocidos del kind.
//! Los bundles no deben llamar a `resolve` desde `activate`.

use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, info, warn};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use super::TypeCapabilityRegistry;
use crate::component::StackComponent;
use crate::errors::StackError;
use crate::model::{ComponentKind, ComponentRecord};

/// Construye la instancia viva de un componente a partir de su registro.
pub type ComponentFactory =
    Arc<dyn Fn(ComponentRecord) -> Result<Arc<dyn StackComponent>, StackError> + Send + Sync>;

/// Grupo de flavors y producers que se registran juntos.
pub trait PluginBundle: Send + Sync {
    fn name(&self) -> &str;

    fn activate(&self, flavors: &FlavorRegistry, capabilities: &TypeCapabilityRegistry) -> Result<(), StackError>;
}

struct BundleSlot {
    bundle: Arc<dyn PluginBundle>,
    activated: bool,
}

pub struct FlavorRegistry {
    factories: DashMap<(ComponentKind, String), ComponentFactory>,
    capabilities: Arc<TypeCapabilityRegistry>,
    bundles: RwLock<Vec<BundleSlot>>,
    lazy_pass: OnceCell<()>,
}

impl FlavorRegistry {
    pub fn new(capabilities: Arc<TypeCapabilityRegistry>) -> Self {
        Self { factories: DashMap::new(),
               capabilities,
               bundles: RwLock::new(Vec::new()),
               lazy_pass: OnceCell::new() }
    }

    pub fn capabilities(&self) -> &Arc<TypeCapabilityRegistry> {
        &self.capabilities
    }

    /// Registra un flavor. Sobrescribir uno existente es válido pero se avisa.
    pub fn register(&self, kind: ComponentKind, flavor: &str, factory: ComponentFactory) {
        if self.factories.insert((kind, flavor.to_string()), factory).is_some() {
            warn!("flavor '{flavor}' for {kind} overwritten (last registration wins)");
        } else {
            debug!("flavor registered kind={kind} flavor={flavor}");
        }
    }

    pub fn register_fn<F>(&self, kind: ComponentKind, flavor: &str, factory: F)
        where F: Fn(ComponentRecord) -> Result<Arc<dyn StackComponent>, StackError> + Send + Sync + 'static
    {
        self.register(kind, flavor, Arc::new(factory));
    }

    /// Declara un bundle que se activará en la pasada perezosa.
    pub fn add_bundle(&self, bundle: Arc<dyn PluginBundle>) {
        self.bundles.write().push(BundleSlot { bundle, activated: false });
    }

    /// Activa un bundle de inmediato (rutina de inicialización).
    pub fn activate_bundle(&self, bundle: Arc<dyn PluginBundle>) -> Result<(), StackError> {
        bundle.activate(self, &self.capabilities)?;
        info!("plugin bundle '{}' activated", bundle.name());
        self.bundles.write().push(BundleSlot { bundle, activated: true });
        Ok(())
    }

    /// Activa ya todos los bundles pendientes. Consume la pasada perezosa: un
    /// miss posterior en `resolve` no vuelve a activar nada.
    pub fn activate_all(&self) {
        self.lazy_pass.get_or_init(|| self.activation_pass());
    }

    pub fn resolve(&self, kind: ComponentKind, flavor: &str) -> Result<ComponentFactory, StackError> {
        if let Some(factory) = self.lookup(kind, flavor) {
            return Ok(factory);
        }
        if self.lazy_pass.get().is_none() {
            self.lazy_pass.get_or_init(|| self.activation_pass());
            if let Some(factory) = self.lookup(kind, flavor) {
                return Ok(factory);
            }
        }
        Err(StackError::not_found(&format!("{kind} flavor"), flavor, self.flavors_for(kind)))
    }

    /// Construye la instancia de un registro resolviendo su flavor.
    pub fn instantiate(&self, record: ComponentRecord) -> Result<Arc<dyn StackComponent>, StackError> {
        let factory = self.resolve(record.kind, &record.flavor)?;
        factory(record)
    }

    pub fn flavors_for(&self, kind: ComponentKind) -> Vec<String> {
        let mut names: Vec<String> = self.factories
                                         .iter()
                                         .filter(|e| e.key().0 == kind)
                                         .map(|e| e.key().1.clone())
                                         .collect();
        names.sort();
        names
    }

    fn lookup(&self, kind: ComponentKind, flavor: &str) -> Option<ComponentFactory> {
        self.factories.get(&(kind, flavor.to_string())).map(|f| f.value().clone())
    }

    fn activation_pass(&self) {
        let pending: Vec<Arc<dyn PluginBundle>> = {
            let mut slots = self.bundles.write();
            slots.iter_mut()
                 .filter(|s| !s.activated)
                 .map(|s| {
                     s.activated = true;
                     s.bundle.clone()
                 })
                 .collect()
        };
        for bundle in pending {
            match bundle.activate(self, &self.capabilities) {
                Ok(()) => info!("plugin bundle '{}' activated lazily", bundle.name()),
                Err(e) => warn!("plugin bundle '{}' failed to activate: {e}", bundle.name()),
            }
        }
    }
}

impl std::fmt::Debug for FlavorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlavorRegistry")
         .field("flavors", &self.factories.len())
         .field("bundles", &self.bundles.read().len())
         .finish()
    }
}
