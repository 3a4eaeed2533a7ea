//! Registro de componentes y stacks nombrados.
//!
//! Las instancias vivas se construyen una sola vez, al registrar el
//! componente, y se comparten entre todos los stacks que lo referencian.
//! Un stack sólo se almacena si `Stack::assemble` lo acepta.

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::Stack;
use crate::component::StackComponent;
use crate::errors::StackError;
use crate::model::{ComponentKind, ComponentRecord, Configuration};
use crate::registry::FlavorRegistry;

/// Definición declarativa de un stack: kind -> nombre del componente.
pub type StackDefinition = IndexMap<ComponentKind, String>;

/// Estado serializable completo de un store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// En orden de registro.
    pub components: Vec<ComponentRecord>,
    pub stacks: IndexMap<String, StackDefinition>,
    /// scope -> nombre del stack activo.
    pub active: BTreeMap<String, String>,
}

pub trait StackStore: Send + Sync {
    /// Registra un componente nuevo; `(kind, name)` no puede existir.
    fn register_component(&self,
                          kind: ComponentKind,
                          flavor: &str,
                          name: &str,
                          configuration: Configuration)
                          -> Result<ComponentRecord, StackError>;

    fn get_component(&self, kind: ComponentKind, name: &str) -> Result<ComponentRecord, StackError>;

    /// Componentes en orden de registro, opcionalmente filtrados por kind.
    fn list_components(&self, kind: Option<ComponentKind>) -> Vec<ComponentRecord>;

    /// Falla con `InUse` si algún stack lo referencia.
    fn deregister_component(&self, kind: ComponentKind, name: &str) -> Result<(), StackError>;

    /// Ensambla y guarda un stack nuevo. Un nombre existente es `AlreadyExists`.
    fn register_stack(&self, name: &str, definition: &StackDefinition) -> Result<Arc<Stack>, StackError>;

    /// Igual que `register_stack` pero sobrescribe un stack existente.
    fn replace_stack(&self, name: &str, definition: &StackDefinition) -> Result<Arc<Stack>, StackError>;

    fn get_stack(&self, name: &str) -> Result<Arc<Stack>, StackError>;

    fn stack_definition(&self, name: &str) -> Result<StackDefinition, StackError>;

    fn list_stacks(&self) -> Vec<String>;

    /// Falla con `InUse` si el stack está activo en algún scope.
    fn deregister_stack(&self, name: &str) -> Result<(), StackError>;

    fn set_active_stack(&self, name: &str, scope: &str) -> Result<(), StackError>;

    fn active_stack(&self, scope: &str) -> Result<Arc<Stack>, StackError>;

    fn snapshot(&self) -> StoreSnapshot;
}

struct Registered {
    record: ComponentRecord,
    instance: Arc<dyn StackComponent>,
}

struct StoredStack {
    definition: StackDefinition,
    stack: Arc<Stack>,
}

#[derive(Default)]
struct StoreState {
    components: IndexMap<(ComponentKind, String), Registered>,
    stacks: IndexMap<String, StoredStack>,
    active: BTreeMap<String, String>,
}

pub struct InMemoryStackStore {
    flavors: Arc<FlavorRegistry>,
    state: RwLock<StoreState>,
}

impl InMemoryStackStore {
    pub fn new(flavors: Arc<FlavorRegistry>) -> Self {
        Self { flavors,
               state: RwLock::new(StoreState::default()) }
    }

    /// Reconstruye un store a partir de un snapshot, conservando los ids de
    /// los componentes y re-ensamblando (y re-validando) cada stack.
    pub fn restore(flavors: Arc<FlavorRegistry>, snapshot: &StoreSnapshot) -> Result<Self, StackError> {
        let store = Self::new(flavors);
        for record in &snapshot.components {
            store.adopt_component(record.clone())?;
        }
        for (name, definition) in &snapshot.stacks {
            store.register_stack(name, definition)?;
        }
        for (scope, name) in &snapshot.active {
            store.set_active_stack(name, scope)?;
        }
        Ok(store)
    }

    pub fn flavors(&self) -> &Arc<FlavorRegistry> {
        &self.flavors
    }

    /// Registra un registro ya formado, conservando su id.
    pub fn adopt_component(&self, record: ComponentRecord) -> Result<ComponentRecord, StackError> {
        let key = (record.kind, record.name.clone());
        if self.state.read().components.contains_key(&key) {
            return Err(component_exists(record.kind, &record.name));
        }
        // La factory puede disparar la activación de bundles: fuera del lock.
        let instance = self.flavors.instantiate(record.clone())?;
        let mut state = self.state.write();
        if state.components.contains_key(&key) {
            return Err(component_exists(record.kind, &record.name));
        }
        state.components.insert(key,
                                Registered { record: record.clone(),
                                             instance });
        info!("registered {} component '{}' (flavor '{}')", record.kind, record.name, record.flavor);
        Ok(record)
    }

    fn build_stack(&self, name: &str, definition: &StackDefinition) -> Result<Stack, StackError> {
        let mut picked: Vec<(usize, Arc<dyn StackComponent>)> = Vec::with_capacity(definition.len());
        {
            let state = self.state.read();
            for (kind, component_name) in definition {
                let key = (*kind, component_name.clone());
                match state.components.get_full(&key) {
                    Some((index, _, registered)) => picked.push((index, registered.instance.clone())),
                    None => {
                        let known = names_of_kind(&state, *kind);
                        return Err(StackError::not_found(&format!("{kind} component"), component_name.as_str(), known));
                    }
                }
            }
        }
        picked.sort_by_key(|(index, _)| *index);
        // Los validadores son código de terceros: se evalúan sin lock tomado.
        Stack::assemble(name, picked.into_iter().map(|(_, c)| c).collect())
    }

    fn store_stack(&self, name: &str, definition: &StackDefinition, replace: bool) -> Result<Arc<Stack>, StackError> {
        if !replace && self.state.read().stacks.contains_key(name) {
            return Err(StackError::already_exists("stack", name));
        }
        let stack = Arc::new(self.build_stack(name, definition)?);
        let mut state = self.state.write();
        if !replace && state.stacks.contains_key(name) {
            return Err(StackError::already_exists("stack", name));
        }
        state.stacks.insert(name.to_string(),
                            StoredStack { definition: definition.clone(),
                                          stack: stack.clone() });
        info!("{} stack '{name}'", if replace { "stored (replace)" } else { "registered" });
        Ok(stack)
    }
}

fn component_exists(kind: ComponentKind, name: &str) -> StackError {
    StackError::already_exists(&format!("{kind} component"), name)
}

fn names_of_kind(state: &StoreState, kind: ComponentKind) -> Vec<String> {
    state.components.keys().filter(|(k, _)| *k == kind).map(|(_, n)| n.clone()).collect()
}

impl StackStore for InMemoryStackStore {
    fn register_component(&self,
                          kind: ComponentKind,
                          flavor: &str,
                          name: &str,
                          configuration: Configuration)
                          -> Result<ComponentRecord, StackError> {
        self.adopt_component(ComponentRecord::new(kind, flavor, name, configuration))
    }

    fn get_component(&self, kind: ComponentKind, name: &str) -> Result<ComponentRecord, StackError> {
        let state = self.state.read();
        state.components
             .get(&(kind, name.to_string()))
             .map(|r| r.record.clone())
             .ok_or_else(|| StackError::not_found(&format!("{kind} component"), name, names_of_kind(&state, kind)))
    }

    fn list_components(&self, kind: Option<ComponentKind>) -> Vec<ComponentRecord> {
        self.state
            .read()
            .components
            .values()
            .filter(|r| kind.map_or(true, |k| r.record.kind == k))
            .map(|r| r.record.clone())
            .collect()
    }

    fn deregister_component(&self, kind: ComponentKind, name: &str) -> Result<(), StackError> {
        let mut state = self.state.write();
        let key = (kind, name.to_string());
        if !state.components.contains_key(&key) {
            let known = names_of_kind(&state, kind);
            return Err(StackError::not_found(&format!("{kind} component"), name, known));
        }
        let holder = state.stacks
                          .iter()
                          .find(|(_, s)| s.definition.get(&kind).map(String::as_str) == Some(name))
                          .map(|(stack_name, _)| stack_name.clone());
        if let Some(stack_name) = holder {
            return Err(StackError::InUse { what: format!("{kind} component"),
                                           name: name.to_string(),
                                           holder: format!("stack '{stack_name}'") });
        }
        state.components.shift_remove(&key);
        debug!("deregistered {kind} component '{name}'");
        Ok(())
    }

    fn register_stack(&self, name: &str, definition: &StackDefinition) -> Result<Arc<Stack>, StackError> {
        self.store_stack(name, definition, false)
    }

    fn replace_stack(&self, name: &str, definition: &StackDefinition) -> Result<Arc<Stack>, StackError> {
        self.store_stack(name, definition, true)
    }

    fn get_stack(&self, name: &str) -> Result<Arc<Stack>, StackError> {
        let state = self.state.read();
        state.stacks
             .get(name)
             .map(|s| s.stack.clone())
             .ok_or_else(|| StackError::not_found("stack", name, state.stacks.keys().cloned().collect()))
    }

    fn stack_definition(&self, name: &str) -> Result<StackDefinition, StackError> {
        let state = self.state.read();
        state.stacks
             .get(name)
             .map(|s| s.definition.clone())
             .ok_or_else(|| StackError::not_found("stack", name, state.stacks.keys().cloned().collect()))
    }

    fn list_stacks(&self) -> Vec<String> {
        self.state.read().stacks.keys().cloned().collect()
    }

    fn deregister_stack(&self, name: &str) -> Result<(), StackError> {
        let mut state = self.state.write();
        if !state.stacks.contains_key(name) {
            let known = state.stacks.keys().cloned().collect();
            return Err(StackError::not_found("stack", name, known));
        }
        if let Some((scope, _)) = state.active.iter().find(|(_, active)| active.as_str() == name) {
            return Err(StackError::InUse { what: "stack".into(),
                                           name: name.to_string(),
                                           holder: format!("scope '{scope}'") });
        }
        state.stacks.shift_remove(name);
        debug!("deregistered stack '{name}'");
        Ok(())
    }

    fn set_active_stack(&self, name: &str, scope: &str) -> Result<(), StackError> {
        let mut state = self.state.write();
        if !state.stacks.contains_key(name) {
            let known = state.stacks.keys().cloned().collect();
            return Err(StackError::not_found("stack", name, known));
        }
        state.active.insert(scope.to_string(), name.to_string());
        info!("active stack for scope '{scope}' is now '{name}'");
        Ok(())
    }

    fn active_stack(&self, scope: &str) -> Result<Arc<Stack>, StackError> {
        let state = self.state.read();
        let name = state.active
                        .get(scope)
                        .ok_or_else(|| StackError::not_found("active stack for scope", scope, state.active.keys().cloned().collect()))?;
        state.stacks
             .get(name)
             .map(|s| s.stack.clone())
             .ok_or_else(|| StackError::Internal(format!("active stack '{name}' missing from store")))
    }

    fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read();
        StoreSnapshot { components: state.components.values().map(|r| r.record.clone()).collect(),
                        stacks: state.stacks.iter().map(|(n, s)| (n.clone(), s.definition.clone())).collect(),
                        active: state.active.clone() }
    }
}

impl std::fmt::Debug for InMemoryStackStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("InMemoryStackStore")
         .field("components", &state.components.len())
         .field("stacks", &state.stacks.keys().collect::<Vec<_>>())
         .field("active", &state.active)
         .finish()
    }
}
