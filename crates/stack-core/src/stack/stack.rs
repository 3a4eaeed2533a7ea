//! Stack: bundle nombrado y validado con un componente por kind.
//!
//! Invariantes:
//! - orchestrator, artifact store y metadata store presentes exactamente una
//!   vez; el resto de los kinds, a lo sumo una vez;
//! - cada validador de componente acepta el conjunto completo.
//!
//! `assemble` es todo o nada: nunca devuelve un stack parcialmente válido.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;

use crate::component::{ArtifactStore, Orchestrator, StackComponent};
use crate::errors::StackError;
use crate::ledger::MetadataStore;
use crate::model::{ComponentKind, ComponentRecord};

#[derive(Clone)]
pub struct Stack {
    name: String,
    components: IndexMap<ComponentKind, Arc<dyn StackComponent>>,
}

impl Stack {
    /// Ensambla y valida. Los validadores se evalúan en el orden en que vienen
    /// los componentes (orden de registro) y el primero que falla aborta.
    pub fn assemble(name: impl Into<String>, components: Vec<Arc<dyn StackComponent>>) -> Result<Self, StackError> {
        let name = name.into();
        let mut by_kind: IndexMap<ComponentKind, Arc<dyn StackComponent>> = IndexMap::new();
        for component in components {
            let kind = component.record().kind;
            if by_kind.insert(kind, component).is_some() {
                return Err(StackError::DuplicateKind(kind));
            }
        }

        let missing: Vec<ComponentKind> =
            ComponentKind::MANDATORY.iter().copied().filter(|k| !by_kind.contains_key(k)).collect();
        if !missing.is_empty() {
            return Err(StackError::MissingComponent { kinds: missing });
        }

        for component in by_kind.values() {
            check_capability(component.as_ref())?;
        }

        let stack = Stack { name, components: by_kind };
        for component in stack.components.values() {
            if let Some(validator) = component.validator() {
                validator.validate(&stack)
                         .map_err(|reason| StackError::StackValidation { component: component.record().name.clone(),
                                                                         reason })?;
            }
        }
        debug!("stack '{}' assembled with {} components", stack.name, stack.components.len());
        Ok(stack)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component(&self, kind: ComponentKind) -> Option<&Arc<dyn StackComponent>> {
        self.components.get(&kind)
    }

    pub fn kinds(&self) -> Vec<ComponentKind> {
        self.components.keys().copied().collect()
    }

    /// Registros de los componentes, por kind, en orden de registro.
    pub fn records(&self) -> IndexMap<ComponentKind, ComponentRecord> {
        self.components.iter().map(|(k, c)| (*k, c.record().clone())).collect()
    }

    pub fn orchestrator(&self) -> Result<&dyn Orchestrator, StackError> {
        self.mandatory(ComponentKind::Orchestrator)?
            .as_orchestrator()
            .ok_or_else(|| StackError::Internal("orchestrator capability vanished".into()))
    }

    pub fn artifact_store(&self) -> Result<&dyn ArtifactStore, StackError> {
        self.mandatory(ComponentKind::ArtifactStore)?
            .as_artifact_store()
            .ok_or_else(|| StackError::Internal("artifact store capability vanished".into()))
    }

    pub fn metadata_store(&self) -> Result<&dyn MetadataStore, StackError> {
        self.mandatory(ComponentKind::MetadataStore)?
            .as_metadata_store()
            .ok_or_else(|| StackError::Internal("metadata store capability vanished".into()))
    }

    fn mandatory(&self, kind: ComponentKind) -> Result<&dyn StackComponent, StackError> {
        self.components
            .get(&kind)
            .map(|c| c.as_ref())
            .ok_or(StackError::MissingComponent { kinds: vec![kind] })
    }
}

fn check_capability(component: &dyn StackComponent) -> Result<(), StackError> {
    let record = component.record();
    let exposed = match record.kind {
        ComponentKind::Orchestrator => component.as_orchestrator().is_some(),
        ComponentKind::ArtifactStore => component.as_artifact_store().is_some(),
        ComponentKind::MetadataStore => component.as_metadata_store().is_some(),
        _ => true,
    };
    if exposed {
        Ok(())
    } else {
        Err(StackError::StackValidation { component: record.name.clone(),
                                          reason: format!("flavor '{}' does not implement the {} interface",
                                                          record.flavor, record.kind) })
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.components
                                     .iter()
                                     .map(|(k, c)| format!("{k}={}", c.record().name))
                                     .collect();
        f.debug_struct("Stack").field("name", &self.name).field("components", &names).finish()
    }
}
