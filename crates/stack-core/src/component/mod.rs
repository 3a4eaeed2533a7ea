//! Interfaces de los componentes que el core necesita de sus colaboradores.
//!
//! Las implementaciones concretas (backends reales) viven fuera del core; aquí
//! sólo está el contrato y las variantes en memoria usadas como referencia.

pub mod artifact_store;
pub mod orchestrator;

use std::fmt::Debug;

pub use artifact_store::{ArtifactStore, InMemoryArtifactStore};
pub use orchestrator::Orchestrator;

use crate::ledger::MetadataStore;
use crate::model::ComponentRecord;
use crate::service::ServiceLifecycle;
use crate::stack::StackValidator;

/// Instancia viva de un componente, construida por la factory de su flavor.
///
/// Los accesos `as_*` exponen la capacidad que el stack necesita según el
/// `kind` del registro; `Stack::assemble` rechaza un componente obligatorio que
/// no exponga la suya.
pub trait StackComponent: Send + Sync + Debug {
    fn record(&self) -> &ComponentRecord;

    /// Validador evaluado contra el stack completo durante el ensamblado.
    fn validator(&self) -> Option<StackValidator> {
        None
    }

    fn as_orchestrator(&self) -> Option<&dyn Orchestrator> {
        None
    }

    fn as_artifact_store(&self) -> Option<&dyn ArtifactStore> {
        None
    }

    fn as_metadata_store(&self) -> Option<&dyn MetadataStore> {
        None
    }

    /// Servicio de fondo asociado (p.ej. un daemon local de metadata).
    fn as_service(&self) -> Option<&dyn ServiceLifecycle> {
        None
    }
}
