//! Componentes en proceso.

mod orchestrator;
mod record_only;
mod stores;

pub use orchestrator::LocalOrchestrator;
pub use record_only::{ContainerStepOperator, RecordOnlyComponent};
pub use stores::{MemoryArtifactStore, MemoryMetadataStore};
