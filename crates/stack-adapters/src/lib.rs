//! stack-adapters: colaboradores de referencia enchufables al core.
//!
//! Este crate provee:
//! - Flavors en proceso: orquestador `local`, artifact store y metadata store
//!   `memory`, metadata store `in_process` con servicio de fondo, y
//!   componentes sólo-registro (`default`) para los kinds opcionales.
//! - Un step operator `docker` que exige container registry en el stack,
//!   entregado por un bundle que se activa de forma perezosa.
//! - Producers built-in para `json`, `text`, `number` y `bool`.
//!
//! Nota: ninguno de estos flavors habla con infraestructura real; existen
//! para ejercitar el core de punta a punta.

pub mod bundles;
pub mod components;
pub mod producers;
pub mod service;

pub use bundles::{install_builtin, BuiltinBundle, ContainerBundle};
pub use components::{ContainerStepOperator, LocalOrchestrator, MemoryArtifactStore, MemoryMetadataStore, RecordOnlyComponent};
pub use producers::{BoolProducer, JsonProducer, NumberProducer, TextProducer};
pub use service::{InProcessMetadataService, InProcessMetadataStore};
