//! Registros centrales: flavors de componentes y producers por tipo de
//! payload. Ambos se pueblan explícitamente (bundles de plugins), nunca como
//! efecto lateral de declarar un tipo.

pub mod capability;
pub mod flavor;

pub use capability::{Producer, ProducerDescriptor, TypeCapabilityRegistry, TypeTaxonomy};
pub use flavor::{ComponentFactory, FlavorRegistry, PluginBundle};
