//! Steps y step-graphs tal como los declara el usuario.

pub mod context;
pub mod definition;
pub mod graph;
pub mod params;

pub use context::{StepContext, StepRunResult};
pub use definition::{FnStep, InputSource, InputSpec, OutputSpec, StepDefinition, StepSpec, DEFAULT_ARTIFACT_TYPE};
pub use graph::StepGraph;
pub use params::merge_json;
