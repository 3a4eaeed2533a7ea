//! Plan de ejecución: validación del step-graph contra el stack y orden
//! topológico determinista.

mod builder;
mod plan;

pub use builder::ExecutionGraphBuilder;
pub use plan::{ExecutionPlan, PlannedStep};
