use crate::step::{StepContext, StepDefinition, StepRunResult};

/// Ejecuta steps. El core decide orden y estado de cache; el orquestador sólo
/// recibe, de a uno por run, los steps listos para correr.
pub trait Orchestrator: Send + Sync {
    fn run_step(&self, step: &dyn StepDefinition, ctx: &StepContext) -> StepRunResult;
}
