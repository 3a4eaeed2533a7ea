//! Runner: ejecuta un plan sobre un stack, decide cache por step y registra
//! la procedencia en el ledger del stack.

mod handle;
mod runner;

pub use handle::{RunConfig, RunHandle, StepOutcome, StepReport};
pub use runner::deploy;
