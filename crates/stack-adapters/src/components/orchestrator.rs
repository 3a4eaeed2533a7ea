use std::sync::Arc;
use std::time::Instant;

use log::debug;
use stack_core::{ComponentRecord, Orchestrator, StackComponent, StackError, StepContext, StepDefinition, StepRunResult};

/// Ejecuta cada step en el hilo del caller.
#[derive(Debug)]
pub struct LocalOrchestrator {
    record: ComponentRecord,
}

impl LocalOrchestrator {
    pub fn new(record: ComponentRecord) -> Self {
        Self { record }
    }

    pub fn factory(record: ComponentRecord) -> Result<Arc<dyn StackComponent>, StackError> {
        Ok(Arc::new(Self::new(record)))
    }
}

impl Orchestrator for LocalOrchestrator {
    fn run_step(&self, step: &dyn StepDefinition, ctx: &StepContext) -> StepRunResult {
        let started = Instant::now();
        let result = step.run(ctx);
        debug!("[{}] step '{}' of run '{}' finished in {:?} (success={})",
               self.record.name,
               ctx.step_name,
               ctx.run_name,
               started.elapsed(),
               result.is_success());
        result
    }
}

impl StackComponent for LocalOrchestrator {
    fn record(&self) -> &ComponentRecord {
        &self.record
    }

    fn as_orchestrator(&self) -> Option<&dyn Orchestrator> {
        Some(self)
    }
}
