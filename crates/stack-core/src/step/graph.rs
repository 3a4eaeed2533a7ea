use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::StepDefinition;
use crate::errors::StackError;

/// Step-graph nombrado ("pipeline"). Conserva el orden de declaración, que es
/// el desempate del orden topológico.
#[derive(Clone)]
pub struct StepGraph {
    name: String,
    steps: IndexMap<String, Arc<dyn StepDefinition>>,
}

impl StepGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(),
               steps: IndexMap::new() }
    }

    pub fn add_step(&mut self, step: Arc<dyn StepDefinition>) -> Result<(), StackError> {
        let name = step.name().to_string();
        if self.steps.contains_key(&name) {
            return Err(StackError::InvalidGraph(format!("duplicate step name '{name}'")));
        }
        self.steps.insert(name, step);
        Ok(())
    }

    pub fn with_step<S>(mut self, step: S) -> Result<Self, StackError>
        where S: StepDefinition + 'static
    {
        self.add_step(Arc::new(step))?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step(&self, name: &str) -> Option<&Arc<dyn StepDefinition>> {
        self.steps.get(name)
    }

    pub fn steps(&self) -> impl Iterator<Item = &Arc<dyn StepDefinition>> {
        self.steps.values()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Debug for StepGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepGraph")
         .field("name", &self.name)
         .field("steps", &self.steps.keys().collect::<Vec<_>>())
         .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{FnStep, StepRunResult, StepSpec};

    fn noop(name: &str) -> FnStep {
        FnStep::new(StepSpec::new(name), |_| StepRunResult::success(Vec::<(String, _)>::new()))
    }

    #[test]
    fn duplicate_step_names_are_rejected() {
        let graph = StepGraph::new("p").with_step(noop("a")).unwrap();
        let err = graph.with_step(noop("a")).err().unwrap();
        assert!(matches!(err, StackError::InvalidGraph(msg) if msg.contains("'a'")));
    }
}
