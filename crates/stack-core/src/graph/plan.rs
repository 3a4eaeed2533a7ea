use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::registry::Producer;
use crate::step::StepDefinition;

#[derive(Clone)]
pub struct PlannedStep {
    pub name: String,
    /// Steps de los que consume outputs, sin repetidos, en orden de declaración.
    pub upstream: Vec<String>,
    /// Producer resuelto para cada output, en el orden de `spec().outputs`.
    pub producers: Vec<Arc<dyn Producer>>,
    pub definition: Arc<dyn StepDefinition>,
}

impl fmt::Debug for PlannedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannedStep")
         .field("name", &self.name)
         .field("upstream", &self.upstream)
         .field("producers", &self.producers.iter().map(|p| p.descriptor().id).collect::<Vec<_>>())
         .finish()
    }
}

/// Steps en orden topológico estricto, listos para entregarse de a uno al
/// orquestador.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub pipeline_name: String,
    /// Identidad del step-graph, guardada como propiedad del run. El contexto
    /// de pipeline se comparte por `pipeline_name`, no por esta identidad.
    pub definition_hash: String,
    pub stack_name: String,
    pub steps: Vec<PlannedStep>,
}

impl ExecutionPlan {
    pub fn step(&self, name: &str) -> Option<&PlannedStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Clausura transitiva de dependientes de `name` (sin incluirlo), en orden
    /// de plan.
    pub fn downstream_of(&self, name: &str) -> Vec<String> {
        let mut reached: BTreeSet<&str> = BTreeSet::new();
        reached.insert(name);
        let mut out = Vec::new();
        // El orden topológico garantiza que los upstream se visitan antes.
        for step in &self.steps {
            if step.name != name && step.upstream.iter().any(|u| reached.contains(u.as_str())) {
                reached.insert(step.name.as_str());
                out.push(step.name.clone());
            }
        }
        out
    }
}
