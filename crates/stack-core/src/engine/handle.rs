use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

use crate::reader::RunStatus;

/// Opciones de un run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// `None` genera `<pipeline>-<timestamp>`.
    pub run_name: Option<String>,
    /// step -> parámetros que se fusionan sobre los defaults del step.
    pub step_overrides: BTreeMap<String, Value>,
    pub enable_cache: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { run_name: None,
               step_overrides: BTreeMap::new(),
               enable_cache: true }
    }
}

impl RunConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self { run_name: Some(name.into()),
               ..Self::default() }
    }

    pub fn with_override(mut self, step: &str, params: Value) -> Self {
        self.step_overrides.insert(step.to_string(), params);
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.enable_cache = enabled;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Cached { execution_id: Uuid, source: Uuid },
    Completed { execution_id: Uuid },
    Failed { execution_id: Uuid, error: String },
    /// No se ejecutó porque un step anterior falló.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub name: String,
    pub outcome: StepOutcome,
    /// output -> artifact (nuevo o aliasado).
    pub outputs: BTreeMap<String, Uuid>,
}

impl StepReport {
    pub fn execution_id(&self) -> Option<Uuid> {
        match &self.outcome {
            StepOutcome::Cached { execution_id, .. }
            | StepOutcome::Completed { execution_id }
            | StepOutcome::Failed { execution_id, .. } => Some(*execution_id),
            StepOutcome::Skipped => None,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self.outcome, StepOutcome::Cached { .. })
    }
}

/// Resultado de `deploy`. Una falla de step es un dato: `status` queda en
/// `Failed` y el detalle está en el reporte del step.
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub run_id: Uuid,
    pub run_name: String,
    pub pipeline_id: Uuid,
    pub pipeline_name: String,
    pub status: RunStatus,
    pub steps: Vec<StepReport>,
}

impl RunHandle {
    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn execution_id(&self, step: &str) -> Option<Uuid> {
        self.step(step).and_then(StepReport::execution_id)
    }

    pub fn cached_steps(&self) -> Vec<&str> {
        self.steps.iter().filter(|s| s.is_cached()).map(|s| s.name.as_str()).collect()
    }

    pub fn fresh_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Completed { .. } | StepOutcome::Failed { .. }))
            .map(|s| s.name.as_str())
            .collect()
    }
}
