//! Reconstrucción de vistas Pipeline -> Run -> Step -> Artifact a partir del
//! ledger plano.
//!
//! El storage sólo guarda ejecuciones, artifacts y eventos; toda relación se
//! deriva al leer:
//! - un run pertenece a un pipeline si alguna de sus ejecuciones está asociada
//!   al contexto del pipeline;
//! - la identidad de un step sale de la clave reservada de parámetros;
//! - el padre de un input sale de la regla "último anterior" sobre eventos
//!   OUTPUT (ver `resolve_parent`).

mod views;

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::component::ArtifactStore;
use crate::constants::{CACHE_SOURCE_PROPERTY, FAILURE_PROPERTY, PLANNED_STEPS_PROPERTY, RESERVED_PARAM_PREFIX};
use crate::errors::StackError;
use crate::ledger::MetadataStore;
use crate::model::{ContextKind, ContextRecord, EventDirection, ExecutionRecord, ExecutionStatus, Payload};
use crate::registry::TypeCapabilityRegistry;

pub use views::{ArtifactView, PipelineView, RunStatus, RunView, StepArtifacts, StepView};

pub struct MetadataGraphReader<'a> {
    metadata: &'a dyn MetadataStore,
}

impl<'a> MetadataGraphReader<'a> {
    pub fn new(metadata: &'a dyn MetadataStore) -> Self {
        Self { metadata }
    }

    pub fn pipelines(&self) -> Vec<PipelineView> {
        self.metadata.contexts_of_kind(ContextKind::Pipeline).into_iter().map(PipelineView::from).collect()
    }

    pub fn get_pipeline(&self, name: &str) -> Result<PipelineView, StackError> {
        self.context(ContextKind::Pipeline, name).map(PipelineView::from)
    }

    /// Runs con al menos una ejecución asociada al contexto del pipeline, en
    /// orden de creación.
    pub fn get_runs_for_pipeline(&self, pipeline: &PipelineView) -> Vec<RunView> {
        let mut run_ids: BTreeSet<Uuid> = BTreeSet::new();
        for exec in self.metadata.executions_by_context(pipeline.id) {
            run_ids.extend(exec.contexts.iter().copied().filter(|c| *c != pipeline.id));
        }
        let mut runs: Vec<ContextRecord> = run_ids.into_iter()
                                                  .filter_map(|id| self.metadata.context(id))
                                                  .filter(|c| c.kind == ContextKind::Run)
                                                  .collect();
        runs.sort_by_key(|c| c.seq);
        runs.into_iter().map(RunView::from).collect()
    }

    pub fn get_run(&self, name: &str) -> Result<RunView, StackError> {
        self.context(ContextKind::Run, name).map(RunView::from)
    }

    /// Una vista por ejecución del run, en orden cronológico.
    pub fn get_steps_for_run(&self, run: &RunView) -> Vec<StepView> {
        let mut executions = self.metadata.executions_by_context(run.id);
        // El storage devuelve orden cronológico inverso.
        executions.reverse();
        executions.into_iter().filter_map(|e| step_view(run.id, e)).collect()
    }

    pub fn get_step(&self, run: &RunView, name: &str) -> Result<StepView, StackError> {
        let steps = self.get_steps_for_run(run);
        let known = steps.iter().map(|s| s.name.clone()).collect();
        steps.into_iter()
             .find(|s| s.name == name)
             .ok_or_else(|| StackError::not_found(&format!("step in run '{}'", run.name), name, known))
    }

    /// Padre productor del artifact `artifact_id` consumido por `execution_id`.
    ///
    /// Se recorren los eventos OUTPUT del artifact, excluyendo los de la propia
    /// ejecución, y se conservan los de ejecuciones que realmente lo
    /// produjeron (`completed`; un alias de cache sólo lo referencia) con `seq`
    /// estrictamente menor al del evento INPUT que lo consume. Gana el último.
    pub fn resolve_parent(&self, execution_id: Uuid, artifact_id: Uuid) -> Option<StepView> {
        let consumed_at = self.metadata
                              .events_by_execution(execution_id)
                              .into_iter()
                              .filter(|ev| ev.direction == EventDirection::Input && ev.artifact_id == artifact_id)
                              .map(|ev| ev.seq)
                              .min()?;
        self.metadata
            .events_by_artifact(artifact_id)
            .into_iter()
            .filter(|ev| ev.direction == EventDirection::Output && ev.execution_id != execution_id && ev.seq < consumed_at)
            .filter_map(|ev| self.metadata.execution(ev.execution_id).map(|exec| (ev.seq, exec)))
            .filter(|(_, exec)| exec.status == ExecutionStatus::Completed)
            .max_by_key(|(seq, _)| *seq)
            .and_then(|(_, exec)| {
                let run_id = self.run_of(&exec)?;
                step_view(run_id, exec)
            })
    }

    /// Inputs y outputs de la ejecución, por nombre de evento. Los inputs se
    /// atribuyen al step que los produjo, no al que los consume.
    pub fn get_step_artifacts(&self, step: &StepView) -> Result<StepArtifacts, StackError> {
        let mut artifacts = StepArtifacts::default();
        for event in self.metadata.events_by_execution(step.execution_id) {
            let record = self.metadata
                             .artifact(event.artifact_id)
                             .ok_or_else(|| StackError::Internal(format!("event references unknown artifact {}", event.artifact_id)))?;
            match event.direction {
                EventDirection::Output => {
                    let view = ArtifactView::new(event.name.clone(), record, Some(step.execution_id));
                    artifacts.outputs.insert(event.name, view);
                }
                EventDirection::Input => {
                    let parent = self.resolve_parent(step.execution_id, record.id).map(|p| p.execution_id);
                    let view = ArtifactView::new(event.name.clone(), record, parent);
                    artifacts.inputs.insert(event.name, view);
                }
            }
        }
        Ok(artifacts)
    }

    /// Steps padre distintos de `step`, en orden de ledger.
    pub fn parent_steps(&self, step: &StepView) -> Vec<StepView> {
        let mut seen = BTreeSet::new();
        let mut parents: Vec<StepView> = self.metadata
                                             .events_by_execution(step.execution_id)
                                             .into_iter()
                                             .filter(|ev| ev.direction == EventDirection::Input)
                                             .filter_map(|ev| self.resolve_parent(step.execution_id, ev.artifact_id))
                                             .filter(|p| seen.insert(p.execution_id))
                                             .collect();
        parents.sort_by_key(|p| p.seq);
        parents
    }

    /// Estado derivado: FAILED si algún step falló; COMPLETED si todos los
    /// planificados terminaron como `completed` o `cached`; si no, RUNNING.
    pub fn run_status(&self, run: &RunView) -> RunStatus {
        let steps = self.get_steps_for_run(run);
        if steps.iter().any(|s| s.status == ExecutionStatus::Failed) {
            return RunStatus::Failed;
        }
        let planned = run.properties
                         .get(PLANNED_STEPS_PROPERTY)
                         .and_then(|v| v.as_u64())
                         .map_or(steps.len(), |n| n as usize);
        let all_done = steps.iter().all(|s| s.status.is_cache_source());
        if all_done && steps.len() >= planned {
            RunStatus::Completed
        } else {
            RunStatus::Running
        }
    }

    /// Lee el contenido de un artifact delegando en el producer que lo escribió.
    pub fn read_artifact(&self,
                         artifact: &ArtifactView,
                         store: &dyn ArtifactStore,
                         capabilities: &TypeCapabilityRegistry)
                         -> Result<Payload, StackError> {
        capabilities.producer(&artifact.producer)?.load(&artifact.payload_type, store, &artifact.uri)
    }

    fn context(&self, kind: ContextKind, name: &str) -> Result<ContextRecord, StackError> {
        self.metadata.context_by_name(kind, name).ok_or_else(|| {
                                                      let known = self.metadata
                                                                      .contexts_of_kind(kind)
                                                                      .into_iter()
                                                                      .map(|c| c.name)
                                                                      .collect();
                                                      let what = match kind {
                                                          ContextKind::Pipeline => "pipeline",
                                                          ContextKind::Run => "run",
                                                      };
                                                      StackError::not_found(what, name, known)
                                                  })
    }

    fn run_of(&self, exec: &ExecutionRecord) -> Option<Uuid> {
        exec.contexts
            .iter()
            .copied()
            .find(|id| self.metadata.context(*id).is_some_and(|c| c.kind == ContextKind::Run))
    }
}

fn step_view(run_id: Uuid, exec: ExecutionRecord) -> Option<StepView> {
    let name = exec.step_name()?.to_string();
    let params = match &exec.parameters {
        serde_json::Value::Object(map) => {
            let visible: serde_json::Map<String, serde_json::Value> =
                map.iter().filter(|(k, _)| !k.starts_with(RESERVED_PARAM_PREFIX)).map(|(k, v)| (k.clone(), v.clone())).collect();
            serde_json::Value::Object(visible)
        }
        other => other.clone(),
    };
    let cache_source = exec.properties
                           .get(CACHE_SOURCE_PROPERTY)
                           .and_then(|v| v.as_str())
                           .and_then(|s| Uuid::parse_str(s).ok());
    let failure = exec.properties.get(FAILURE_PROPERTY).and_then(|v| v.as_str()).map(str::to_string);
    let properties: BTreeMap<String, serde_json::Value> = exec.properties;
    Some(StepView { execution_id: exec.id,
                    run_id,
                    name,
                    status: exec.status,
                    params,
                    fingerprint: exec.fingerprint,
                    start_time: exec.start_time,
                    end_time: exec.end_time,
                    cache_source,
                    failure,
                    properties,
                    seq: exec.seq })
}
