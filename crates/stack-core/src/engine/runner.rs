use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use log::{debug, info, warn};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{RunConfig, RunHandle, StepOutcome, StepReport};
use crate::cache::{CacheDecision, CacheDecisionEngine, CacheQuery};
use crate::component::{ArtifactStore, Orchestrator};
use crate::constants::{CACHE_SOURCE_PROPERTY, DEFINITION_HASH_PROPERTY, ENGINE_VERSION, FAILURE_PROPERTY, PIPELINE_PROPERTY,
                       PLANNED_STEPS_PROPERTY, STACK_PROPERTY, STEP_IDENTITY_KEY};
use crate::errors::StackError;
use crate::graph::{ExecutionGraphBuilder, ExecutionPlan, PlannedStep};
use crate::ledger::MetadataStore;
use crate::model::{ArtifactRecord, ContextKind, ContextRecord, EventDirection, EventRecord, ExecutionRecord, ExecutionStatus,
                   Payload, StepFingerprintInput};
use crate::reader::RunStatus;
use crate::registry::TypeCapabilityRegistry;
use crate::stack::Stack;
use crate::step::{merge_json, InputSource, StepContext, StepGraph, StepRunResult};

/// Ejecuta `graph` sobre `stack`.
///
/// Errores de validación del grafo, de resolución de producers, de overrides y
/// la colisión de nombre de run se devuelven como `Err` antes de crear el
/// contexto del run, así que el nombre queda libre. Una falla del step ya
/// iniciado queda como ejecución `failed` y el handle reporta
/// `RunStatus::Failed`.
pub fn deploy(graph: &StepGraph,
              stack: &Stack,
              capabilities: &TypeCapabilityRegistry,
              config: RunConfig)
              -> Result<RunHandle, StackError> {
    let plan = ExecutionGraphBuilder::build(graph, stack, capabilities)?;
    if let Some(unknown) = config.step_overrides.keys().find(|k| plan.step(k).is_none()) {
        let known = plan.step_names().into_iter().map(str::to_string).collect();
        return Err(StackError::not_found("step", unknown.as_str(), known));
    }
    for (name, value) in &config.step_overrides {
        if !matches!(value, Value::Object(_) | Value::Null) {
            return Err(StackError::InvalidGraph(format!("parameters of step '{name}' must be an object, got {value}")));
        }
    }

    let runner = Runner { plan: &plan,
                          capabilities,
                          metadata: stack.metadata_store()?,
                          orchestrator: stack.orchestrator()?,
                          artifacts: stack.artifact_store()?,
                          config: &config };
    runner.run()
}

struct Runner<'a> {
    plan: &'a ExecutionPlan,
    capabilities: &'a TypeCapabilityRegistry,
    metadata: &'a dyn MetadataStore,
    orchestrator: &'a dyn Orchestrator,
    artifacts: &'a dyn ArtifactStore,
    config: &'a RunConfig,
}

/// Todo lo resuelto de un step antes de tocar el ledger.
struct Prepared<'p> {
    step: &'p PlannedStep,
    user_params: Value,
    inputs: Vec<(String, Uuid)>,
    fingerprint: String,
}

impl<'a> Runner<'a> {
    fn run(&self) -> Result<RunHandle, StackError> {
        let run_name = self.config
                           .run_name
                           .clone()
                           .unwrap_or_else(|| format!("{}-{}", self.plan.pipeline_name, Utc::now().format("%Y_%m_%d-%H_%M_%S_%6f")));

        let mut run_props = BTreeMap::new();
        run_props.insert(PIPELINE_PROPERTY.to_string(), json!(self.plan.pipeline_name));
        run_props.insert(PLANNED_STEPS_PROPERTY.to_string(), json!(self.plan.len()));
        run_props.insert(DEFINITION_HASH_PROPERTY.to_string(), json!(self.plan.definition_hash));
        run_props.insert(STACK_PROPERTY.to_string(), json!(self.plan.stack_name));
        let run = self.metadata.create_context(ContextKind::Run, &run_name, run_props)?;
        let pipeline = self.metadata.ensure_context(ContextKind::Pipeline, &self.plan.pipeline_name, BTreeMap::new())?;
        info!("run '{}' of pipeline '{}' started on stack '{}' ({} steps)",
              run.name,
              pipeline.name,
              self.plan.stack_name,
              self.plan.len());

        // step -> output -> artifact disponible para los steps siguientes
        let mut bound: HashMap<String, BTreeMap<String, ArtifactRecord>> = HashMap::new();
        let mut reports: Vec<StepReport> = Vec::with_capacity(self.plan.len());
        let mut failed = false;
        for step in &self.plan.steps {
            if failed {
                reports.push(StepReport { name: step.name.clone(),
                                          outcome: StepOutcome::Skipped,
                                          outputs: BTreeMap::new() });
                continue;
            }
            let prepared = self.prepare(step, &bound)?;
            let report = self.execute(&prepared, &pipeline, &run)?;
            if matches!(report.outcome, StepOutcome::Failed { .. }) {
                failed = true;
            } else {
                let mut outputs = BTreeMap::new();
                for (name, id) in &report.outputs {
                    let record = self.metadata
                                     .artifact(*id)
                                     .ok_or_else(|| StackError::Internal(format!("artifact {id} missing from ledger")))?;
                    outputs.insert(name.clone(), record);
                }
                bound.insert(step.name.clone(), outputs);
            }
            reports.push(report);
        }

        let status = if failed { RunStatus::Failed } else { RunStatus::Completed };
        info!("run '{}' finished: {:?} (cached: {}, fresh: {})",
              run.name,
              status,
              reports.iter().filter(|r| r.is_cached()).count(),
              reports.iter().filter(|r| matches!(r.outcome, StepOutcome::Completed { .. })).count());
        Ok(RunHandle { run_id: run.id,
                       run_name: run.name,
                       pipeline_id: pipeline.id,
                       pipeline_name: pipeline.name,
                       status,
                       steps: reports })
    }

    /// Resuelve parámetros, inputs y fingerprint. Los producers ya vienen
    /// resueltos en el plan.
    fn prepare<'p>(&self, step: &'p PlannedStep, bound: &HashMap<String, BTreeMap<String, ArtifactRecord>>) -> Result<Prepared<'p>, StackError> {
        let spec = step.definition.spec();
        let overrides = self.config.step_overrides.get(&step.name).cloned().unwrap_or(Value::Null);
        let user_params = match merge_json(&spec.params, &overrides) {
            Value::Null => Value::Object(Map::new()),
            obj @ Value::Object(_) => obj,
            other => {
                return Err(StackError::InvalidGraph(format!("parameters of step '{}' must be an object, got {other}",
                                                            step.name)))
            }
        };

        let mut inputs = Vec::new();
        let mut input_artifacts = BTreeMap::new();
        let mut external_inputs = BTreeMap::new();
        for input in &spec.inputs {
            match &input.source {
                InputSource::Step { step: producer, output } => {
                    let artifact = bound.get(producer)
                                        .and_then(|outs| outs.get(output))
                                        .ok_or_else(|| StackError::Internal(format!("output '{producer}.{output}' not bound")))?;
                    input_artifacts.insert(input.name.as_str(), artifact.id);
                    inputs.push((input.name.clone(), artifact.id));
                }
                InputSource::External(value) => {
                    external_inputs.insert(input.name.as_str(), value);
                }
            }
        }

        let fingerprint = StepFingerprintInput { engine_version: ENGINE_VERSION,
                                                 step_name: &step.name,
                                                 params: &user_params,
                                                 input_artifacts,
                                                 external_inputs }.digest();

        Ok(Prepared { step,
                      user_params,
                      inputs,
                      fingerprint })
    }

    fn execute(&self, prepared: &Prepared<'_>, pipeline: &ContextRecord, run: &ContextRecord) -> Result<StepReport, StackError> {
        let step = prepared.step;
        let spec = step.definition.spec();
        let query = CacheQuery { pipeline_context: pipeline.id,
                                 run_context: run.id,
                                 step_name: &step.name,
                                 fingerprint: &prepared.fingerprint,
                                 declared_outputs: spec.outputs.iter().map(|o| o.name.as_str()).collect(),
                                 enabled: self.config.enable_cache && spec.enable_cache };
        let decision = CacheDecisionEngine::new(self.metadata).decide(&query);

        let mut params = match &prepared.user_params {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        params.insert(STEP_IDENTITY_KEY.to_string(), json!({ "name": step.name }));
        let contexts = vec![pipeline.id, run.id];

        match decision {
            CacheDecision::Cached { source, outputs } => {
                let mut record = ExecutionRecord::new(contexts,
                                                      Value::Object(params),
                                                      ExecutionStatus::Cached,
                                                      Some(prepared.fingerprint.clone()));
                record.properties.insert(CACHE_SOURCE_PROPERTY.to_string(), json!(source.id.to_string()));
                let exec = self.metadata.start_execution(record)?;
                self.record_inputs(exec.id, prepared)?;
                for (name, artifact_id) in &outputs {
                    self.metadata.record_event(EventRecord::new(exec.id, *artifact_id, name.as_str(), EventDirection::Output))?;
                }
                info!("step '{}' cached from execution {}", step.name, source.id);
                Ok(StepReport { name: step.name.clone(),
                                outcome: StepOutcome::Cached { execution_id: exec.id,
                                                               source: source.id },
                                outputs })
            }
            CacheDecision::Fresh { reason } => {
                debug!("step '{}' runs fresh: {reason}", step.name);
                let exec = self.metadata.start_execution(ExecutionRecord::new(contexts,
                                                                              Value::Object(params),
                                                                              ExecutionStatus::Running,
                                                                              Some(prepared.fingerprint.clone())))?;
                self.record_inputs(exec.id, prepared)?;
                let mut outputs = BTreeMap::new();
                let outcome = match self.run_fresh(prepared, &run.name, exec.id, &mut outputs)? {
                    Ok(()) => {
                        self.metadata.finish_execution(exec.id, ExecutionStatus::Completed, BTreeMap::new())?;
                        info!("step '{}' completed ({} outputs)", step.name, outputs.len());
                        StepOutcome::Completed { execution_id: exec.id }
                    }
                    Err(error) => {
                        warn!("step '{}' failed: {error}", step.name);
                        let mut props = BTreeMap::new();
                        props.insert(FAILURE_PROPERTY.to_string(), json!(error));
                        self.metadata.finish_execution(exec.id, ExecutionStatus::Failed, props)?;
                        StepOutcome::Failed { execution_id: exec.id, error }
                    }
                };
                Ok(StepReport { name: step.name.clone(),
                                outcome,
                                outputs })
            }
        }
    }

    fn record_inputs(&self, execution_id: Uuid, prepared: &Prepared<'_>) -> Result<(), StackError> {
        for (name, artifact_id) in &prepared.inputs {
            self.metadata.record_event(EventRecord::new(execution_id, *artifact_id, name.as_str(), EventDirection::Input))?;
        }
        Ok(())
    }

    /// Carga inputs, invoca al orquestador y persiste outputs. El resultado
    /// externo es de infraestructura (ledger); el interno es la falla del step.
    fn run_fresh(&self,
                 prepared: &Prepared<'_>,
                 run_name: &str,
                 execution_id: Uuid,
                 outputs: &mut BTreeMap<String, Uuid>)
                 -> Result<Result<(), String>, StackError> {
        let step = prepared.step;
        let spec = step.definition.spec();

        let mut inputs = BTreeMap::new();
        for input in &spec.inputs {
            let payload = match &input.source {
                InputSource::External(value) => Payload::new(input.payload_type.clone(), value.clone()),
                InputSource::Step { .. } => {
                    let Some(record) = prepared.inputs
                                               .iter()
                                               .find(|(name, _)| *name == input.name)
                                               .and_then(|(_, id)| self.metadata.artifact(*id))
                    else {
                        return Ok(Err(format!("input '{}' has no recorded artifact", input.name)));
                    };
                    // El producer que guardó el artifact es el que sabe leerlo.
                    let loader = match self.capabilities.producer(&record.producer) {
                        Ok(loader) => loader,
                        Err(e) => return Ok(Err(format!("loading input '{}': {e}", input.name))),
                    };
                    match loader.load(&record.payload_type, self.artifacts, &record.uri) {
                        Ok(payload) => payload,
                        Err(e) => return Ok(Err(format!("loading input '{}': {e}", input.name))),
                    }
                }
            };
            inputs.insert(input.name.clone(), payload);
        }

        let ctx = StepContext { step_name: step.name.clone(),
                                run_name: run_name.to_string(),
                                params: prepared.user_params.clone(),
                                inputs };
        let mut produced = match self.orchestrator.run_step(step.definition.as_ref(), &ctx) {
            StepRunResult::Success { outputs } => outputs,
            StepRunResult::Failure { error } => return Ok(Err(error)),
        };

        let mut payloads = Vec::with_capacity(spec.outputs.len());
        for output in &spec.outputs {
            let Some(payload) = produced.shift_remove(&output.name) else {
                return Ok(Err(format!("step did not produce declared output '{}'", output.name)));
            };
            if !self.capabilities.is_subtype(&payload.payload_type, &output.payload_type) {
                return Ok(Err(format!("output '{}' has type {} but {} was declared",
                                      output.name, payload.payload_type, output.payload_type)));
            }
            payloads.push(payload);
        }
        if !produced.is_empty() {
            warn!("step '{}' returned undeclared outputs, ignored: {:?}",
                  step.name,
                  produced.keys().collect::<Vec<_>>());
        }

        for ((output, payload), producer) in spec.outputs.iter().zip(payloads).zip(&step.producers) {
            let artifact_id = Uuid::new_v4();
            let uri = self.artifacts.artifact_uri(run_name, &step.name, &output.name, artifact_id);
            if let Err(e) = producer.save(&payload, self.artifacts, &uri) {
                return Ok(Err(format!("saving output '{}': {e}", output.name)));
            }
            let record = ArtifactRecord { id: artifact_id,
                                          type_name: output.artifact_type.clone(),
                                          uri,
                                          producer: producer.descriptor().id,
                                          payload_type: payload.payload_type.clone(),
                                          properties: BTreeMap::new() };
            self.metadata.record_artifact(record)?;
            self.metadata.record_event(EventRecord::new(execution_id, artifact_id, output.name.as_str(), EventDirection::Output))?;
            outputs.insert(output.name.clone(), artifact_id);
        }
        Ok(Ok(()))
    }
}
