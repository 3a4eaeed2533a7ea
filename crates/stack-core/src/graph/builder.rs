use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use log::debug;
use serde_json::{json, Value};

use super::{ExecutionPlan, PlannedStep};
use crate::constants::RESERVED_PARAM_PREFIX;
use crate::errors::StackError;
use crate::hashing::hash_value;
use crate::registry::{Producer, TypeCapabilityRegistry};
use crate::stack::Stack;
use crate::step::{InputSource, StepGraph};

pub struct ExecutionGraphBuilder;

impl ExecutionGraphBuilder {
    /// Valida el step-graph y produce el plan:
    /// 1. nombres de inputs/outputs únicos por step y parámetros sin claves
    ///    reservadas;
    /// 2. cada input ligado a exactamente un output existente de otro step (o
    ///    a un valor externo), con tipos compatibles según la taxonomía;
    /// 3. grafo acíclico (Kahn, desempate por orden de declaración);
    /// 4. cada output resuelve a exactamente un producer (pin o tipo);
    /// 5. el stack expone un orquestador.
    ///
    /// Nada de esto toca el ledger: un error aquí no deja rastro de run.
    pub fn build(graph: &StepGraph, stack: &Stack, capabilities: &TypeCapabilityRegistry) -> Result<ExecutionPlan, StackError> {
        if graph.is_empty() {
            return Err(StackError::InvalidGraph(format!("pipeline '{}' has no steps", graph.name())));
        }
        stack.orchestrator()?;

        let mut upstream_of: Vec<Vec<String>> = Vec::with_capacity(graph.len());
        for step in graph.steps() {
            let spec = step.spec();
            check_unique(&spec.name, "input", spec.inputs.iter().map(|i| i.name.as_str()))?;
            check_unique(&spec.name, "output", spec.outputs.iter().map(|o| o.name.as_str()))?;
            check_params(&spec.name, &spec.params)?;

            let mut upstream: Vec<String> = Vec::new();
            for input in &spec.inputs {
                let InputSource::Step { step: producer, output } = &input.source else {
                    continue;
                };
                let producer_step = graph.step(producer).ok_or_else(|| {
                    StackError::InvalidGraph(format!("step '{}' input '{}' binds to unknown step '{producer}'",
                                                     spec.name, input.name))
                })?;
                let declared = producer_step.spec().output_spec(output).ok_or_else(|| {
                    StackError::InvalidGraph(format!("step '{}' input '{}' binds to unknown output '{output}' of step '{producer}'",
                                                     spec.name, input.name))
                })?;
                if !capabilities.is_subtype(&declared.payload_type, &input.payload_type) {
                    return Err(StackError::InvalidGraph(format!("step '{}' input '{}' expects {} but '{producer}.{output}' produces {}",
                                                                spec.name,
                                                                input.name,
                                                                input.payload_type,
                                                                declared.payload_type)));
                }
                if !upstream.contains(producer) {
                    upstream.push(producer.clone());
                }
            }
            upstream_of.push(upstream);
        }

        let order = topological_order(graph, &upstream_of)?;

        let mut producers_of: Vec<Vec<Arc<dyn Producer>>> = Vec::with_capacity(graph.len());
        for step in graph.steps() {
            let spec = step.spec();
            let mut producers = Vec::with_capacity(spec.outputs.len());
            for output in &spec.outputs {
                producers.push(capabilities.resolve_pinned(&output.payload_type, output.producer.as_deref())?);
            }
            producers_of.push(producers);
        }
        let steps: Vec<PlannedStep> = graph.steps()
                                           .zip(upstream_of)
                                           .zip(producers_of)
                                           .map(|((def, upstream), producers)| PlannedStep { name: def.name().to_string(),
                                                                                              upstream,
                                                                                              producers,
                                                                                              definition: def.clone() })
                                           .collect();
        let mut slots: Vec<Option<PlannedStep>> = steps.into_iter().map(Some).collect();
        let ordered: Vec<PlannedStep> = order.into_iter().filter_map(|i| slots[i].take()).collect();

        let definition_hash = definition_hash(graph)?;
        debug!("plan for pipeline '{}' ({}): {:?}",
               graph.name(),
               definition_hash,
               ordered.iter().map(|s| s.name.as_str()).collect::<Vec<_>>());
        Ok(ExecutionPlan { pipeline_name: graph.name().to_string(),
                           definition_hash,
                           stack_name: stack.name().to_string(),
                           steps: ordered })
    }
}

fn check_unique<'a>(step: &str, what: &str, names: impl Iterator<Item = &'a str>) -> Result<(), StackError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(StackError::InvalidGraph(format!("step '{step}' declares {what} '{name}' twice")));
        }
    }
    Ok(())
}

fn check_params(step: &str, params: &Value) -> Result<(), StackError> {
    match params {
        Value::Object(map) => match map.keys().find(|k| k.starts_with(RESERVED_PARAM_PREFIX)) {
            Some(key) => Err(StackError::InvalidGraph(format!("step '{step}' uses reserved parameter '{key}'"))),
            None => Ok(()),
        },
        Value::Null => Ok(()),
        _ => Err(StackError::InvalidGraph(format!("step '{step}' parameters must be an object"))),
    }
}

/// Kahn sobre índices de declaración. Entre los steps listos siempre se toma
/// el de menor índice, así el orden es estable entre corridas.
fn topological_order(graph: &StepGraph, upstream_of: &[Vec<String>]) -> Result<Vec<usize>, StackError> {
    let index: HashMap<&str, usize> = graph.steps().enumerate().map(|(i, s)| (s.name(), i)).collect();
    let mut in_degree: Vec<usize> = upstream_of.iter().map(Vec::len).collect();
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); upstream_of.len()];
    for (consumer, upstream) in upstream_of.iter().enumerate() {
        for producer in upstream {
            if let Some(&p) = index.get(producer.as_str()) {
                successors[p].push(consumer);
            }
        }
    }

    let mut ready: BTreeSet<usize> = in_degree.iter().enumerate().filter(|(_, d)| **d == 0).map(|(i, _)| i).collect();
    let mut order = Vec::with_capacity(upstream_of.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &succ in &successors[next] {
            in_degree[succ] -= 1;
            if in_degree[succ] == 0 {
                ready.insert(succ);
            }
        }
    }

    if order.len() != upstream_of.len() {
        let stuck: Vec<&str> = graph.steps()
                                    .enumerate()
                                    .filter(|(i, _)| in_degree[*i] > 0)
                                    .map(|(_, s)| s.name())
                                    .collect();
        return Err(StackError::InvalidGraph(format!("cycle detected among steps: {}", stuck.join(", "))));
    }
    Ok(order)
}

/// Hash canónico de la declaración completa del grafo.
fn definition_hash(graph: &StepGraph) -> Result<String, StackError> {
    let mut steps = Vec::with_capacity(graph.len());
    for step in graph.steps() {
        steps.push(serde_json::to_value(step.spec()).map_err(|e| StackError::Internal(format!("step spec not serializable: {e}")))?);
    }
    Ok(hash_value(&json!({ "pipeline": graph.name(), "steps": steps })))
}
