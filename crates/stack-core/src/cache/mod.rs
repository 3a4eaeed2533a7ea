//! Decisión de cache por step.
//!
//! Un step se reutiliza si alguna ejecución previa del mismo pipeline, con el
//! mismo nombre de step y el mismo fingerprint, terminó en `completed` o
//! `cached`. Las ejecuciones en vuelo (`running`) y fallidas nunca son fuente,
//! lo que evita cachear desde un run concurrente que todavía puede fallar.
//! Entre varias candidatas gana la más reciente según el `seq` del ledger que
//! tenga OUTPUT para todos los outputs declarados.

use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use uuid::Uuid;

use crate::ledger::MetadataStore;
use crate::model::{EventDirection, ExecutionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshReason {
    /// Cache deshabilitado para el run o para el step.
    Disabled,
    NoMatch,
    /// Ninguna candidata tiene OUTPUT para todos los outputs declarados.
    IncompleteOutputs,
}

impl fmt::Display for FreshReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
                        FreshReason::Disabled => "cache disabled",
                        FreshReason::NoMatch => "no matching prior execution",
                        FreshReason::IncompleteOutputs => "no prior execution has all declared outputs",
                    })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheDecision {
    /// Reusar: `outputs` mapea nombre de output -> artifact aliasado.
    Cached { source: ExecutionRecord, outputs: BTreeMap<String, Uuid> },
    Fresh { reason: FreshReason },
}

impl CacheDecision {
    pub fn is_cached(&self) -> bool {
        matches!(self, CacheDecision::Cached { .. })
    }
}

/// Datos de la consulta de cache de un step a punto de ejecutarse.
#[derive(Debug, Clone)]
pub struct CacheQuery<'a> {
    pub pipeline_context: Uuid,
    pub run_context: Uuid,
    pub step_name: &'a str,
    pub fingerprint: &'a str,
    pub declared_outputs: Vec<&'a str>,
    pub enabled: bool,
}

pub struct CacheDecisionEngine<'a> {
    metadata: &'a dyn MetadataStore,
}

impl<'a> CacheDecisionEngine<'a> {
    pub fn new(metadata: &'a dyn MetadataStore) -> Self {
        Self { metadata }
    }

    pub fn decide(&self, query: &CacheQuery<'_>) -> CacheDecision {
        if !query.enabled {
            return CacheDecision::Fresh { reason: FreshReason::Disabled };
        }
        let mut candidates: Vec<ExecutionRecord> =
            self.metadata
                .executions_by_fingerprint(query.fingerprint)
                .into_iter()
                .filter(|e| e.step_name() == Some(query.step_name))
                .filter(|e| e.belongs_to(query.pipeline_context) && !e.belongs_to(query.run_context))
                .filter(|e| e.status.is_cache_source())
                .collect();
        if candidates.is_empty() {
            debug!("cache miss step={} fp={}: no match", query.step_name, query.fingerprint);
            return CacheDecision::Fresh { reason: FreshReason::NoMatch };
        }
        candidates.sort_by(|a, b| b.seq.cmp(&a.seq));

        for source in candidates {
            match self.declared_outputs_of(&source, query) {
                Some(outputs) => {
                    debug!("cache hit step={} source={}", query.step_name, source.id);
                    return CacheDecision::Cached { source, outputs };
                }
                None => debug!("cache candidate {} for step={} skipped: incomplete outputs", source.id, query.step_name),
            }
        }
        debug!("cache miss step={}: no candidate has all declared outputs", query.step_name);
        CacheDecision::Fresh { reason: FreshReason::IncompleteOutputs }
    }

    fn declared_outputs_of(&self, source: &ExecutionRecord, query: &CacheQuery<'_>) -> Option<BTreeMap<String, Uuid>> {
        let produced: BTreeMap<String, Uuid> = self.metadata
                                                   .events_by_execution(source.id)
                                                   .into_iter()
                                                   .filter(|ev| ev.direction == EventDirection::Output)
                                                   .map(|ev| (ev.name, ev.artifact_id))
                                                   .collect();
        query.declared_outputs
             .iter()
             .map(|name| produced.get(*name).map(|id| (name.to_string(), *id)))
             .collect()
    }
}
