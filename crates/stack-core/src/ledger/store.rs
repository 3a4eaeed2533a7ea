use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use indexmap::IndexMap;
use log::debug;
use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use super::{LedgerEntry, LedgerRecordKind};
use crate::errors::StackError;
use crate::model::{ArtifactRecord, ContextKind, ContextRecord, EventRecord, ExecutionRecord, ExecutionStatus};

/// Almacenamiento de metadata append-only con índices de consulta.
///
/// `append` valida y asigna `seq` de forma atómica: dos runs independientes
/// pueden escribir concurrentemente sin coordinación externa.
pub trait MetadataStore: Send + Sync {
    /// Agrega un registro y devuelve la entrada con `seq` asignado (también
    /// copiado dentro del registro cuando éste lo lleva).
    fn append(&self, kind: LedgerRecordKind) -> Result<LedgerEntry, StackError>;

    fn context(&self, id: Uuid) -> Option<ContextRecord>;

    fn context_by_name(&self, kind: ContextKind, name: &str) -> Option<ContextRecord>;

    /// En orden de creación.
    fn contexts_of_kind(&self, kind: ContextKind) -> Vec<ContextRecord>;

    /// Estado plegado (inicio + finalización) de la ejecución.
    fn execution(&self, id: Uuid) -> Option<ExecutionRecord>;

    /// Orden cronológico inverso, como devuelven los backends reales.
    fn executions_by_context(&self, context_id: Uuid) -> Vec<ExecutionRecord>;

    fn executions_by_fingerprint(&self, fingerprint: &str) -> Vec<ExecutionRecord>;

    fn artifact(&self, id: Uuid) -> Option<ArtifactRecord>;

    /// En orden de ledger.
    fn events_by_execution(&self, execution_id: Uuid) -> Vec<EventRecord>;

    /// En orden de ledger.
    fn events_by_artifact(&self, artifact_id: Uuid) -> Vec<EventRecord>;

    fn entries(&self) -> Vec<LedgerEntry>;

    /// Crea un contexto; `AlreadyExists` si el nombre ya está tomado para ese
    /// kind. La verificación ocurre dentro de `append`, sin ventana de carrera.
    fn create_context(&self, kind: ContextKind, name: &str, properties: BTreeMap<String, Value>) -> Result<ContextRecord, StackError> {
        match self.append(LedgerRecordKind::ContextCreated(ContextRecord::new(kind, name, properties)))?.kind {
            LedgerRecordKind::ContextCreated(ctx) => Ok(ctx),
            other => Err(unexpected("ContextCreated", &other)),
        }
    }

    /// Devuelve el contexto existente o lo crea.
    fn ensure_context(&self, kind: ContextKind, name: &str, properties: BTreeMap<String, Value>) -> Result<ContextRecord, StackError> {
        if let Some(existing) = self.context_by_name(kind, name) {
            return Ok(existing);
        }
        match self.create_context(kind, name, properties) {
            Err(StackError::AlreadyExists { .. }) => self.context_by_name(kind, name)
                                                        .ok_or_else(|| StackError::Internal(format!("context '{name}' vanished"))),
            other => other,
        }
    }

    fn start_execution(&self, record: ExecutionRecord) -> Result<ExecutionRecord, StackError> {
        match self.append(LedgerRecordKind::ExecutionStarted(record))?.kind {
            LedgerRecordKind::ExecutionStarted(exec) => Ok(exec),
            other => Err(unexpected("ExecutionStarted", &other)),
        }
    }

    fn record_artifact(&self, record: ArtifactRecord) -> Result<ArtifactRecord, StackError> {
        match self.append(LedgerRecordKind::ArtifactRecorded(record))?.kind {
            LedgerRecordKind::ArtifactRecorded(artifact) => Ok(artifact),
            other => Err(unexpected("ArtifactRecorded", &other)),
        }
    }

    fn record_event(&self, record: EventRecord) -> Result<EventRecord, StackError> {
        match self.append(LedgerRecordKind::EventRecorded(record))?.kind {
            LedgerRecordKind::EventRecorded(event) => Ok(event),
            other => Err(unexpected("EventRecorded", &other)),
        }
    }

    fn finish_execution(&self,
                        execution_id: Uuid,
                        status: ExecutionStatus,
                        properties: BTreeMap<String, Value>)
                        -> Result<LedgerEntry, StackError> {
        self.append(LedgerRecordKind::ExecutionFinished { execution_id,
                                                          status,
                                                          end_time: Utc::now(),
                                                          properties })
    }
}

fn unexpected(expected: &str, got: &LedgerRecordKind) -> StackError {
    StackError::Internal(format!("ledger returned {got:?} while appending {expected}"))
}

#[derive(Default)]
struct LedgerState {
    entries: Vec<LedgerEntry>,
    contexts: IndexMap<Uuid, ContextRecord>,
    context_names: HashMap<(ContextKind, String), Uuid>,
    executions: HashMap<Uuid, ExecutionRecord>,
    executions_by_context: HashMap<Uuid, Vec<Uuid>>,
    executions_by_fingerprint: HashMap<String, Vec<Uuid>>,
    artifacts: HashMap<Uuid, ArtifactRecord>,
    events_by_execution: HashMap<Uuid, Vec<EventRecord>>,
    events_by_artifact: HashMap<Uuid, Vec<EventRecord>>,
}

impl LedgerState {
    /// Valida el registro contra el estado actual, asigna `seq` y actualiza
    /// los índices. No modifica nada si la validación falla.
    fn apply(&mut self, kind: LedgerRecordKind) -> Result<LedgerEntry, StackError> {
        let seq = self.entries.len() as u64 + 1;
        let kind = match kind {
            LedgerRecordKind::ContextCreated(mut ctx) => {
                let key = (ctx.kind, ctx.name.clone());
                if self.context_names.contains_key(&key) {
                    return Err(StackError::already_exists(context_what(ctx.kind), ctx.name));
                }
                ctx.seq = seq;
                self.context_names.insert(key, ctx.id);
                self.contexts.insert(ctx.id, ctx.clone());
                LedgerRecordKind::ContextCreated(ctx)
            }
            LedgerRecordKind::ExecutionStarted(mut exec) => {
                if self.executions.contains_key(&exec.id) {
                    return Err(StackError::already_exists("execution", exec.id.to_string()));
                }
                if let Some(missing) = exec.contexts.iter().find(|c| !self.contexts.contains_key(*c)) {
                    return Err(StackError::not_found("context", missing.to_string(), Vec::new()));
                }
                exec.seq = seq;
                for ctx in &exec.contexts {
                    self.executions_by_context.entry(*ctx).or_default().push(exec.id);
                }
                if let Some(fp) = &exec.fingerprint {
                    self.executions_by_fingerprint.entry(fp.clone()).or_default().push(exec.id);
                }
                self.executions.insert(exec.id, exec.clone());
                LedgerRecordKind::ExecutionStarted(exec)
            }
            LedgerRecordKind::ArtifactRecorded(artifact) => {
                if self.artifacts.contains_key(&artifact.id) {
                    return Err(StackError::already_exists("artifact", artifact.id.to_string()));
                }
                self.artifacts.insert(artifact.id, artifact.clone());
                LedgerRecordKind::ArtifactRecorded(artifact)
            }
            LedgerRecordKind::EventRecorded(mut event) => {
                if !self.executions.contains_key(&event.execution_id) {
                    return Err(StackError::not_found("execution", event.execution_id.to_string(), Vec::new()));
                }
                if !self.artifacts.contains_key(&event.artifact_id) {
                    return Err(StackError::not_found("artifact", event.artifact_id.to_string(), Vec::new()));
                }
                event.seq = seq;
                self.events_by_execution.entry(event.execution_id).or_default().push(event.clone());
                self.events_by_artifact.entry(event.artifact_id).or_default().push(event.clone());
                LedgerRecordKind::EventRecorded(event)
            }
            LedgerRecordKind::ExecutionFinished { execution_id,
                                                  status,
                                                  end_time,
                                                  properties, } => {
                let exec = self.executions
                               .get_mut(&execution_id)
                               .ok_or_else(|| StackError::not_found("execution", execution_id.to_string(), Vec::new()))?;
                if exec.status.is_terminal() {
                    return Err(StackError::Internal(format!("execution {execution_id} already finished as {:?}",
                                                            exec.status)));
                }
                if status == ExecutionStatus::Running {
                    return Err(StackError::Internal(format!("execution {execution_id} cannot finish as running")));
                }
                exec.status = status;
                exec.end_time = Some(end_time);
                exec.properties.extend(properties.clone());
                LedgerRecordKind::ExecutionFinished { execution_id,
                                                      status,
                                                      end_time,
                                                      properties }
            }
        };
        let entry = LedgerEntry { seq,
                                  ts: Utc::now(),
                                  kind };
        self.entries.push(entry.clone());
        Ok(entry)
    }
}

fn context_what(kind: ContextKind) -> &'static str {
    match kind {
        ContextKind::Pipeline => "pipeline",
        ContextKind::Run => "run",
    }
}

/// `MetadataStore` en memoria: ledger + índices bajo un único `RwLock`.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    state: RwLock<LedgerState>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn append(&self, kind: LedgerRecordKind) -> Result<LedgerEntry, StackError> {
        let entry = self.state.write().apply(kind)?;
        debug!("ledger append seq={} kind={}", entry.seq, entry_label(&entry.kind));
        Ok(entry)
    }

    fn context(&self, id: Uuid) -> Option<ContextRecord> {
        self.state.read().contexts.get(&id).cloned()
    }

    fn context_by_name(&self, kind: ContextKind, name: &str) -> Option<ContextRecord> {
        let state = self.state.read();
        state.context_names
             .get(&(kind, name.to_string()))
             .and_then(|id| state.contexts.get(id))
             .cloned()
    }

    fn contexts_of_kind(&self, kind: ContextKind) -> Vec<ContextRecord> {
        self.state.read().contexts.values().filter(|c| c.kind == kind).cloned().collect()
    }

    fn execution(&self, id: Uuid) -> Option<ExecutionRecord> {
        self.state.read().executions.get(&id).cloned()
    }

    fn executions_by_context(&self, context_id: Uuid) -> Vec<ExecutionRecord> {
        let state = self.state.read();
        let mut out: Vec<ExecutionRecord> = state.executions_by_context
                                                 .get(&context_id)
                                                 .into_iter()
                                                 .flatten()
                                                 .filter_map(|id| state.executions.get(id))
                                                 .cloned()
                                                 .collect();
        out.sort_by(|a, b| b.seq.cmp(&a.seq));
        out
    }

    fn executions_by_fingerprint(&self, fingerprint: &str) -> Vec<ExecutionRecord> {
        let state = self.state.read();
        state.executions_by_fingerprint
             .get(fingerprint)
             .into_iter()
             .flatten()
             .filter_map(|id| state.executions.get(id))
             .cloned()
             .collect()
    }

    fn artifact(&self, id: Uuid) -> Option<ArtifactRecord> {
        self.state.read().artifacts.get(&id).cloned()
    }

    fn events_by_execution(&self, execution_id: Uuid) -> Vec<EventRecord> {
        self.state.read().events_by_execution.get(&execution_id).cloned().unwrap_or_default()
    }

    fn events_by_artifact(&self, artifact_id: Uuid) -> Vec<EventRecord> {
        self.state.read().events_by_artifact.get(&artifact_id).cloned().unwrap_or_default()
    }

    fn entries(&self) -> Vec<LedgerEntry> {
        self.state.read().entries.clone()
    }
}

fn entry_label(kind: &LedgerRecordKind) -> &'static str {
    match kind {
        LedgerRecordKind::ContextCreated(_) => "context_created",
        LedgerRecordKind::ExecutionStarted(_) => "execution_started",
        LedgerRecordKind::ArtifactRecorded(_) => "artifact_recorded",
        LedgerRecordKind::EventRecorded(_) => "event_recorded",
        LedgerRecordKind::ExecutionFinished { .. } => "execution_finished",
    }
}

impl std::fmt::Debug for InMemoryMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryMetadataStore").field("entries", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use serde_json::json;

    use super::*;
    use crate::model::{EventDirection, PayloadType};

    fn artifact() -> ArtifactRecord {
        ArtifactRecord { id: Uuid::new_v4(),
                         type_name: "DataArtifact".into(),
                         uri: "memory://a".into(),
                         producer: "builtin.json".into(),
                         payload_type: PayloadType::from("json"),
                         properties: BTreeMap::new() }
    }

    #[test]
    fn context_names_are_unique_per_kind() {
        let store = InMemoryMetadataStore::new();
        store.create_context(ContextKind::Run, "r1", BTreeMap::new()).unwrap();
        let err = store.create_context(ContextKind::Run, "r1", BTreeMap::new()).unwrap_err();
        assert_eq!(err, StackError::already_exists("run", "r1"));
        // Mismo nombre, otro kind: permitido.
        store.create_context(ContextKind::Pipeline, "r1", BTreeMap::new()).unwrap();
        let ensured = store.ensure_context(ContextKind::Run, "r1", BTreeMap::new()).unwrap();
        assert_eq!(ensured.seq, 1);
    }

    #[test]
    fn finished_status_is_folded_and_terminal() {
        let store = InMemoryMetadataStore::new();
        let ctx = store.create_context(ContextKind::Run, "r", BTreeMap::new()).unwrap();
        let exec = store.start_execution(ExecutionRecord::new(vec![ctx.id], json!({}), ExecutionStatus::Running, None))
                        .unwrap();
        assert_eq!(exec.seq, 2);
        store.finish_execution(exec.id, ExecutionStatus::Completed, BTreeMap::new()).unwrap();
        let folded = store.execution(exec.id).unwrap();
        assert_eq!(folded.status, ExecutionStatus::Completed);
        assert!(folded.end_time.is_some());
        assert!(store.finish_execution(exec.id, ExecutionStatus::Failed, BTreeMap::new()).is_err());
    }

    #[test]
    fn executions_require_known_contexts() {
        let store = InMemoryMetadataStore::new();
        let ctx = store.create_context(ContextKind::Run, "r", BTreeMap::new()).unwrap();
        let ghost = Uuid::new_v4();
        let err = store.start_execution(ExecutionRecord::new(vec![ctx.id, ghost], json!({}), ExecutionStatus::Running, None))
                       .unwrap_err();
        assert_eq!(err, StackError::not_found("context", ghost.to_string(), Vec::new()));
        assert_eq!(store.len(), 1);
        assert!(store.executions_by_context(ctx.id).is_empty());
    }

    #[test]
    fn events_require_known_execution_and_artifact() {
        let store = InMemoryMetadataStore::new();
        let ctx = store.create_context(ContextKind::Run, "r", BTreeMap::new()).unwrap();
        let exec = store.start_execution(ExecutionRecord::new(vec![ctx.id], json!({}), ExecutionStatus::Running, None))
                        .unwrap();
        let orphan = EventRecord::new(exec.id, Uuid::new_v4(), "x", EventDirection::Output);
        assert!(matches!(store.record_event(orphan), Err(StackError::NotFound { .. })));
        let before = store.len();
        let art = store.record_artifact(artifact()).unwrap();
        let ev = store.record_event(EventRecord::new(exec.id, art.id, "x", EventDirection::Output)).unwrap();
        assert_eq!(ev.seq, before as u64 + 2);
        assert_eq!(store.events_by_artifact(art.id), vec![ev]);
    }

    #[test]
    fn executions_by_context_are_reverse_chronological() {
        let store = InMemoryMetadataStore::new();
        let ctx = store.create_context(ContextKind::Pipeline, "p", BTreeMap::new()).unwrap();
        let first = store.start_execution(ExecutionRecord::new(vec![ctx.id], json!({}), ExecutionStatus::Cached, None))
                         .unwrap();
        let second = store.start_execution(ExecutionRecord::new(vec![ctx.id], json!({}), ExecutionStatus::Cached, None))
                          .unwrap();
        let ids: Vec<Uuid> = store.executions_by_context(ctx.id).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn concurrent_context_creation_has_single_winner() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let handles: Vec<_> = (0..8).map(|_| {
                                        let store = store.clone();
                                        thread::spawn(move || {
                                            store.create_context(ContextKind::Run, "contended", BTreeMap::new()).is_ok()
                                        })
                                    })
                                    .collect();
        let winners = handles.into_iter().filter_map(|h| h.join().ok()).filter(|ok| *ok).count();
        assert_eq!(winners, 1);
        let seqs: Vec<u64> = store.entries().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1]);
    }
}
