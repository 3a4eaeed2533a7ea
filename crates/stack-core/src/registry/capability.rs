//! Resolución de producers (serializadores) por tipo de payload.
//!
//! El algoritmo tiene tres ramas y hay que preservarlas exactamente:
//! 1. match exacto del tipo registrado;
//! 2. si no hay, el conjunto de supertipos registrados del tipo pedido: con
//!    exactamente uno se usa su handler;
//! 3. ninguno -> `NotFound`; más de uno -> `AmbiguousCapability` con todos los
//!    candidatos. Nunca se elige uno arbitrariamente.
//!
//! La jerarquía no sale del sistema de tipos del lenguaje sino de una
//! taxonomía declarada (`TypeTaxonomy`).

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt::Debug;
use std::sync::Arc;

use dashmap::DashMap;
use log::warn;
use parking_lot::RwLock;

use crate::component::ArtifactStore;
use crate::errors::StackError;
use crate::model::{Payload, PayloadType};

/// Capacidades declaradas por un producer, registradas junto a él.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerDescriptor {
    pub id: String,
    pub payload_types: Vec<PayloadType>,
}

/// Serializador responsable de persistir y leer payloads de ciertos tipos.
pub trait Producer: Send + Sync + Debug {
    fn descriptor(&self) -> ProducerDescriptor;

    fn save(&self, payload: &Payload, store: &dyn ArtifactStore, uri: &str) -> Result<(), StackError>;

    fn load(&self, payload_type: &PayloadType, store: &dyn ArtifactStore, uri: &str) -> Result<Payload, StackError>;
}

/// Jerarquía explícita de tipos de payload ("implements").
#[derive(Debug, Default, Clone)]
pub struct TypeTaxonomy {
    parents: HashMap<PayloadType, Vec<PayloadType>>,
}

impl TypeTaxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declara `ty` como subtipo directo de cada `supertypes`. Acumula.
    pub fn declare<I>(&mut self, ty: PayloadType, supertypes: I)
        where I: IntoIterator<Item = PayloadType>
    {
        let entry = self.parents.entry(ty).or_default();
        for s in supertypes {
            if !entry.contains(&s) {
                entry.push(s);
            }
        }
    }

    /// Supertipos estrictos, transitivos. Tolera ciclos en las declaraciones.
    pub fn ancestors(&self, ty: &PayloadType) -> BTreeSet<PayloadType> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&PayloadType> = VecDeque::new();
        queue.push_back(ty);
        while let Some(current) = queue.pop_front() {
            for parent in self.parents.get(current).into_iter().flatten() {
                if parent != ty && seen.insert(parent.clone()) {
                    queue.push_back(parent);
                }
            }
        }
        seen
    }

    /// `ty` es `of` o desciende de él.
    pub fn is_subtype(&self, ty: &PayloadType, of: &PayloadType) -> bool {
        ty == of || self.ancestors(ty).contains(of)
    }
}

pub struct TypeCapabilityRegistry {
    taxonomy: RwLock<TypeTaxonomy>,
    handlers: DashMap<PayloadType, Arc<dyn Producer>>,
    producers: DashMap<String, Arc<dyn Producer>>,
}

impl TypeCapabilityRegistry {
    pub fn new() -> Self {
        Self { taxonomy: RwLock::new(TypeTaxonomy::new()),
               handlers: DashMap::new(),
               producers: DashMap::new() }
    }

    pub fn declare_type<I>(&self, ty: impl Into<PayloadType>, supertypes: I)
        where I: IntoIterator<Item = PayloadType>
    {
        self.taxonomy.write().declare(ty.into(), supertypes);
    }

    pub fn is_subtype(&self, ty: &PayloadType, of: &PayloadType) -> bool {
        self.taxonomy.read().is_subtype(ty, of)
    }

    /// Registra `handler` para `payload_type`. Última escritura gana, con aviso.
    pub fn register(&self, payload_type: PayloadType, handler: Arc<dyn Producer>) {
        let id = handler.descriptor().id;
        self.producers.insert(id.clone(), handler.clone());
        if let Some(previous) = self.handlers.insert(payload_type.clone(), handler) {
            warn!("producer for payload type '{}' overwritten: {} -> {}",
                  payload_type,
                  previous.descriptor().id,
                  id);
        }
    }

    /// Registra un producer para todos los tipos de su descriptor.
    pub fn register_producer(&self, handler: Arc<dyn Producer>) {
        for ty in handler.descriptor().payload_types {
            self.register(ty, handler.clone());
        }
    }

    pub fn resolve(&self, payload_type: &PayloadType) -> Result<Arc<dyn Producer>, StackError> {
        if let Some(exact) = self.handlers.get(payload_type) {
            return Ok(exact.value().clone());
        }
        let ancestors = self.taxonomy.read().ancestors(payload_type);
        let mut candidates: Vec<(PayloadType, Arc<dyn Producer>)> =
            self.handlers
                .iter()
                .filter(|entry| ancestors.contains(entry.key()))
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect();
        candidates.sort_by(|a, b| a.0.cmp(&b.0));
        match candidates.len() {
            0 => Err(StackError::not_found("producer for payload type", payload_type.as_str(), self.registered_types())),
            1 => Ok(candidates.remove(0).1),
            _ => Err(StackError::AmbiguousCapability { payload_type: payload_type.clone(),
                                                       candidates: candidates.into_iter()
                                                                             .map(|(ty, _)| ty.to_string())
                                                                             .collect() }),
        }
    }

    /// Producer fijado explícitamente por el caller; evita la ambigüedad.
    pub fn resolve_pinned(&self, payload_type: &PayloadType, producer_id: Option<&str>) -> Result<Arc<dyn Producer>, StackError> {
        match producer_id {
            Some(id) => self.producer(id),
            None => self.resolve(payload_type),
        }
    }

    pub fn producer(&self, id: &str) -> Result<Arc<dyn Producer>, StackError> {
        self.producers.get(id).map(|p| p.value().clone()).ok_or_else(|| {
                                                                  let mut known: Vec<String> =
                                                                      self.producers.iter().map(|e| e.key().clone()).collect();
                                                                  known.sort();
                                                                  StackError::not_found("producer", id, known)
                                                              })
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.iter().map(|e| e.key().to_string()).collect();
        types.sort();
        types
    }
}

impl Default for TypeCapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for TypeCapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeCapabilityRegistry").field("types", &self.registered_types()).finish()
    }
}
