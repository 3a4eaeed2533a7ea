//! `StackStore` persistente en un único archivo JSON.
//!
//! El estado vivo es un `InMemoryStackStore`; tras cada mutación exitosa se
//! vuelca su snapshot completo (temporal + rename). Si la escritura falla la
//! mutación queda aplicada en memoria y el error se devuelve al caller.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;
use stack_core::stack::StoreSnapshot;
use stack_core::{ComponentKind, ComponentRecord, Configuration, FlavorRegistry, InMemoryStackStore, Stack, StackDefinition, StackError,
                 StackStore, StackflowConfig};

use crate::error::PersistenceError;
use crate::retry::with_retry;

pub const SNAPSHOT_FILE: &str = "stacks.json";

/// Escribe `bytes` en `path` vía archivo temporal hermano + rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
    }
    let tmp = path.with_extension("tmp");
    with_retry(|| fs::write(&tmp, bytes).map_err(|e| PersistenceError::io(&tmp, e)))?;
    with_retry(|| fs::rename(&tmp, path).map_err(|e| PersistenceError::io(path, e)))
}

pub struct FileStackStore {
    path: PathBuf,
    inner: InMemoryStackStore,
    // Serializa snapshot + escritura para que el último volcado sea el más nuevo.
    flush: Mutex<()>,
}

impl FileStackStore {
    /// Abre (o crea vacío) el store en `path`. Un snapshot existente se
    /// reproduce entero: componentes con sus ids, stacks re-validados y
    /// stacks activos.
    pub fn open(path: impl Into<PathBuf>, flavors: Arc<FlavorRegistry>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let inner = if path.exists() {
            let bytes = with_retry(|| fs::read(&path).map_err(|e| PersistenceError::io(&path, e)))?;
            let snapshot: StoreSnapshot =
                serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Malformed { path: path.clone(),
                                                                                              source })?;
            info!("restoring {} components and {} stacks from {}",
                  snapshot.components.len(),
                  snapshot.stacks.len(),
                  path.display());
            InMemoryStackStore::restore(flavors, &snapshot)?
        } else {
            debug!("no snapshot at {}, starting empty", path.display());
            InMemoryStackStore::new(flavors)
        };
        Ok(Self { path,
                  inner,
                  flush: Mutex::new(()) })
    }

    /// `<home_dir>/stacks.json` según la configuración.
    pub fn open_in_home(config: &StackflowConfig, flavors: Arc<FlavorRegistry>) -> Result<Self, PersistenceError> {
        let home = config.home_dir.as_ref().ok_or(PersistenceError::NoHome)?;
        Self::open(home.join(SNAPSHOT_FILE), flavors)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StackError> {
        let _guard = self.flush.lock();
        let snapshot = self.inner.snapshot();
        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(PersistenceError::from)?;
        write_atomic(&self.path, &bytes)?;
        debug!("snapshot written to {}", self.path.display());
        Ok(())
    }

    fn persisted<T>(&self, result: Result<T, StackError>) -> Result<T, StackError> {
        let value = result?;
        self.persist()?;
        Ok(value)
    }
}

impl StackStore for FileStackStore {
    fn register_component(&self,
                          kind: ComponentKind,
                          flavor: &str,
                          name: &str,
                          configuration: Configuration)
                          -> Result<ComponentRecord, StackError> {
        self.persisted(self.inner.register_component(kind, flavor, name, configuration))
    }

    fn get_component(&self, kind: ComponentKind, name: &str) -> Result<ComponentRecord, StackError> {
        self.inner.get_component(kind, name)
    }

    fn list_components(&self, kind: Option<ComponentKind>) -> Vec<ComponentRecord> {
        self.inner.list_components(kind)
    }

    fn deregister_component(&self, kind: ComponentKind, name: &str) -> Result<(), StackError> {
        self.persisted(self.inner.deregister_component(kind, name))
    }

    fn register_stack(&self, name: &str, definition: &StackDefinition) -> Result<Arc<Stack>, StackError> {
        self.persisted(self.inner.register_stack(name, definition))
    }

    fn replace_stack(&self, name: &str, definition: &StackDefinition) -> Result<Arc<Stack>, StackError> {
        self.persisted(self.inner.replace_stack(name, definition))
    }

    fn get_stack(&self, name: &str) -> Result<Arc<Stack>, StackError> {
        self.inner.get_stack(name)
    }

    fn stack_definition(&self, name: &str) -> Result<StackDefinition, StackError> {
        self.inner.stack_definition(name)
    }

    fn list_stacks(&self) -> Vec<String> {
        self.inner.list_stacks()
    }

    fn deregister_stack(&self, name: &str) -> Result<(), StackError> {
        self.persisted(self.inner.deregister_stack(name))
    }

    fn set_active_stack(&self, name: &str, scope: &str) -> Result<(), StackError> {
        self.persisted(self.inner.set_active_stack(name, scope))
    }

    fn active_stack(&self, scope: &str) -> Result<Arc<Stack>, StackError> {
        self.inner.active_stack(scope)
    }

    fn snapshot(&self) -> StoreSnapshot {
        self.inner.snapshot()
    }
}

impl std::fmt::Debug for FileStackStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStackStore").field("path", &self.path).field("inner", &self.inner).finish()
    }
}
