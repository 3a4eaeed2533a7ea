//! Metadata store con un "daemon" local en un hilo desacoplado.
//!
//! El hilo se lanza y se olvida: `provision`/`resume` vuelven de inmediato y
//! el core sondea `is_running` con reintentos acotados. `suspend` sólo pide
//! la parada; el hilo la observa en su siguiente tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info};
use parking_lot::Mutex;
use stack_core::{ComponentRecord, InMemoryMetadataStore, MetadataStore, ServiceLifecycle, StackComponent, StackError};

const TICK: Duration = Duration::from_millis(5);

#[derive(Debug, Default)]
struct Flags {
    running: AtomicBool,
    stop: AtomicBool,
}

#[derive(Debug)]
pub struct InProcessMetadataService {
    name: String,
    startup_delay: Duration,
    flags: Arc<Flags>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl InProcessMetadataService {
    pub fn new(name: impl Into<String>, startup_delay: Duration) -> Self {
        Self { name: name.into(),
               startup_delay,
               flags: Arc::new(Flags::default()),
               worker: Mutex::new(None) }
    }

    fn spawn(&self) -> Result<(), StackError> {
        let mut worker = self.worker.lock();
        if let Some(handle) = worker.as_ref() {
            if !handle.is_finished() {
                debug!("service '{}' already has a live worker", self.name);
                return Ok(());
            }
        }
        self.flags.stop.store(false, Ordering::SeqCst);
        let flags = self.flags.clone();
        let delay = self.startup_delay;
        let handle = thread::Builder::new().name(format!("stackflow-{}", self.name))
                                           .spawn(move || {
                                               thread::sleep(delay);
                                               flags.running.store(true, Ordering::SeqCst);
                                               while !flags.stop.load(Ordering::SeqCst) {
                                                   thread::sleep(TICK);
                                               }
                                               flags.running.store(false, Ordering::SeqCst);
                                           })
                                           .map_err(|e| StackError::Internal(format!("spawning service thread: {e}")))?;
        *worker = Some(handle);
        info!("service '{}' launched", self.name);
        Ok(())
    }
}

impl ServiceLifecycle for InProcessMetadataService {
    fn name(&self) -> &str {
        &self.name
    }

    fn provision(&self) -> Result<(), StackError> {
        self.spawn()
    }

    fn resume(&self) -> Result<(), StackError> {
        self.spawn()
    }

    fn suspend(&self) -> Result<(), StackError> {
        self.flags.stop.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn deprovision(&self) -> Result<(), StackError> {
        self.flags.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().take() {
            handle.join().map_err(|_| StackError::Internal(format!("service '{}' worker panicked", self.name)))?;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.flags.running.load(Ordering::SeqCst)
    }
}

impl Drop for InProcessMetadataService {
    fn drop(&mut self) {
        self.flags.stop.store(true, Ordering::SeqCst);
    }
}

/// Flavor `in_process` de metadata store: ledger en memoria más el servicio
/// de fondo. Configuración: `startup_ms` (entero, por defecto 0).
#[derive(Debug)]
pub struct InProcessMetadataStore {
    record: ComponentRecord,
    ledger: InMemoryMetadataStore,
    service: InProcessMetadataService,
}

impl InProcessMetadataStore {
    pub fn factory(record: ComponentRecord) -> Result<Arc<dyn StackComponent>, StackError> {
        let startup_ms = match record.configuration.get("startup_ms") {
            None => 0,
            Some(v) => v.as_u64().ok_or_else(|| StackError::StackValidation { component: record.name.clone(),
                                                                               reason: "configuration 'startup_ms' must be a non-negative integer".into() })?,
        };
        let service = InProcessMetadataService::new(record.name.clone(), Duration::from_millis(startup_ms));
        Ok(Arc::new(Self { record,
                           ledger: InMemoryMetadataStore::new(),
                           service }))
    }
}

impl StackComponent for InProcessMetadataStore {
    fn record(&self) -> &ComponentRecord {
        &self.record
    }

    fn as_metadata_store(&self) -> Option<&dyn MetadataStore> {
        Some(&self.ledger)
    }

    fn as_service(&self) -> Option<&dyn ServiceLifecycle> {
        Some(&self.service)
    }
}
