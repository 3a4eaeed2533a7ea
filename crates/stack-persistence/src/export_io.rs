//! Documentos de export en disco (JSON legible).

use std::fs;
use std::path::Path;

use log::info;
use stack_core::StackExport;

use crate::error::PersistenceError;
use crate::file_store::write_atomic;
use crate::retry::with_retry;

pub fn write_export(path: &Path, export: &StackExport) -> Result<(), PersistenceError> {
    let bytes = serde_json::to_vec_pretty(export)?;
    write_atomic(path, &bytes)?;
    info!("stack '{}' exported to {}", export.stack_name, path.display());
    Ok(())
}

/// Lee un export sin validarlo: la comprobación de versión la hace
/// `import_stack`.
pub fn read_export(path: &Path) -> Result<StackExport, PersistenceError> {
    let bytes = with_retry(|| fs::read(path).map_err(|e| PersistenceError::io(path, e)))?;
    serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Malformed { path: path.to_path_buf(),
                                                                                  source })
}
