//! stack-persistence
//!
//! Persistencia en disco del registro de componentes y stacks.
//!
//! Módulos:
//! - `file_store`: `StackStore` respaldado por un snapshot JSON que se
//!   reescribe de forma atómica tras cada mutación.
//! - `export_io`: lectura/escritura de documentos de export de stacks.
//! - `retry`: reintentos acotados ante errores de IO transitorios.
//! - `error`: errores propios y su conversión a `StackError`.

pub mod error;
pub mod export_io;
pub mod file_store;
mod retry;

pub use error::PersistenceError;
pub use export_io::{read_export, write_export};
pub use file_store::{FileStackStore, SNAPSHOT_FILE};
