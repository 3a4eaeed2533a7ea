//! Constantes del core.
//!
//! Agrupa valores estáticos que participan en el cálculo de fingerprints, en la
//! compatibilidad de documentos exportados y en la codificación de identidad de
//! steps dentro del ledger de metadata.

/// Versión lógica del motor. Forma parte del input del fingerprint de cada
/// step: cambiarla invalida de forma determinista todo el cache previo aunque
/// parámetros e inputs no cambien.
pub const ENGINE_VERSION: &str = "S1.0";

/// Versión del sistema en ejecución. Los documentos de exportación de stacks
/// llevan esta etiqueta y el import rechaza cualquier otra.
pub const STACKFLOW_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Clave reservada dentro de los parámetros de una ejecución donde se codifica
/// la identidad del step. El lector de metadata la decodifica y la oculta.
pub const STEP_IDENTITY_KEY: &str = "__stackflow_step";

/// Prefijo de todas las claves internas de parámetros.
pub const RESERVED_PARAM_PREFIX: &str = "__stackflow";

/// Propiedad de ejecución con el id de la ejecución de la que se tomó el cache.
pub const CACHE_SOURCE_PROPERTY: &str = "cache_source_execution";

/// Propiedad de ejecución con el mensaje de error de un step fallido.
pub const FAILURE_PROPERTY: &str = "failure";

/// Propiedad de contexto de run con la cantidad de steps planificados.
pub const PLANNED_STEPS_PROPERTY: &str = "planned_steps";

/// Propiedad de contexto de run con el hash de identidad del step-graph.
pub const DEFINITION_HASH_PROPERTY: &str = "definition_hash";

/// Propiedad de contexto de run con el nombre del stack usado.
pub const STACK_PROPERTY: &str = "stack";

/// Propiedad de contexto de run con el nombre del pipeline.
pub const PIPELINE_PROPERTY: &str = "pipeline";
