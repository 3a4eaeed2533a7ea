//! Configuración explícita del runtime.
//!
//! Se construye una vez al arrancar el proceso y se pasa por referencia a cada
//! subsistema; no hay estado global mutable. `from_env` carga `.env` (una sola
//! vez por proceso) y lee variables `STACKFLOW_*`.

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackflowConfig {
    /// Scope (perfil) cuyo stack activo se usa por defecto.
    pub default_scope: String,
    /// Interruptor global de cache; los steps pueden desactivarlo individualmente.
    pub enable_cache: bool,
    pub liveness_max_attempts: u32,
    pub liveness_interval_ms: u64,
    /// Directorio para snapshots persistidos (si se usa persistencia en disco).
    pub home_dir: Option<PathBuf>,
}

impl Default for StackflowConfig {
    fn default() -> Self {
        Self { default_scope: "default".to_string(),
               enable_cache: true,
               liveness_max_attempts: 10,
               liveness_interval_ms: 200,
               home_dir: None }
    }
}

impl StackflowConfig {
    pub fn from_env() -> Self {
        // asegura que .env se haya cargado
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construye la config desde una función de lookup (tests, otras fuentes).
    pub fn from_lookup<F>(lookup: F) -> Self
        where F: Fn(&str) -> Option<String>
    {
        let defaults = Self::default();
        Self { default_scope: lookup("STACKFLOW_DEFAULT_SCOPE").unwrap_or(defaults.default_scope),
               enable_cache: lookup("STACKFLOW_ENABLE_CACHE").map(|v| parse_flag(&v))
                                                             .unwrap_or(defaults.enable_cache),
               liveness_max_attempts: lookup("STACKFLOW_LIVENESS_ATTEMPTS").and_then(|v| v.parse().ok())
                                                                           .unwrap_or(defaults.liveness_max_attempts),
               liveness_interval_ms: lookup("STACKFLOW_LIVENESS_INTERVAL_MS").and_then(|v| v.parse().ok())
                                                                             .unwrap_or(defaults.liveness_interval_ms),
               home_dir: lookup("STACKFLOW_HOME").map(PathBuf::from) }
    }
}

fn parse_flag(raw: &str) -> bool {
    !matches!(raw.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([("STACKFLOW_ENABLE_CACHE", "off"),
                                                       ("STACKFLOW_LIVENESS_ATTEMPTS", "3"),
                                                       ("STACKFLOW_LIVENESS_INTERVAL_MS", "not-a-number"),
                                                       ("STACKFLOW_HOME", "/tmp/stackflow")]);
        let cfg = StackflowConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert!(!cfg.enable_cache);
        assert_eq!(cfg.liveness_max_attempts, 3);
        assert_eq!(cfg.liveness_interval_ms, 200);
        assert_eq!(cfg.default_scope, "default");
        assert_eq!(cfg.home_dir, Some(PathBuf::from("/tmp/stackflow")));
    }
}
