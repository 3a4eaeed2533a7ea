use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::model::Payload;

/// Lo que un step ve al ejecutarse: parámetros resueltos (sin claves
/// reservadas) e inputs ya cargados por sus producers.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub step_name: String,
    pub run_name: String,
    pub params: Value,
    pub inputs: BTreeMap<String, Payload>,
}

impl StepContext {
    pub fn input(&self, name: &str) -> Option<&Payload> {
        self.inputs.get(name)
    }

    /// Valor del input `name`, o `Value::Null` si no existe.
    pub fn input_value(&self, name: &str) -> &Value {
        self.inputs.get(name).map(|p| &p.value).unwrap_or(&Value::Null)
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Deserializa los parámetros a un tipo propio del step.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.params.clone())
    }
}

/// Resultado de ejecutar un step. Una falla es un dato, no un error del
/// runner: se registra como ejecución `failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum StepRunResult {
    Success { outputs: IndexMap<String, Payload> },
    Failure { error: String },
}

impl StepRunResult {
    pub fn success<I, K>(outputs: I) -> Self
        where I: IntoIterator<Item = (K, Payload)>,
              K: Into<String>
    {
        StepRunResult::Success { outputs: outputs.into_iter().map(|(k, v)| (k.into(), v)).collect() }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        StepRunResult::Failure { error: error.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepRunResult::Success { .. })
    }
}
