use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::hashing::hash_value;

/// Insumos del fingerprint de un step. No es el fingerprint final (string
/// hash) sino el modelo previo a canonicalizar.
///
/// Se indexa por identidad de los artifacts de entrada y no por el estado de
/// cache de los steps anteriores: un upstream cacheado entrega los mismos ids.
#[derive(Serialize)]
pub struct StepFingerprintInput<'a> {
    pub engine_version: &'a str,
    pub step_name: &'a str,
    pub params: &'a Value,
    pub input_artifacts: BTreeMap<&'a str, Uuid>,
    pub external_inputs: BTreeMap<&'a str, &'a Value>,
}

impl StepFingerprintInput<'_> {
    pub fn digest(&self) -> String {
        let input_artifacts: BTreeMap<&str, String> =
            self.input_artifacts.iter().map(|(name, id)| (*name, id.to_string())).collect();
        hash_value(&json!({
            "engine_version": self.engine_version,
            "step_name": self.step_name,
            "params": self.params,
            "input_artifacts": input_artifacts,
            "external_inputs": self.external_inputs,
        }))
    }
}
