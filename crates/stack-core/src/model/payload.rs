use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Etiqueta de tipo de payload. La jerarquía entre etiquetas no se infiere:
/// se declara explícitamente en `TypeTaxonomy`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadType(String);

impl PayloadType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PayloadType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Valor producido o consumido por un step, junto a su tipo declarado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub payload_type: PayloadType,
    pub value: Value,
}

impl Payload {
    pub fn new(payload_type: impl Into<PayloadType>, value: Value) -> Self {
        Self { payload_type: payload_type.into(),
               value }
    }
}
