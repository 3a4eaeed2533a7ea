//! Producers built-in.
//!
//! `JsonProducer` guarda un sobre con checksum SHA-256 del valor canónico y lo
//! verifica al leer; los demás escriben el valor plano.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use stack_core::hashing::to_canonical_json;
use stack_core::{ArtifactStore, Payload, PayloadType, Producer, ProducerDescriptor, StackError};

fn io_err(context: &str, e: impl std::fmt::Display) -> StackError {
    StackError::ArtifactIo(format!("{context}: {e}"))
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    sha256: String,
    value: Value,
}

#[derive(Debug, Default)]
pub struct JsonProducer;

impl JsonProducer {
    pub const ID: &'static str = "builtin.json";
}

impl Producer for JsonProducer {
    fn descriptor(&self) -> ProducerDescriptor {
        ProducerDescriptor { id: Self::ID.to_string(),
                             payload_types: vec![PayloadType::from("json")] }
    }

    fn save(&self, payload: &Payload, store: &dyn ArtifactStore, uri: &str) -> Result<(), StackError> {
        let envelope = Envelope { sha256: sha256_hex(&to_canonical_json(&payload.value)),
                                  value: payload.value.clone() };
        let bytes = serde_json::to_vec(&envelope).map_err(|e| io_err("encoding json artifact", e))?;
        store.write(uri, &bytes)
    }

    fn load(&self, payload_type: &PayloadType, store: &dyn ArtifactStore, uri: &str) -> Result<Payload, StackError> {
        let envelope: Envelope = serde_json::from_slice(&store.read(uri)?).map_err(|e| io_err("decoding json artifact", e))?;
        let actual = sha256_hex(&to_canonical_json(&envelope.value));
        if actual != envelope.sha256 {
            return Err(StackError::ArtifactIo(format!("checksum mismatch at {uri}")));
        }
        Ok(Payload::new(payload_type.clone(), envelope.value))
    }
}

#[derive(Debug, Default)]
pub struct TextProducer;

impl TextProducer {
    pub const ID: &'static str = "builtin.text";
}

impl Producer for TextProducer {
    fn descriptor(&self) -> ProducerDescriptor {
        ProducerDescriptor { id: Self::ID.to_string(),
                             payload_types: vec![PayloadType::from("text")] }
    }

    fn save(&self, payload: &Payload, store: &dyn ArtifactStore, uri: &str) -> Result<(), StackError> {
        let text = payload.value
                          .as_str()
                          .ok_or_else(|| StackError::ArtifactIo(format!("text producer got non-string {}", payload.value)))?;
        store.write(uri, text.as_bytes())
    }

    fn load(&self, payload_type: &PayloadType, store: &dyn ArtifactStore, uri: &str) -> Result<Payload, StackError> {
        let text = String::from_utf8(store.read(uri)?).map_err(|e| io_err("decoding text artifact", e))?;
        Ok(Payload::new(payload_type.clone(), Value::String(text)))
    }
}

/// Escalares (`number`, `bool`) serializados como JSON plano.
#[derive(Debug)]
struct ScalarCodec {
    id: &'static str,
    payload_type: &'static str,
    accepts: fn(&Value) -> bool,
}

impl ScalarCodec {
    fn save(&self, payload: &Payload, store: &dyn ArtifactStore, uri: &str) -> Result<(), StackError> {
        if !(self.accepts)(&payload.value) {
            return Err(StackError::ArtifactIo(format!("{} producer got {}", self.payload_type, payload.value)));
        }
        store.write(uri, payload.value.to_string().as_bytes())
    }

    fn load(&self, payload_type: &PayloadType, store: &dyn ArtifactStore, uri: &str) -> Result<Payload, StackError> {
        let value: Value = serde_json::from_slice(&store.read(uri)?).map_err(|e| io_err("decoding scalar artifact", e))?;
        if !(self.accepts)(&value) {
            return Err(StackError::ArtifactIo(format!("{uri} does not hold a {}", self.payload_type)));
        }
        Ok(Payload::new(payload_type.clone(), value))
    }

    fn descriptor(&self) -> ProducerDescriptor {
        ProducerDescriptor { id: self.id.to_string(),
                             payload_types: vec![PayloadType::from(self.payload_type)] }
    }
}

const NUMBER: ScalarCodec = ScalarCodec { id: "builtin.number",
                                          payload_type: "number",
                                          accepts: Value::is_number };

const BOOL: ScalarCodec = ScalarCodec { id: "builtin.bool",
                                        payload_type: "bool",
                                        accepts: Value::is_boolean };

#[derive(Debug, Default)]
pub struct NumberProducer;

impl Producer for NumberProducer {
    fn descriptor(&self) -> ProducerDescriptor {
        NUMBER.descriptor()
    }

    fn save(&self, payload: &Payload, store: &dyn ArtifactStore, uri: &str) -> Result<(), StackError> {
        NUMBER.save(payload, store, uri)
    }

    fn load(&self, payload_type: &PayloadType, store: &dyn ArtifactStore, uri: &str) -> Result<Payload, StackError> {
        NUMBER.load(payload_type, store, uri)
    }
}

#[derive(Debug, Default)]
pub struct BoolProducer;

impl Producer for BoolProducer {
    fn descriptor(&self) -> ProducerDescriptor {
        BOOL.descriptor()
    }

    fn save(&self, payload: &Payload, store: &dyn ArtifactStore, uri: &str) -> Result<(), StackError> {
        BOOL.save(payload, store, uri)
    }

    fn load(&self, payload_type: &PayloadType, store: &dyn ArtifactStore, uri: &str) -> Result<Payload, StackError> {
        BOOL.load(payload_type, store, uri)
    }
}

pub fn builtin_producers() -> Vec<Arc<dyn Producer>> {
    vec![Arc::new(JsonProducer), Arc::new(TextProducer), Arc::new(NumberProducer), Arc::new(BoolProducer)]
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use stack_core::InMemoryArtifactStore;

    use super::*;

    #[test]
    fn json_envelope_detects_tampering() {
        let store = InMemoryArtifactStore::default();
        JsonProducer.save(&Payload::new("json", json!({"b": 1, "a": [1, 2]})), &store, "memory://x").unwrap();
        let back = JsonProducer.load(&PayloadType::from("json"), &store, "memory://x").unwrap();
        assert_eq!(back.value, json!({"a": [1, 2], "b": 1}));

        let forged = serde_json::to_vec(&json!({"sha256": "00", "value": 1})).unwrap();
        store.write("memory://forged", &forged).unwrap();
        assert!(matches!(JsonProducer.load(&PayloadType::from("json"), &store, "memory://forged"),
                         Err(StackError::ArtifactIo(m)) if m.contains("checksum")));
    }

    #[test]
    fn scalar_producers_reject_wrong_shapes() {
        let store = InMemoryArtifactStore::default();
        assert!(NumberProducer.save(&Payload::new("number", json!("7")), &store, "memory://n").is_err());
        NumberProducer.save(&Payload::new("number", json!(7.5)), &store, "memory://n").unwrap();
        assert_eq!(NumberProducer.load(&PayloadType::from("integer"), &store, "memory://n").unwrap().value, json!(7.5));
        assert!(BoolProducer.load(&PayloadType::from("bool"), &store, "memory://n").is_err());
        assert!(TextProducer.save(&Payload::new("text", json!(1)), &store, "memory://t").is_err());
    }
}
