//! Fusión determinista de parámetros JSON.

use serde_json::Value;

/// Merge shallow: las claves de `b` reemplazan a las de `a` cuando ambos son
/// objetos. Si alguno no es objeto, `b` tiene precedencia salvo que sea
/// `null` (sin override).
pub fn merge_json(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Object(ma), Value::Object(mb)) => {
            let mut out = ma.clone();
            for (k, v) in mb {
                out.insert(k.clone(), v.clone());
            }
            Value::Object(out)
        }
        (base, Value::Null) => base.clone(),
        (_, other) => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn overrides_win_and_nested_objects_are_replaced() {
        let base = json!({"lr": 0.1, "epochs": 3, "opt": {"kind": "sgd", "momentum": 0.9}});
        let merged = merge_json(&base, &json!({"lr": 0.01, "opt": {"kind": "adam"}}));
        assert_eq!(merged, json!({"lr": 0.01, "epochs": 3, "opt": {"kind": "adam"}}));
    }

    #[test]
    fn null_override_keeps_defaults() {
        let base = json!({"k": 1});
        assert_eq!(merge_json(&base, &Value::Null), base);
    }
}
