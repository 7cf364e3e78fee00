//! Conversions between Value and serde types.

use serde::de::DeserializeOwned;
use serde::Serialize;
use urlstore_core::{Error, Heap, Result, Value, ValueId};

/// Convert a Value to a Rust type via serde.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value_to_json(value)).map_err(|e| Error::Serialization {
        message: e.to_string(),
    })
}

/// Convert a Rust type to a Value via serde.
pub fn to_value<T: Serialize>(data: &T) -> Result<Value> {
    let json = serde_json::to_value(data).map_err(|e| Error::Serialization {
        message: e.to_string(),
    })?;
    Ok(json_to_value(json))
}

/// Convert our Value to serde_json::Value.
///
/// Native values have no JSON form and become `null`.
pub fn value_to_json(value: Value) -> serde_json::Value {
    match value {
        Value::Null | Value::Native(_) => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(b),
        Value::Number(n) => serde_json::Value::Number(n),
        Value::String(s) => serde_json::Value::String(s),
        Value::Array(arr) => serde_json::Value::Array(arr.into_iter().map(value_to_json).collect()),
        Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, value_to_json(v)))
                .collect(),
        ),
    }
}

/// Convert serde_json::Value to our Value.
pub fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => Value::Number(n),
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect(),
        ),
    }
}

/// Copy a JSON document into the heap as a detached value.
pub fn import_json(heap: &mut Heap, json: serde_json::Value) -> ValueId {
    heap.import(&json_to_value(json))
}

/// Copy a heap subtree out as JSON.
pub fn export_json(heap: &Heap, id: ValueId) -> Result<serde_json::Value> {
    heap.export(id).map(value_to_json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use urlstore_core::Native;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Contact {
        name: String,
        age: u32,
        tags: Vec<String>,
    }

    #[test]
    fn struct_round_trip() {
        let contact = Contact {
            name: "Alice".to_string(),
            age: 30,
            tags: vec!["friend".to_string()],
        };
        let value = to_value(&contact).unwrap();
        assert_eq!(value.get("name"), Some(&Value::from("Alice")));
        let back: Contact = from_value(value).unwrap();
        assert_eq!(back, contact);
    }

    #[test]
    fn from_value_reports_shape_errors() {
        let err = from_value::<Contact>(Value::from(1)).unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }

    #[test]
    fn json_key_order_is_kept() {
        let value = json_to_value(json!({"z": 1, "a": 2, "m": [true, null]}));
        match &value {
            Value::Object(map) => {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                assert_eq!(keys, vec!["z", "a", "m"]);
            }
            other => panic!("expected object, got {:?}", other),
        }
        assert_eq!(value_to_json(value), json!({"z": 1, "a": 2, "m": [true, null]}));
    }

    #[test]
    fn natives_export_as_null() {
        let value = Value::from(vec![Value::Native(Native::new(1u8))]);
        assert_eq!(value_to_json(value), json!([null]));
    }

    #[test]
    fn heap_round_trip() {
        let mut heap = Heap::new();
        let doc = json!({"users": [{"name": "Ann"}], "count": 1.5});
        let id = import_json(&mut heap, doc.clone());
        assert_eq!(export_json(&heap, id).unwrap(), doc);
    }
}
