use serde::Deserialize;
use serde_json::{Map, Number, Value};
use serde_yaml::Value as YamlValue;
use tracing::trace;

use crate::DynamicError;

const KIND: &str = "kind";
const API_VERSION: &str = "apiVersion";

/// split multi document manifest into generic resources.
/// every returned value is an object with string `kind` and `apiVersion`.
/// empty documents are skipped.
pub fn parse_manifest(text: &str) -> Result<Vec<Value>, DynamicError> {
    let mut resources = vec![];

    for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let yaml = YamlValue::deserialize(document)
            .map_err(|source| DynamicError::Yaml { index, source })?;

        if yaml.is_null() {
            trace!(index, "skipping empty document");
            continue;
        }

        let value = normalize_keys(yaml);
        let Some(object) = value.as_object() else {
            return Err(DynamicError::NotMapping { index });
        };

        for field in [KIND, API_VERSION] {
            match object.get(field) {
                Some(Value::String(s)) if !s.is_empty() => {}
                _ => return Err(DynamicError::MissingField { index, field }),
            }
        }

        resources.push(value);
    }

    Ok(resources)
}

/// convert yaml tree into json tree, stringifying non string keys
pub fn normalize_keys(value: YamlValue) -> Value {
    match value {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(b) => Value::Bool(b),
        YamlValue::Number(n) => number(&n),
        YamlValue::String(s) => Value::String(s),
        YamlValue::Sequence(seq) => Value::Array(seq.into_iter().map(normalize_keys).collect()),
        YamlValue::Mapping(mapping) => {
            let mut object = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                object.insert(key_string(key), normalize_keys(value));
            }
            Value::Object(object)
        }
        YamlValue::Tagged(tagged) => normalize_keys(tagged.value),
    }
}

fn number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Number(i.into())
    } else if let Some(u) = n.as_u64() {
        Value::Number(u.into())
    } else {
        // NaN and infinities have no json number form
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(n.to_string()))
    }
}

fn key_string(key: YamlValue) -> String {
    match key {
        YamlValue::String(s) => s,
        YamlValue::Null => "null".to_owned(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Tagged(tagged) => key_string(tagged.value),
        composite => normalize_keys(composite).to_string(),
    }
}
