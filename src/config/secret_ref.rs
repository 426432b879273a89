//! `ref:env:NAME` references inside configuration documents.
//!
//! Credentials stay out of the config file: any string of the form `ref:env:NAME` is
//! replaced by the value of the environment variable `NAME` before the document is
//! deserialized.

use crate::errors::ConfigError;
use serde_json::Value;

const ENV_REF_PREFIX: &str = "ref:env:";

pub fn resolve_secret_refs(input: &Value) -> Result<Value, ConfigError> {
    resolve_with(input, &|key| std::env::var(key).ok())
}

pub(crate) fn resolve_with<F>(input: &Value, lookup: &F) -> Result<Value, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match input {
        Value::String(text) => resolve_string(text, lookup).map(Value::String),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_with(item, lookup))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.clone(), resolve_with(value, lookup)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_string<F>(text: &str, lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(var) = text.trim().strip_prefix(ENV_REF_PREFIX) else {
        return Ok(text.to_string());
    };
    let var = var.trim();
    if var.is_empty() {
        return Err(ConfigError::UnresolvedSecret {
            reference: text.to_string(),
            var: String::new(),
        });
    }
    lookup(var).ok_or_else(|| ConfigError::UnresolvedSecret {
        reference: text.to_string(),
        var: var.to_string(),
    })
}
