use super::secret_ref::resolve_secret_refs;
use super::ApiConfig;
use crate::constants::env as env_keys;
use crate::errors::ConfigError;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAX_SCHEMA_ERRORS: usize = 10;

static CONFIG_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config_schema.json"));
    serde_json::from_str(raw).expect("config_schema.json must be valid JSON")
});

static CONFIG_VALIDATOR: Lazy<JSONSchema> = Lazy::new(|| {
    JSONSchema::compile(&CONFIG_SCHEMA).expect("config_schema.json must be a valid JSON schema")
});

/// `--config` wins over `RESTBRIDGE_CONFIG`.
pub fn resolve_config_path(cli_path: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = cli_path {
        return Ok(path);
    }
    std::env::var(env_keys::CONFIG_PATH)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
        .ok_or(ConfigError::MissingPath)
}

pub fn load_config(path: &Path) -> Result<ApiConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&raw)
}

/// Schema check, secret resolution, typed decode, then cross-field validation.
pub fn parse_config(raw: &str) -> Result<ApiConfig, ConfigError> {
    let document: Value = serde_json::from_str(raw)?;
    check_schema(&document)?;
    let resolved = resolve_secret_refs(&document)?;
    let config: ApiConfig = serde_json::from_value(resolved)?;
    config.validate()?;
    Ok(config)
}

fn check_schema(document: &Value) -> Result<(), ConfigError> {
    if let Err(errors) = CONFIG_VALIDATOR.validate(document) {
        let rendered: Vec<String> = errors
            .take(MAX_SCHEMA_ERRORS)
            .map(|err| {
                let location = err.instance_path.to_string();
                let location = if location.is_empty() {
                    "(root)".to_string()
                } else {
                    location
                };
                format!("- {}: {}", location, err)
            })
            .collect();
        return Err(ConfigError::Schema(rendered.join("\n")));
    }
    Ok(())
}
