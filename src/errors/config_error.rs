use std::path::PathBuf;

/// Errors raised while loading configuration or building the tool registry.
/// Any of these means the tool catalogue cannot be advertised safely.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration path is not set (pass --config or set RESTBRIDGE_CONFIG)")]
    MissingPath,

    #[error("failed to read configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("configuration does not match schema:\n{0}")]
    Schema(String),

    #[error("duplicate API name: {0}")]
    DuplicateApi(String),

    #[error("duplicate tool name '{name}' (declared by API '{first}' and API '{second}')")]
    DuplicateTool {
        name: String,
        first: String,
        second: String,
    },

    #[error("tool '{tool}': {message}")]
    InvalidOperation { tool: String, message: String },

    #[error("API '{api}': invalid baseUrl '{base_url}'")]
    InvalidBaseUrl { api: String, base_url: String },

    #[error("API '{api}': {message}")]
    InvalidApi { api: String, message: String },

    #[error("secret reference {reference} could not be resolved: environment variable {var} is not set")]
    UnresolvedSecret { reference: String, var: String },
}
