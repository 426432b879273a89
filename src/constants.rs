pub mod network {
    pub const TIMEOUT_API_REQUEST_MS: u64 = 30_000;
    pub const USER_AGENT: &str = concat!("restbridge/", env!("CARGO_PKG_VERSION"));
    pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";
}

pub mod limits {
    pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 50_000;
    pub const TRUNCATION_MARKER: &str = "\n... [response truncated]";
    pub const ERROR_BODY_PREVIEW_BYTES: usize = 512;
    /// Upstream bodies are read up to `maxSize * BODY_CAPTURE_FACTOR`, never less than
    /// `MIN_BODY_CAPTURE_BYTES`.
    pub const BODY_CAPTURE_FACTOR: usize = 8;
    pub const MIN_BODY_CAPTURE_BYTES: usize = 1_048_576;
    pub const MAX_SUGGESTIONS: usize = 5;
}

pub mod protocols {
    pub const ALLOWED_HTTP: &[&str] = &["http:", "https:"];
}

pub mod mcp {
    pub const PROTOCOL_VERSION: &str = "2025-06-18";
    pub const SERVER_NAME: &str = "restbridge";
    pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
}

pub mod env {
    pub const CONFIG_PATH: &str = "RESTBRIDGE_CONFIG";
    pub const LOG_LEVEL: &str = "RESTBRIDGE_LOG_LEVEL";
    pub const LOG_LEVEL_FALLBACK: &str = "LOG_LEVEL";
}
