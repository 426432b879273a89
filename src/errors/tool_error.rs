use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    MissingParameter,
    InvalidParams,
    ToolNotFound,
    Transport,
    Timeout,
    Upstream,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub retryable: bool,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            hint: None,
            details: None,
            retryable: matches!(kind, ToolErrorKind::Timeout | ToolErrorKind::Transport),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn missing_parameter(name: &str) -> Self {
        Self::new(
            ToolErrorKind::MissingParameter,
            "MISSING_PARAMETER",
            format!("Missing required parameter: {}", name),
        )
        .with_details(serde_json::json!({ "parameter": name }))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidParams, "INVALID_PARAMS", message)
    }

    pub fn tool_not_found(name: &str) -> Self {
        Self::new(
            ToolErrorKind::ToolNotFound,
            "TOOL_NOT_FOUND",
            format!("Unknown tool: {}", name),
        )
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Transport, "TRANSPORT_ERROR", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Timeout, "TIMEOUT", message)
    }

    /// Non-2xx answer from the target API. `message` is the API's own error text.
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Upstream, "UPSTREAM_ERROR", message)
            .with_retryable(matches!(status, 408 | 429 | 500..=599))
            .with_details(serde_json::json!({ "status": status }))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Internal, "INTERNAL", message)
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ToolError {}
