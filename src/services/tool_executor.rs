use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{ApiConfig, ApiDescription, OperationSpec};
use crate::constants::limits::MAX_SUGGESTIONS;
use crate::errors::{ConfigError, ToolError};
use crate::services::http_client::{build_shared_client, ApiHttpClient, RequestOptions};
use crate::services::logger::Logger;
use crate::services::parameter_mapper::map_parameters;
use crate::services::response_transformer::{
    enforce_max_size, extract_error, serialize, transform, Failure,
};
use crate::services::tool_generator::{ToolDefinition, ToolGenerator};
use crate::utils::suggest::suggest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: None,
        }
    }

    pub fn error(err: &ToolError) -> Self {
        Self {
            content: vec![ContentBlock::Text {
                text: format!("Error: {}", err.message),
            }],
            is_error: Some(true),
        }
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// Concatenated text of every content block.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Seam between the dispatch layer and whatever executes tools.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    fn tools(&self) -> Vec<ToolDefinition>;
    async fn execute(&self, name: &str, args: Value) -> ToolCallResult;
}

/// Runs one operation end to end. Everything it owns is read-only after construction, so
/// a single instance serves concurrent calls without locking.
#[derive(Clone)]
pub struct ToolExecutor {
    logger: Logger,
    generator: Arc<ToolGenerator>,
    clients: Arc<HashMap<String, ApiHttpClient>>,
}

impl ToolExecutor {
    pub fn new(config: ApiConfig, logger: Logger) -> Result<Self, ConfigError> {
        let generator = ToolGenerator::new(Arc::new(config))?;
        let shared = build_shared_client().map_err(|err| ConfigError::InvalidApi {
            api: "*".to_string(),
            message: format!("failed to build HTTP client: {}", err),
        })?;
        let clients = generator
            .config()
            .apis
            .iter()
            .map(|api| (api.name.clone(), ApiHttpClient::with_client(api, shared.clone())))
            .collect::<HashMap<_, _>>();
        Ok(Self {
            logger: logger.child("executor"),
            generator: Arc::new(generator),
            clients: Arc::new(clients),
        })
    }

    pub fn generator(&self) -> &ToolGenerator {
        &self.generator
    }

    pub fn tools(&self) -> Vec<ToolDefinition> {
        self.generator.generate_tools()
    }

    /// Never fails: every error becomes an `isError` result.
    pub async fn execute(&self, name: &str, args: Value) -> ToolCallResult {
        let call_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        self.logger.debug(
            "tool call",
            Some(&serde_json::json!({"call_id": call_id, "tool": name})),
        );

        match self.run(name, args, &call_id).await {
            Ok(text) => {
                self.logger.debug(
                    "tool call completed",
                    Some(&serde_json::json!({
                        "call_id": call_id,
                        "tool": name,
                        "bytes": text.len(),
                        "duration_ms": started.elapsed().as_millis() as u64,
                    })),
                );
                ToolCallResult::text(text)
            }
            Err(err) => {
                self.logger.warn(
                    "tool call failed",
                    Some(&serde_json::json!({
                        "call_id": call_id,
                        "tool": name,
                        "kind": err.kind,
                        "code": err.code,
                        "message": err.message,
                        "retryable": err.retryable,
                        "duration_ms": started.elapsed().as_millis() as u64,
                    })),
                );
                ToolCallResult::error(&err)
            }
        }
    }

    async fn run(&self, name: &str, args: Value, call_id: &str) -> Result<String, ToolError> {
        let (api, tool) = self.lookup(name)?;
        let args = normalize_args(args)?;
        let mapped = map_parameters(&args, &tool.parameters, &tool.endpoint)?;

        let client = self.clients.get(&api.name).ok_or_else(|| {
            ToolError::internal(format!("No HTTP client registered for API '{}'", api.name))
        })?;

        let mut headers = tool.headers.clone();
        for (header, value) in mapped.headers {
            headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&header));
            headers.insert(header, value);
        }

        self.logger.debug(
            "sending request",
            Some(&serde_json::json!({
                "call_id": call_id,
                "api": api.name,
                "method": tool.method.as_str(),
                "path": mapped.path,
                "query_keys": mapped.query.keys().collect::<Vec<_>>(),
                "header_names": headers.keys().collect::<Vec<_>>(),
            })),
        );

        let spec = tool.response.as_ref();
        let response = client
            .request(
                tool.method,
                &mapped.path,
                RequestOptions {
                    query: mapped.query,
                    body: mapped.body,
                    headers,
                    timeout_ms: tool.timeout,
                    max_response_bytes: spec.and_then(|s| s.max_size),
                },
            )
            .await?;

        if !response.is_success() {
            let message = extract_error(
                Failure::Response(&response),
                spec.and_then(|s| s.error_path.as_deref()),
            );
            return Err(ToolError::upstream(response.status, message));
        }

        let value = transform(&response, spec);
        Ok(enforce_max_size(
            serialize(&value),
            spec.and_then(|s| s.max_size),
        ))
    }

    fn lookup(&self, name: &str) -> Result<(&ApiDescription, &OperationSpec), ToolError> {
        if let Some(found) = self.generator.get_tool_definition(name) {
            return Ok(found);
        }
        let suggestions = suggest(name, self.generator.tool_names(), MAX_SUGGESTIONS);
        let err = ToolError::tool_not_found(name);
        Err(if suggestions.is_empty() {
            err.with_hint("Call tools/list to see the available tools")
        } else {
            let hint = format!("Did you mean: {}", suggestions.join(", "));
            err.with_details(serde_json::json!({ "suggestions": suggestions }))
                .with_hint(hint)
        })
    }
}

#[async_trait]
impl ToolInvoker for ToolExecutor {
    fn tools(&self) -> Vec<ToolDefinition> {
        ToolExecutor::tools(self)
    }

    async fn execute(&self, name: &str, args: Value) -> ToolCallResult {
        ToolExecutor::execute(self, name, args).await
    }
}

fn normalize_args(args: Value) -> Result<Map<String, Value>, ToolError> {
    match args {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => Err(ToolError::invalid_params(format!(
            "Tool arguments must be an object, got {}",
            match other {
                Value::Array(_) => "array",
                Value::String(_) => "string",
                Value::Number(_) => "number",
                _ => "boolean",
            }
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::services::logger::LogLevel;
    use serde_json::json;

    fn executor() -> ToolExecutor {
        let config = parse_config(
            r#"{"apis": [{
                "name": "weather",
                "baseUrl": "http://127.0.0.1:9",
                "tools": [
                    {"name": "getForecast", "method": "GET", "endpoint": "/forecast/{city}",
                     "parameters": [{"name": "city", "location": "path", "required": true}]},
                    {"name": "getAlerts", "method": "GET", "endpoint": "/alerts"}
                ]
            }]}"#,
        )
        .expect("config");
        ToolExecutor::new(config, Logger::with_level("test", LogLevel::Error)).expect("executor")
    }

    #[test]
    fn error_result_is_prefixed_and_flagged() {
        let result = ToolCallResult::error(&ToolError::missing_parameter("city"));
        assert!(result.is_error());
        assert_eq!(result.text_content(), "Error: Missing required parameter: city");
        let value = serde_json::to_value(&result).expect("serialize");
        assert_eq!(value["isError"], true);
        assert_eq!(value["content"][0]["type"], "text");
    }

    #[test]
    fn success_result_omits_is_error() {
        let value = serde_json::to_value(ToolCallResult::text("ok")).expect("serialize");
        assert!(value.get("isError").is_none());
        assert_eq!(value["content"][0]["text"], "ok");
    }

    #[tokio::test]
    async fn unknown_tool_suggests_close_names() {
        let result = executor().execute("getForcast", json!({})).await;
        assert!(result.is_error());
        assert!(result.text_content().contains("Unknown tool: getForcast"));
        let err = executor().lookup("getForcast").expect_err("unknown");
        assert!(err.hint.unwrap_or_default().contains("getForecast"));
    }

    #[tokio::test]
    async fn non_object_arguments_are_rejected() {
        let result = executor().execute("getAlerts", json!(["paris"])).await;
        assert!(result.is_error());
        assert!(result.text_content().contains("must be an object"));
    }

    #[tokio::test]
    async fn missing_parameter_fails_before_sending() {
        let result = executor().execute("getForecast", Value::Null).await;
        assert!(result.is_error());
        assert!(result.text_content().contains("city"));
    }
}
