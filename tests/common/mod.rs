#![allow(dead_code)]

use once_cell::sync::Lazy;
use restbridge::config::{parse_config, ApiConfig};
use restbridge::services::logger::{LogLevel, Logger};
use restbridge::services::tool_executor::ToolExecutor;
use serde_json::{json, Value};
use tokio::sync::Mutex;

pub static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub fn quiet_logger() -> Logger {
    Logger::with_level("test", LogLevel::Error)
}

/// `weather` API with `getForecast`: `GET /forecast/{city}?days=`.
pub fn weather_api(base_url: &str) -> Value {
    json!({
        "name": "weather",
        "baseUrl": base_url,
        "tools": [{
            "name": "getForecast",
            "description": "Forecast for a city",
            "method": "GET",
            "endpoint": "/forecast/{city}",
            "parameters": [
                {"name": "city", "location": "path", "type": "string", "required": true},
                {"name": "days", "location": "query", "type": "integer"}
            ]
        }]
    })
}

pub fn config_with(apis: Vec<Value>) -> ApiConfig {
    parse_config(&json!({ "apis": apis }).to_string()).expect("valid config")
}

pub fn executor_for(api: Value) -> ToolExecutor {
    ToolExecutor::new(config_with(vec![api]), quiet_logger()).expect("executor")
}

pub fn write_json(path: &std::path::Path, value: &Value) {
    let payload = serde_json::to_string_pretty(value).expect("serialize json");
    std::fs::write(path, format!("{}\n", payload)).expect("write file");
}

pub fn temp_dir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("restbridge-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}
