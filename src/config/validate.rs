use super::{ApiConfig, ApiDescription, OperationSpec, ParameterLocation};
use crate::constants::protocols::ALLOWED_HTTP;
use crate::errors::ConfigError;
use crate::utils::endpoint::placeholders;
use reqwest::header::{HeaderName, HeaderValue};
use std::collections::{BTreeMap, HashMap, HashSet};

impl ApiConfig {
    /// Cross-field checks the JSON schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut api_names = HashSet::new();
        let mut tool_owner: HashMap<&str, &str> = HashMap::new();
        for api in &self.apis {
            if !api_names.insert(api.name.as_str()) {
                return Err(ConfigError::DuplicateApi(api.name.clone()));
            }
            validate_api(api)?;
            for tool in &api.tools {
                if let Some(first) = tool_owner.insert(tool.name.as_str(), api.name.as_str()) {
                    return Err(ConfigError::DuplicateTool {
                        name: tool.name.clone(),
                        first: first.to_string(),
                        second: api.name.clone(),
                    });
                }
                validate_operation(tool)?;
            }
        }
        Ok(())
    }
}

fn validate_api(api: &ApiDescription) -> Result<(), ConfigError> {
    let invalid_base = || ConfigError::InvalidBaseUrl {
        api: api.name.clone(),
        base_url: api.base_url.clone(),
    };
    let parsed = url::Url::parse(&api.base_url).map_err(|_| invalid_base())?;
    let scheme = format!("{}:", parsed.scheme());
    if !ALLOWED_HTTP.contains(&scheme.as_str()) || parsed.cannot_be_a_base() {
        return Err(invalid_base());
    }
    if api.timeout == Some(0) {
        return Err(ConfigError::InvalidApi {
            api: api.name.clone(),
            message: "timeout must be greater than zero".to_string(),
        });
    }
    check_headers(&api.headers).map_err(|message| ConfigError::InvalidApi {
        api: api.name.clone(),
        message,
    })
}

fn check_headers(headers: &BTreeMap<String, String>) -> Result<(), String> {
    for (name, value) in headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| format!("invalid header name '{}'", name))?;
        HeaderValue::from_str(value).map_err(|_| format!("invalid value for header '{}'", name))?;
    }
    Ok(())
}

fn validate_operation(tool: &OperationSpec) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::InvalidOperation {
        tool: tool.name.clone(),
        message,
    };

    let mut seen = HashSet::new();
    for param in &tool.parameters {
        if !seen.insert(param.name.as_str()) {
            return Err(invalid(format!("parameter '{}' is declared twice", param.name)));
        }
    }

    let template_names = placeholders(&tool.endpoint);
    let mut bound = HashSet::new();
    for name in &template_names {
        let declared = tool
            .parameters
            .iter()
            .find(|p| p.name == *name && p.location == ParameterLocation::Path);
        if declared.is_none() {
            return Err(invalid(format!(
                "endpoint placeholder '{{{}}}' has no matching path parameter",
                name
            )));
        }
        bound.insert(*name);
    }

    for param in tool
        .parameters
        .iter()
        .filter(|p| p.location == ParameterLocation::Path)
    {
        if !bound.contains(param.name.as_str()) {
            return Err(invalid(format!(
                "path parameter '{}' does not appear in endpoint '{}'",
                param.name, tool.endpoint
            )));
        }
        if !param.required && param.default.is_none() {
            return Err(invalid(format!(
                "path parameter '{}' must be required or have a default",
                param.name
            )));
        }
    }

    if let Some(param) = tool.parameters.iter().find(|p| {
        p.default
            .as_ref()
            .is_some_and(|value| !value.is_null() && !p.param_type.accepts(value))
    }) {
        return Err(invalid(format!(
            "default for parameter '{}' is not of type {}",
            param.name,
            param.param_type.as_str()
        )));
    }

    if let Some(param) = tool.parameters.iter().find(|p| {
        matches!(
            (p.default.as_ref(), p.enum_values.as_ref()),
            (Some(value), Some(allowed)) if !value.is_null() && !allowed.contains(value)
        )
    }) {
        return Err(invalid(format!(
            "default for parameter '{}' is not one of its enum values",
            param.name
        )));
    }

    check_headers(&tool.headers).map_err(invalid)?;
    for param in tool
        .parameters
        .iter()
        .filter(|p| p.location == ParameterLocation::Header)
    {
        HeaderName::from_bytes(param.name.as_bytes())
            .map_err(|_| invalid(format!("'{}' is not a valid header name", param.name)))?;
    }

    if tool.timeout == Some(0) {
        return Err(invalid("timeout must be greater than zero".to_string()));
    }
    if tool.response.as_ref().and_then(|r| r.max_size) == Some(0) {
        return Err(invalid("response.maxSize must be greater than zero".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::config::ApiConfig;
    use crate::errors::ConfigError;
    use serde_json::json;

    fn config(value: serde_json::Value) -> ApiConfig {
        serde_json::from_value(value).expect("config shape")
    }

    fn weather(tools: serde_json::Value) -> serde_json::Value {
        json!({"apis": [{"name": "weather", "baseUrl": "https://api.example.com", "tools": tools}]})
    }

    #[test]
    fn accepts_bound_placeholders() {
        let cfg = config(weather(json!([{
            "name": "getForecast",
            "method": "GET",
            "endpoint": "/forecast/{city}",
            "parameters": [
                {"name": "city", "location": "path", "required": true},
                {"name": "days", "location": "query", "type": "integer"}
            ]
        }])));
        cfg.validate().expect("valid");
    }

    #[test]
    fn rejects_unbound_placeholder() {
        let cfg = config(weather(json!([{
            "name": "getForecast",
            "method": "GET",
            "endpoint": "/forecast/{city}",
            "parameters": [{"name": "city", "location": "query", "required": true}]
        }])));
        let err = cfg.validate().expect_err("unbound");
        assert!(matches!(err, ConfigError::InvalidOperation { .. }));
        assert!(err.to_string().contains("{city}"));
    }

    #[test]
    fn rejects_path_parameter_missing_from_endpoint() {
        let cfg = config(weather(json!([{
            "name": "getForecast",
            "method": "GET",
            "endpoint": "/forecast",
            "parameters": [{"name": "city", "location": "path", "required": true}]
        }])));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_tool_names_across_apis() {
        let cfg = config(json!({"apis": [
            {"name": "a", "baseUrl": "https://a.example.com", "tools": [
                {"name": "ping", "method": "GET", "endpoint": "/ping"}
            ]},
            {"name": "b", "baseUrl": "https://b.example.com", "tools": [
                {"name": "ping", "method": "GET", "endpoint": "/ping"}
            ]}
        ]}));
        match cfg.validate() {
            Err(ConfigError::DuplicateTool { name, first, second }) => {
                assert_eq!(name, "ping");
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("expected duplicate tool, got {:?}", other),
        }
    }

    #[test]
    fn rejects_duplicate_api_names() {
        let cfg = config(json!({"apis": [
            {"name": "a", "baseUrl": "https://a.example.com", "tools": []},
            {"name": "a", "baseUrl": "https://b.example.com", "tools": []}
        ]}));
        assert!(matches!(cfg.validate(), Err(ConfigError::DuplicateApi(name)) if name == "a"));
    }

    #[test]
    fn rejects_header_values_with_newlines() {
        let cfg = config(json!({"apis": [
            {"name": "a", "baseUrl": "https://a.example.com", "headers": {"X-Bad": "one\ntwo"}, "tools": []}
        ]}));
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidApi { .. })));
    }

    #[test]
    fn rejects_default_outside_enum() {
        let units = |default: &str| {
            config(weather(json!([{
                "name": "getForecast",
                "method": "GET",
                "endpoint": "/forecast",
                "parameters": [{"name": "units", "location": "query",
                                "enum": ["metric", "imperial"], "default": default}]
            }])))
        };
        units("metric").validate().expect("default in enum");
        let err = units("kelvin").validate().expect_err("default outside enum");
        assert!(matches!(err, ConfigError::InvalidOperation { .. }));
        assert!(err.to_string().contains("units"));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let cfg = config(json!({"apis": [
            {"name": "a", "baseUrl": "ftp://files.example.com", "tools": []}
        ]}));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }
}
