//! Splits a call's argument bag into the pieces of an HTTP request.

use crate::config::{ParameterLocation, ParameterSpec};
use crate::errors::ToolError;
use crate::utils::endpoint::{placeholders, substitute};
use crate::utils::text::stringify_scalar;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedRequest {
    /// Endpoint with every placeholder substituted and percent-encoded.
    pub path: String,
    pub query: Map<String, Value>,
    pub body: Map<String, Value>,
    pub headers: BTreeMap<String, String>,
}

/// Arguments not matching a declared parameter are ignored; `null` counts as absent.
pub fn map_parameters(
    args: &Map<String, Value>,
    parameters: &[ParameterSpec],
    endpoint: &str,
) -> Result<MappedRequest, ToolError> {
    let mut mapped = MappedRequest {
        path: endpoint.to_string(),
        ..Default::default()
    };

    for param in parameters {
        let value = match args.get(&param.name).filter(|v| !v.is_null()) {
            Some(value) => value.clone(),
            None => match param.default.as_ref().filter(|v| !v.is_null()) {
                Some(default) => default.clone(),
                None if param.required => return Err(ToolError::missing_parameter(&param.name)),
                None => continue,
            },
        };
        check_value(param, &value)?;

        match param.location {
            ParameterLocation::Path => {
                let rendered = path_segment(param, &value)?;
                let encoded = urlencoding::encode(&rendered);
                mapped.path = substitute(&mapped.path, &param.name, &encoded);
            }
            ParameterLocation::Query => {
                mapped.query.insert(param.name.clone(), value);
            }
            ParameterLocation::Body => {
                mapped.body.insert(param.name.clone(), value);
            }
            ParameterLocation::Header => {
                mapped
                    .headers
                    .insert(param.name.clone(), stringify_scalar(&value));
            }
        }
    }

    if let Some(unresolved) = placeholders(&mapped.path).first() {
        return Err(ToolError::missing_parameter(unresolved)
            .with_hint("The endpoint declares a placeholder that no path parameter fills."));
    }

    Ok(mapped)
}

fn check_value(param: &ParameterSpec, value: &Value) -> Result<(), ToolError> {
    if !param.param_type.accepts(value) {
        return Err(ToolError::invalid_params(format!(
            "Parameter '{}' must be of type {}",
            param.name,
            param.param_type.as_str()
        ))
        .with_details(serde_json::json!({
            "parameter": param.name,
            "expected": param.param_type.as_str(),
            "received": json_type_name(value),
        })));
    }
    if let Some(allowed) = param.enum_values.as_ref() {
        if !allowed.contains(value) {
            return Err(ToolError::invalid_params(format!(
                "Parameter '{}' must be one of: {}",
                param.name,
                allowed
                    .iter()
                    .map(stringify_scalar)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
    }
    Ok(())
}

fn path_segment(param: &ParameterSpec, value: &Value) -> Result<String, ToolError> {
    let rendered = match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => stringify_scalar(value),
        _ => {
            return Err(ToolError::invalid_params(format!(
                "Path parameter '{}' must be a string, number, or boolean",
                param.name
            )))
        }
    };
    // URL parsing resolves dot segments even when percent-encoded.
    if rendered == "." || rendered == ".." {
        return Err(ToolError::invalid_params(format!(
            "Path parameter '{}' cannot be '.' or '..'",
            param.name
        ))
        .with_hint("Dot segments would move the request outside the endpoint."));
    }
    Ok(rendered)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParameterType;
    use crate::errors::ToolErrorKind;
    use serde_json::json;

    fn param(name: &str, location: ParameterLocation, param_type: ParameterType) -> ParameterSpec {
        ParameterSpec {
            name: name.to_string(),
            location,
            param_type,
            required: false,
            description: String::new(),
            default: None,
            enum_values: None,
        }
    }

    fn required(mut spec: ParameterSpec) -> ParameterSpec {
        spec.required = true;
        spec
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object args")
    }

    fn forecast_params() -> Vec<ParameterSpec> {
        vec![
            required(param("city", ParameterLocation::Path, ParameterType::String)),
            param("days", ParameterLocation::Query, ParameterType::Integer),
        ]
    }

    #[test]
    fn routes_each_location() {
        let params = vec![
            required(param("id", ParameterLocation::Path, ParameterType::Integer)),
            param("verbose", ParameterLocation::Query, ParameterType::Boolean),
            param("title", ParameterLocation::Body, ParameterType::String),
            param("tags", ParameterLocation::Body, ParameterType::Array),
            param("X-Request-Id", ParameterLocation::Header, ParameterType::String),
        ];
        let mapped = map_parameters(
            &args(json!({
                "id": 42,
                "verbose": true,
                "title": "hello",
                "tags": ["a", "b"],
                "X-Request-Id": "abc",
                "unrelated": "ignored"
            })),
            &params,
            "/items/{id}",
        )
        .expect("mapped");
        assert_eq!(mapped.path, "/items/42");
        assert_eq!(mapped.query.get("verbose"), Some(&json!(true)));
        assert_eq!(mapped.body.get("title"), Some(&json!("hello")));
        assert_eq!(mapped.body.get("tags"), Some(&json!(["a", "b"])));
        assert_eq!(mapped.headers.get("X-Request-Id").map(String::as_str), Some("abc"));
        assert!(!mapped.query.contains_key("unrelated"));
        assert!(!mapped.body.contains_key("unrelated"));
    }

    #[test]
    fn missing_required_parameter_is_named() {
        let err = map_parameters(&args(json!({"days": 3})), &forecast_params(), "/forecast/{city}")
            .expect_err("city missing");
        assert_eq!(err.kind, ToolErrorKind::MissingParameter);
        assert!(err.message.contains("city"));
    }

    #[test]
    fn null_counts_as_absent() {
        let err = map_parameters(
            &args(json!({"city": null})),
            &forecast_params(),
            "/forecast/{city}",
        )
        .expect_err("null city");
        assert_eq!(err.kind, ToolErrorKind::MissingParameter);
    }

    #[test]
    fn optional_absent_query_is_omitted() {
        let mapped = map_parameters(
            &args(json!({"city": "paris"})),
            &forecast_params(),
            "/forecast/{city}",
        )
        .expect("mapped");
        assert_eq!(mapped.path, "/forecast/paris");
        assert!(mapped.query.is_empty());
    }

    #[test]
    fn path_values_are_percent_encoded() {
        let mapped = map_parameters(
            &args(json!({"city": "san francisco/ca?x=1&y#z"})),
            &forecast_params(),
            "/forecast/{city}",
        )
        .expect("mapped");
        assert_eq!(mapped.path, "/forecast/san%20francisco%2Fca%3Fx%3D1%26y%23z");
        assert!(placeholders(&mapped.path).is_empty());
    }

    #[test]
    fn unresolved_placeholder_is_missing_parameter() {
        let err = map_parameters(
            &args(json!({"city": "paris"})),
            &forecast_params(),
            "/forecast/{city}/{region}",
        )
        .expect_err("region unbound");
        assert_eq!(err.kind, ToolErrorKind::MissingParameter);
        assert!(err.message.contains("region"));
    }

    #[test]
    fn defaults_fill_absent_values() {
        let mut days = param("days", ParameterLocation::Query, ParameterType::Integer);
        days.default = Some(json!(7));
        let mapped = map_parameters(&args(json!({})), &[days], "/forecast").expect("mapped");
        assert_eq!(mapped.query.get("days"), Some(&json!(7)));
    }

    #[test]
    fn type_mismatch_is_invalid_params() {
        let err = map_parameters(
            &args(json!({"city": "paris", "days": "three"})),
            &forecast_params(),
            "/forecast/{city}",
        )
        .expect_err("bad type");
        assert_eq!(err.kind, ToolErrorKind::InvalidParams);
        assert!(err.message.contains("days"));
        assert!(err.message.contains("integer"));
    }

    #[test]
    fn enum_membership_is_enforced() {
        let mut units = param("units", ParameterLocation::Query, ParameterType::String);
        units.enum_values = Some(vec![json!("metric"), json!("imperial")]);
        let err = map_parameters(&args(json!({"units": "kelvin"})), &[units], "/forecast")
            .expect_err("not allowed");
        assert!(err.message.contains("metric, imperial"));
    }

    #[test]
    fn object_path_parameter_is_rejected() {
        let params = vec![required(param(
            "id",
            ParameterLocation::Path,
            ParameterType::Object,
        ))];
        let err = map_parameters(&args(json!({"id": {"a": 1}})), &params, "/items/{id}")
            .expect_err("object in path");
        assert_eq!(err.kind, ToolErrorKind::InvalidParams);
    }

    #[test]
    fn dot_segments_are_rejected() {
        let params = forecast_params();
        for value in [".", ".."] {
            let err = map_parameters(&args(json!({"city": value})), &params, "/forecast/{city}")
                .expect_err("dot segment");
            assert_eq!(err.kind, ToolErrorKind::InvalidParams);
            assert!(err.message.contains("'city'"));
        }
        let mapped = map_parameters(&args(json!({"city": "..paris"})), &params, "/forecast/{city}")
            .expect("dots inside a value are fine");
        assert_eq!(mapped.path, "/forecast/..paris");
    }
}
