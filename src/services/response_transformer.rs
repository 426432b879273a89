//! Turns upstream payloads into bounded text for the caller.

use crate::config::ResponseSpec;
use crate::constants::limits::{
    DEFAULT_MAX_RESPONSE_BYTES, ERROR_BODY_PREVIEW_BYTES, TRUNCATION_MARKER,
};
use crate::services::http_client::HttpResponse;
use crate::utils::data_path::lookup_path;
use crate::utils::text::{stringify_scalar, truncate_utf8_prefix};
use serde_json::Value;

const ERROR_FIELDS: &[&str] = &["error", "message", "description"];

/// A failed exchange as seen by [`extract_error`].
#[derive(Clone, Copy)]
pub enum Failure<'a> {
    Response(&'a HttpResponse),
    Other(&'a dyn std::fmt::Display),
}

/// Value at `successPath` (or the whole body). A path that does not resolve yields `null`.
pub fn transform(response: &HttpResponse, spec: Option<&ResponseSpec>) -> Value {
    match spec.and_then(|s| s.success_path.as_deref()).map(str::trim) {
        Some(path) if !path.is_empty() => lookup_path(&response.body, path)
            .cloned()
            .unwrap_or(Value::Null),
        _ => response.body.clone(),
    }
}

/// Strings pass through untouched; everything else is pretty-printed JSON.
pub fn serialize(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

pub fn enforce_max_size(text: String, max_size: Option<usize>) -> String {
    let limit = max_size.unwrap_or(DEFAULT_MAX_RESPONSE_BYTES);
    if text.len() <= limit {
        return text;
    }
    let mut out = truncate_utf8_prefix(&text, limit).to_string();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// First non-empty of: `errorPath`, conventional error fields, status text, the failure itself.
pub fn extract_error(failure: Failure<'_>, error_path: Option<&str>) -> String {
    let response = match failure {
        Failure::Other(err) => return err.to_string(),
        Failure::Response(response) => response,
    };

    if let Some(path) = error_path.map(str::trim).filter(|p| !p.is_empty()) {
        if let Some(message) = lookup_path(&response.body, path).and_then(message_from) {
            return message;
        }
    }
    if let Some(message) = conventional_message(&response.body) {
        return message;
    }
    if !response.status_text.trim().is_empty() {
        return response.status_text.clone();
    }
    match &response.body {
        Value::Null => format!("HTTP {}", response.status),
        body => {
            let rendered = stringify_scalar(body);
            let trimmed = rendered.trim();
            if trimmed.is_empty() {
                format!("HTTP {}", response.status)
            } else {
                truncate_utf8_prefix(trimmed, ERROR_BODY_PREVIEW_BYTES).to_string()
            }
        }
    }
}

fn conventional_message(body: &Value) -> Option<String> {
    let obj = body.as_object()?;
    ERROR_FIELDS.iter().find_map(|field| {
        let value = obj.get(*field)?;
        match value {
            Value::Object(nested) => ["message", "description"]
                .iter()
                .find_map(|key| nested.get(*key).and_then(message_from)),
            other => message_from(other),
        }
    })
}

fn message_from(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Object(_) | Value::Array(_) => None,
        other => {
            let text = stringify_scalar(other);
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
    }
}
