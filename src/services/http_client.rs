use crate::config::{ApiDescription, ApiKeyLocation, AuthConfig, HttpMethod};
use crate::constants::limits::{
    BODY_CAPTURE_FACTOR, DEFAULT_MAX_RESPONSE_BYTES, MIN_BODY_CAPTURE_BYTES,
};
use crate::constants::{network as network_constants, protocols::ALLOWED_HTTP};
use crate::errors::ToolError;
use crate::utils::text::stringify_scalar;
use base64::Engine;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Map<String, Value>,
    /// Sent as a JSON object when non-empty.
    pub body: Map<String, Value>,
    /// Operation headers already overlaid by mapped header parameters.
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: Option<u64>,
    /// Effective `maxSize` of the caller; bounds how much of the body is read.
    pub max_response_bytes: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
    /// Reading stopped at the capture limit; `body` holds the prefix as text.
    pub body_truncated: bool,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport for a single configured API. Holds no per-request state, so one instance
/// serves any number of concurrent calls.
#[derive(Clone)]
pub struct ApiHttpClient {
    api_name: String,
    base_url: String,
    auth: AuthConfig,
    headers: BTreeMap<String, String>,
    timeout_ms: Option<u64>,
    client: Client,
}

/// One pool shared by every [`ApiHttpClient`].
pub fn build_shared_client() -> reqwest::Result<Client> {
    Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}

impl ApiHttpClient {
    pub fn with_client(api: &ApiDescription, client: Client) -> Self {
        Self {
            api_name: api.name.clone(),
            base_url: api.base_url.trim_end_matches('/').to_string(),
            auth: api.auth.clone(),
            headers: api.headers.clone(),
            timeout_ms: api.timeout,
            client,
        }
    }

    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        opts: RequestOptions,
    ) -> Result<HttpResponse, ToolError> {
        let url = self.build_url(path, &opts.query)?;
        let headers = headers_to_headermap(&self.merge_headers(&opts.headers))?;
        let timeout_ms = opts
            .timeout_ms
            .or(self.timeout_ms)
            .unwrap_or(network_constants::TIMEOUT_API_REQUEST_MS);

        let mut req = self
            .client
            .request(method.to_reqwest(), url)
            .headers(headers)
            .timeout(Duration::from_millis(timeout_ms));
        if !opts.body.is_empty() {
            req = req.json(&Value::Object(opts.body));
        }

        let response = req.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or("").to_string();
        let response_headers = headers_to_map(response.headers());
        let limit = capture_limit(opts.max_response_bytes);
        let (bytes, body_truncated) = read_capped(response, limit).await?;
        let body = if body_truncated {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            parse_body(
                &bytes,
                response_headers.get("content-type").map(String::as_str),
            )
        };

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text,
            headers: response_headers,
            body,
            body_truncated,
        })
    }

    fn build_url(&self, path: &str, query: &Map<String, Value>) -> Result<Url, ToolError> {
        let joined = if path.is_empty() || path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        let mut url = Url::parse(&joined).map_err(|_| {
            ToolError::invalid_params(format!("Invalid request URL for API '{}'", self.api_name))
        })?;
        if !ALLOWED_HTTP.contains(&format!("{}:", url.scheme()).as_str()) {
            return Err(ToolError::invalid_params("Only http/https URLs are supported"));
        }

        let mut pairs = query_pairs(query);
        let api_key_pair = match &self.auth {
            AuthConfig::ApiKey {
                name,
                value,
                location: ApiKeyLocation::Query,
            } => Some((name.clone(), value.clone())),
            _ => None,
        };
        // The configured key is the only value sent under its name.
        if let Some((key_name, _)) = &api_key_pair {
            pairs.retain(|(key, _)| key != key_name);
        }
        if !pairs.is_empty() || api_key_pair.is_some() {
            let mut writer = url.query_pairs_mut();
            for (key, value) in &pairs {
                writer.append_pair(key, value);
            }
            if let Some((key, value)) = &api_key_pair {
                writer.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Later layers win: defaults, API headers, per-call headers, then auth.
    fn merge_headers(&self, per_call: &BTreeMap<String, String>) -> Vec<(String, String)> {
        let mut merged = vec![
            (
                "User-Agent".to_string(),
                network_constants::USER_AGENT.to_string(),
            ),
            (
                "Accept".to_string(),
                network_constants::DEFAULT_ACCEPT.to_string(),
            ),
        ];
        merged.extend(self.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.extend(per_call.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.extend(build_auth_headers(&self.auth));
        merged
    }
}

fn build_auth_headers(auth: &AuthConfig) -> Vec<(String, String)> {
    match auth {
        AuthConfig::None => Vec::new(),
        AuthConfig::Bearer { token } => {
            let value = if token.to_lowercase().starts_with("bearer ") {
                token.clone()
            } else {
                format!("Bearer {}", token)
            };
            vec![("Authorization".to_string(), value)]
        }
        AuthConfig::ApiKey {
            name,
            value,
            location: ApiKeyLocation::Header,
        } => vec![(name.clone(), value.clone())],
        AuthConfig::ApiKey { .. } => Vec::new(),
        AuthConfig::Basic { username, password } => {
            let encoded = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", username, password));
            vec![("Authorization".to_string(), format!("Basic {}", encoded))]
        }
    }
}

/// Header names are case-insensitive, so `insert` replaces any earlier layer's value.
fn headers_to_headermap(headers: &[(String, String)]) -> Result<HeaderMap, ToolError> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| ToolError::invalid_params(format!("Invalid header name: {}", key)))?;
        let val = HeaderValue::from_str(value)
            .map_err(|_| ToolError::invalid_params(format!("Invalid value for header: {}", key)))?;
        map.insert(name, val);
    }
    Ok(map)
}

fn headers_to_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for (key, value) in headers {
        if let Ok(text) = value.to_str() {
            map.insert(key.as_str().to_string(), text.to_string());
        }
    }
    map
}

/// Keys sorted; arrays repeat their key; `null` entries are dropped.
fn query_pairs(query: &Map<String, Value>) -> Vec<(String, String)> {
    let mut keys: Vec<&String> = query.keys().collect();
    keys.sort();
    let mut pairs = Vec::new();
    for key in keys {
        match &query[key.as_str()] {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|item| !item.is_null()) {
                    pairs.push((key.clone(), stringify_scalar(item)));
                }
            }
            other => pairs.push((key.clone(), stringify_scalar(other))),
        }
    }
    pairs
}

fn capture_limit(max_response_bytes: Option<usize>) -> usize {
    max_response_bytes
        .unwrap_or(DEFAULT_MAX_RESPONSE_BYTES)
        .saturating_mul(BODY_CAPTURE_FACTOR)
        .max(MIN_BODY_CAPTURE_BYTES)
}

async fn read_capped(
    response: reqwest::Response,
    limit: usize,
) -> Result<(Vec<u8>, bool), ToolError> {
    let mut buffer = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(map_reqwest_error)?;
        let remaining = limit - buffer.len();
        if chunk.len() > remaining {
            buffer.extend_from_slice(&chunk[..remaining]);
            return Ok((buffer, true));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok((buffer, false))
}

fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// JSON content types are parsed; other declared types stay text. Without a content type
/// the body is parsed if it happens to be JSON.
fn parse_body(bytes: &[u8], content_type: Option<&str>) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    let text = String::from_utf8_lossy(bytes);
    let wants_json = match content_type.map(str::trim).filter(|ct| !ct.is_empty()) {
        Some(ct) => is_json_content_type(ct),
        None => true,
    };
    if wants_json {
        if let Ok(parsed) = serde_json::from_str::<Value>(&text) {
            return parsed;
        }
    }
    Value::String(text.into_owned())
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ToolError {
    if err.is_timeout() {
        return ToolError::timeout("HTTP request timed out");
    }
    let message = if err.is_connect() {
        format!("Connection failed: {}", err)
    } else {
        err.to_string()
    };
    ToolError::transport(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api(auth: AuthConfig) -> ApiDescription {
        ApiDescription {
            name: "weather".to_string(),
            base_url: "https://api.weather.test/v1/".to_string(),
            auth,
            headers: BTreeMap::from([
                ("X-Client".to_string(), "api-level".to_string()),
                ("Accept".to_string(), "application/vnd.weather+json".to_string()),
            ]),
            timeout: None,
            tools: Vec::new(),
        }
    }

    fn client_for(api: ApiDescription) -> Result<ApiHttpClient, reqwest::Error> {
        Ok(ApiHttpClient::with_client(&api, build_shared_client()?))
    }

    fn header<'a>(merged: &'a [(String, String)], name: &str) -> Option<&'a str> {
        merged
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn base_path_is_preserved_when_joining() {
        let client = client_for(api(AuthConfig::None)).expect("client");
        let url = client
            .build_url("/forecast/paris", &Map::new())
            .expect("url");
        assert_eq!(url.as_str(), "https://api.weather.test/v1/forecast/paris");
    }

    #[test]
    fn query_is_sorted_and_arrays_repeat() {
        let client = client_for(api(AuthConfig::None)).expect("client");
        let query = json!({"z": 1, "a": ["x", "y"], "skip": null, "flag": true})
            .as_object()
            .cloned()
            .expect("object");
        let url = client.build_url("/search", &query).expect("url");
        assert_eq!(url.query(), Some("a=x&a=y&flag=true&z=1"));
    }

    #[test]
    fn api_key_in_query_is_appended_last() {
        let client = client_for(api(AuthConfig::ApiKey {
            name: "key".into(),
            value: "s3cret".into(),
            location: ApiKeyLocation::Query,
        }))
        .expect("client");
        let query = json!({"days": 3}).as_object().cloned().expect("object");
        let url = client.build_url("/forecast", &query).expect("url");
        assert_eq!(url.query(), Some("days=3&key=s3cret"));
    }

    #[test]
    fn header_layers_apply_in_order_with_auth_last() {
        let client = client_for(api(AuthConfig::Bearer {
            token: "tok".into(),
        }))
        .expect("client");
        let per_call = BTreeMap::from([
            ("X-Client".to_string(), "per-call".to_string()),
            ("authorization".to_string(), "spoofed".to_string()),
        ]);
        let merged = client.merge_headers(&per_call);
        assert_eq!(header(&merged, "Accept"), Some("application/vnd.weather+json"));
        assert_eq!(header(&merged, "X-Client"), Some("per-call"));
        assert_eq!(header(&merged, "Authorization"), Some("Bearer tok"));

        let map = headers_to_headermap(&merged).expect("header map");
        assert_eq!(map.get("authorization").and_then(|v| v.to_str().ok()), Some("Bearer tok"));
        assert_eq!(map.get_all("x-client").iter().count(), 1);
    }

    #[test]
    fn basic_auth_is_base64_encoded() {
        let headers = build_auth_headers(&AuthConfig::Basic {
            username: "user".into(),
            password: "pass".into(),
        });
        assert_eq!(headers[0].1, "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn body_parsing_follows_content_type() {
        let json_ct = Some("application/json; charset=utf-8");
        assert_eq!(parse_body(b"", json_ct), Value::Null);
        assert_eq!(parse_body(b"{\"a\":1}", json_ct), json!({"a": 1}));
        assert_eq!(parse_body(b"{\"a\":1}", Some("application/problem+json")), json!({"a": 1}));
        assert_eq!(parse_body(b"{broken", json_ct), json!("{broken"));
        assert_eq!(
            parse_body(b"12345678901234567890123456789", Some("text/plain")),
            json!("12345678901234567890123456789")
        );
        assert_eq!(parse_body(b"\"quoted\"", Some("text/plain")), json!("\"quoted\""));
    }

    #[test]
    fn body_without_content_type_is_sniffed() {
        assert_eq!(parse_body(b"{\"a\":1}", None), json!({"a": 1}));
        assert_eq!(parse_body(b"plain words", None), json!("plain words"));
    }

    #[test]
    fn capture_limit_is_a_generous_multiple() {
        assert_eq!(capture_limit(None), MIN_BODY_CAPTURE_BYTES);
        assert_eq!(capture_limit(Some(10)), MIN_BODY_CAPTURE_BYTES);
        assert_eq!(capture_limit(Some(500_000)), 500_000 * BODY_CAPTURE_FACTOR);
    }

    #[test]
    fn query_api_key_replaces_caller_value_of_same_name() {
        let client = client_for(api(AuthConfig::ApiKey {
            name: "appid".into(),
            value: "secret".into(),
            location: ApiKeyLocation::Query,
        }))
        .expect("client");
        let query = json!({"appid": "caller", "q": "x"})
            .as_object()
            .cloned()
            .expect("object");
        let url = client.build_url("/search", &query).expect("url");
        assert_eq!(url.query(), Some("q=x&appid=secret"));
    }
}
