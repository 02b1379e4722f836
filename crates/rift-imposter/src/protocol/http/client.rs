//! reqwest-backed proxy helper for `proxy` stub responses.

use crate::imposter::{ImposterRequest, PROXY_RESPONSE_TIME_FIELD};
use crate::protocol::{ProxyError, ProxyHelper, ProxyOptions};
use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const PROXY_TIMEOUT: Duration = Duration::from_secs(30);

/// Request headers that describe the inbound connection rather than the message
const SKIPPED_REQUEST_HEADERS: &[&str] = &["host", "content-length", "connection"];

/// Response headers that hyper sets itself when replaying
const SKIPPED_RESPONSE_HEADERS: &[&str] = &["transfer-encoding", "connection", "content-length"];

/// Forwards imposter requests to a real HTTP service
#[derive(Debug, Clone)]
pub struct HttpProxy {
    client: reqwest::Client,
}

impl Default for HttpProxy {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpProxy {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(PROXY_TIMEOUT)
            .pool_max_idle_per_host(0) // Disable connection pooling to avoid stale connections
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to configure proxy client, using defaults: {}", e);
                reqwest::Client::new()
            });
        Self { client }
    }

    fn target_url(target: &str, request: &ImposterRequest) -> Result<String, ProxyError> {
        if !(target.starts_with("http://") || target.starts_with("https://")) {
            return Err(ProxyError::InvalidTarget(target.to_string()));
        }
        let path = request.get("path").and_then(Value::as_str).unwrap_or("/");
        let query = request
            .get("query")
            .and_then(Value::as_object)
            .map(encode_query)
            .unwrap_or_default();

        let mut url = format!("{}{}", target.trim_end_matches('/'), path);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        Ok(url)
    }
}

#[async_trait]
impl ProxyHelper for HttpProxy {
    async fn to(
        &self,
        target: &str,
        request: &ImposterRequest,
        options: &ProxyOptions,
    ) -> Result<Value, ProxyError> {
        let url = Self::target_url(target, request)?;
        let method = request.get("method").and_then(Value::as_str).unwrap_or("GET");
        let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|e| ProxyError::Upstream(e.to_string()))?;

        debug!("Proxy request to: {} {}", method, url);
        let mut outbound = self.client.request(method, &url);

        if let Some(headers) = request.get("headers").and_then(Value::as_object) {
            for (name, value) in headers {
                if SKIPPED_REQUEST_HEADERS.contains(&name.to_lowercase().as_str()) {
                    continue;
                }
                for value in header_values(value) {
                    outbound = outbound.header(name.as_str(), value);
                }
            }
        }
        for (name, value) in &options.inject_headers {
            for value in header_values(value) {
                outbound = outbound.header(name.as_str(), value);
            }
        }
        if let Some(body) = outbound_body(request)? {
            outbound = outbound.body(body);
        }

        let start = Instant::now();
        let response = outbound
            .send()
            .await
            .map_err(|e| ProxyError::Upstream(e.to_string()))?;

        let status = response.status().as_u16();
        let mut headers = Map::new();
        for (name, value) in response.headers() {
            if SKIPPED_RESPONSE_HEADERS.contains(&name.as_str()) {
                continue;
            }
            headers.insert(
                name.to_string(),
                json!(String::from_utf8_lossy(value.as_bytes())),
            );
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProxyError::Upstream(e.to_string()))?;
        let elapsed = start.elapsed().as_millis() as u64;

        let mut fields = Map::new();
        fields.insert("statusCode".to_string(), json!(status));
        fields.insert("headers".to_string(), Value::Object(headers));
        match String::from_utf8(bytes.to_vec()) {
            Ok(text) => {
                fields.insert("body".to_string(), json!(text));
            }
            Err(_) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                fields.insert("body".to_string(), json!(encoded));
                fields.insert("_mode".to_string(), json!("binary"));
            }
        }
        fields.insert(PROXY_RESPONSE_TIME_FIELD.to_string(), json!(elapsed));

        debug!("Proxied {} in {}ms with status {}", url, elapsed, status);
        Ok(Value::Object(fields))
    }
}

/// Request body bytes, decoding base64 when the request is in binary mode
fn outbound_body(request: &ImposterRequest) -> Result<Option<Vec<u8>>, ProxyError> {
    let Some(body) = request.get("body").and_then(Value::as_str) else {
        return Ok(None);
    };
    if body.is_empty() {
        return Ok(None);
    }
    let binary = request
        .get("_mode")
        .and_then(Value::as_str)
        .is_some_and(|mode| mode == "binary");
    if binary {
        base64::engine::general_purpose::STANDARD
            .decode(body)
            .map(Some)
            .map_err(|e| ProxyError::Upstream(format!("invalid binary request body: {e}")))
    } else {
        Ok(Some(body.as_bytes().to_vec()))
    }
}

fn header_values(value: &Value) -> Vec<String> {
    match value {
        Value::Array(values) => values.iter().map(value_text).collect(),
        other => vec![value_text(other)],
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn encode_query(query: &Map<String, Value>) -> String {
    let mut pairs = Vec::new();
    for (key, value) in query {
        for value in header_values(value) {
            pairs.push(format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(&value)
            ));
        }
    }
    pairs.join("&")
}
