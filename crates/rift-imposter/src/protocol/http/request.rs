//! Conversion of hyper requests into imposter requests.

use crate::imposter::ImposterRequest;
use base64::Engine;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::Request;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;

/// Read an HTTP request into the JSON shape used by predicates and the journal:
/// `requestFrom`, `ip`, `method`, `path`, `query`, `headers`, `body`.
pub async fn to_imposter_request(req: Request<Incoming>, client_addr: SocketAddr) -> ImposterRequest {
    let (parts, body) = req.into_parts();

    let mut headers = Map::new();
    for (name, value) in &parts.headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        append_value(&mut headers, name.as_str(), value);
    }

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes().to_vec(),
        Err(_) => Vec::new(),
    };

    let mut request = Map::new();
    request.insert("requestFrom".to_string(), json!(client_addr.to_string()));
    request.insert("ip".to_string(), json!(client_addr.ip().to_string()));
    request.insert("method".to_string(), json!(parts.method.as_str()));
    request.insert("path".to_string(), json!(parts.uri.path()));
    request.insert(
        "query".to_string(),
        Value::Object(parse_query_string(parts.uri.query().unwrap_or(""))),
    );
    request.insert("headers".to_string(), Value::Object(headers));
    insert_body(&mut request, body);
    request
}

/// Store a body as text, or as base64 with `_mode: "binary"` when it is not UTF-8
pub fn insert_body(request: &mut ImposterRequest, body: Vec<u8>) {
    match String::from_utf8(body) {
        Ok(text) => {
            request.insert("body".to_string(), json!(text));
        }
        Err(e) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(e.into_bytes());
            request.insert("body".to_string(), json!(encoded));
            request.insert("_mode".to_string(), json!("binary"));
        }
    }
}

/// Parse a query string; repeated keys collect into an array
pub fn parse_query_string(query: &str) -> Map<String, Value> {
    let mut params = Map::new();
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let mut parts = pair.splitn(2, '=');
        let key = decode(parts.next().unwrap_or_default());
        let value = decode(parts.next().unwrap_or_default());
        append_value(&mut params, &key, value);
    }
    params
}

fn decode(component: &str) -> String {
    let component = component.replace('+', " ");
    urlencoding::decode(&component)
        .map(|s| s.into_owned())
        .unwrap_or(component)
}

fn append_value(map: &mut Map<String, Value>, key: &str, value: String) {
    match map.get_mut(key) {
        Some(Value::Array(values)) => values.push(Value::String(value)),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, Value::String(value)]);
        }
        None => {
            map.insert(key.to_string(), Value::String(value));
        }
    }
}
