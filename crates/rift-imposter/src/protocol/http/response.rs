//! Rendering of resolved imposter responses as HTTP responses.

use base64::Engine;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// Error response structure
#[derive(Debug, Serialize)]
struct ErrorResponse {
    errors: Vec<ErrorDetail>,
}

/// Individual error detail
#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Render resolved `is`-style fields, layered over the imposter's default response.
///
/// Non-object values are sent as the body of a `200` response.
pub fn to_http_response(resolved: Value, default_response: &Map<String, Value>) -> Response<Full<Bytes>> {
    let mut fields = default_response.clone();
    match resolved {
        Value::Object(resolved) => fields.extend(resolved),
        Value::Null => {}
        other => {
            fields.insert("body".to_string(), other);
        }
    }

    let status = status_code(fields.get("statusCode"));
    let binary = fields
        .get("_mode")
        .and_then(Value::as_str)
        .is_some_and(|mode| mode == "binary");

    let mut headers: Vec<(String, String)> = Vec::new();
    if let Some(Value::Object(declared)) = fields.get("headers") {
        for (name, value) in declared {
            match value {
                Value::Array(values) => {
                    headers.extend(values.iter().map(|v| (name.clone(), header_text(v))))
                }
                other => headers.push((name.clone(), header_text(other))),
            }
        }
    }

    let body = match fields.remove("body") {
        None | Some(Value::Null) => Bytes::new(),
        Some(Value::String(text)) if binary => {
            match base64::engine::general_purpose::STANDARD.decode(text.as_bytes()) {
                Ok(decoded) => Bytes::from(decoded),
                Err(e) => {
                    return error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        &format!("Invalid base64 body: {e}"),
                    )
                }
            }
        }
        Some(Value::String(text)) => Bytes::from(text),
        Some(json @ (Value::Object(_) | Value::Array(_))) => {
            if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
            }
            Bytes::from(serde_json::to_string_pretty(&json).unwrap_or_default())
        }
        Some(other) => Bytes::from(other.to_string()),
    };

    // Body length is recomputed by hyper
    headers.retain(|(k, _)| {
        !k.eq_ignore_ascii_case("content-length") && !k.eq_ignore_ascii_case("transfer-encoding")
    });

    build_response_with_headers(status, headers, body)
}

fn status_code(value: Option<&Value>) -> StatusCode {
    let code = match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse::<u16>().ok(),
        _ => Some(200),
    };
    code.and_then(|c| StatusCode::from_u16(c).ok())
        .unwrap_or_else(|| {
            warn!("Invalid statusCode {:?}, using 200", value);
            StatusCode::OK
        })
}

fn header_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build an HTTP response with headers.
///
/// This function handles the unlikely case where Response::builder() fails
/// by returning a minimal 500 error response.
pub fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder.body(Full::new(body.into())).unwrap_or_else(|_| {
        let mut response = Response::new(Full::new(Bytes::from("Internal Server Error")));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}

/// Create an error response
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let error = ErrorResponse {
        errors: vec![ErrorDetail {
            code: status.as_str().to_string(),
            message: message.to_string(),
        }],
    };
    let json = serde_json::to_string_pretty(&error).unwrap_or_else(|_| "{}".to_string());
    build_response_with_headers(status, [("Content-Type", "application/json")], json)
}
