//! Type definitions for Mountebank-compatible imposters.
//!
//! This module contains the stub/response model, recorded requests, view
//! options and the registry-level error type.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Protocol-neutral request as seen by an imposter: a JSON object whose keys
/// are defined by the protocol adapter (`method`, `path`, `data`, ...).
pub type ImposterRequest = Map<String, Value>;

/// Internal timing field added to `is` responses saved from a proxied call.
pub const PROXY_RESPONSE_TIME_FIELD: &str = "_proxyResponseTime";

// ============================================================================
// Recorded Request Types
// ============================================================================

/// A journaled request: an owned copy of the inbound request plus the time it
/// was observed. Serializes as the request's own keys plus `timestamp`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub request: ImposterRequest,
    pub timestamp: DateTime<Utc>,
}

impl RecordedRequest {
    pub fn capture(request: &ImposterRequest) -> Self {
        Self {
            request: request.clone(),
            timestamp: Utc::now(),
        }
    }
}

impl Serialize for RecordedRequest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let fields = self.request.iter().filter(|(k, _)| *k != "timestamp");
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in fields {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry(
            "timestamp",
            &self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        )?;
        map.end()
    }
}

// ============================================================================
// Stub Types
// ============================================================================

/// Stub definition (Mountebank-compatible).
///
/// Keys other than `predicates`, `responses` and `matches` (for example
/// `scenarioName`) are carried through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stub {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predicates: Vec<Value>,
    #[serde(default)]
    pub responses: Vec<StubResponse>,
    /// Runtime match history; never part of a stub's declarative identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Stub {
    pub fn with_responses(responses: Vec<StubResponse>) -> Self {
        Self {
            responses,
            ..Default::default()
        }
    }

    /// Copy of this stub without runtime-only state, suitable for replay
    pub fn replayable(&self) -> Self {
        Self {
            predicates: self.predicates.clone(),
            responses: self
                .responses
                .iter()
                .map(StubResponse::without_proxy_timing)
                .collect(),
            matches: None,
            extra: self.extra.clone(),
        }
    }

    /// Copy of this stub with every proxy response removed, or `None` when
    /// nothing else is left.
    pub fn without_proxies(&self) -> Option<Self> {
        let responses: Vec<StubResponse> = self
            .responses
            .iter()
            .filter(|r| !r.is_proxy())
            .cloned()
            .collect();

        if responses.is_empty() {
            return None;
        }
        Some(Self {
            responses,
            ..self.clone()
        })
    }
}

/// Response within a stub.
///
/// Detection precedence follows Mountebank: `is` > `proxy` > `inject`.
/// Anything else is kept verbatim as `Other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum StubResponse {
    Is {
        is: Map<String, Value>,
        /// Sibling keys such as `_behaviors` or `repeat`
        rest: Map<String, Value>,
    },
    Proxy {
        proxy: Value,
        rest: Map<String, Value>,
    },
    Inject {
        inject: Value,
        rest: Map<String, Value>,
    },
    Other(Value),
}

impl StubResponse {
    pub fn is(fields: Map<String, Value>) -> Self {
        Self::Is {
            is: fields,
            rest: Map::new(),
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self, Self::Proxy { .. })
    }

    /// Sibling keys of the variant tag (`_behaviors`, `repeat`, ...)
    pub fn rest(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Is { rest, .. } | Self::Proxy { rest, .. } | Self::Inject { rest, .. } => {
                Some(rest)
            }
            Self::Other(_) => None,
        }
    }

    /// Number of consecutive times this response is served before cycling
    pub fn repeat_count(&self) -> usize {
        let rest = match self.rest() {
            Some(rest) => rest,
            None => return 1,
        };
        let repeat = rest
            .get("repeat")
            .or_else(|| rest.get("_behaviors").and_then(|b| b.get("repeat")));
        repeat
            .and_then(Value::as_u64)
            .map(|n| (n as usize).max(1))
            .unwrap_or(1)
    }

    fn without_proxy_timing(&self) -> Self {
        match self {
            Self::Is { is, rest } => {
                let mut is = is.clone();
                is.remove(PROXY_RESPONSE_TIME_FIELD);
                Self::Is {
                    is,
                    rest: rest.clone(),
                }
            }
            other => other.clone(),
        }
    }
}

impl From<Value> for StubResponse {
    fn from(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return StubResponse::Other(value);
        };

        if let Some(Value::Object(_)) = fields.get("is") {
            if let Some(Value::Object(is)) = fields.remove("is") {
                return StubResponse::Is { is, rest: fields };
            }
        }
        if let Some(proxy) = fields.remove("proxy") {
            return StubResponse::Proxy {
                proxy,
                rest: fields,
            };
        }
        if let Some(inject) = fields.remove("inject") {
            return StubResponse::Inject {
                inject,
                rest: fields,
            };
        }
        StubResponse::Other(Value::Object(fields))
    }
}

impl From<StubResponse> for Value {
    fn from(response: StubResponse) -> Self {
        let (tag, inner, mut rest) = match response {
            StubResponse::Is { is, rest } => ("is", Value::Object(is), rest),
            StubResponse::Proxy { proxy, rest } => ("proxy", proxy, rest),
            StubResponse::Inject { inject, rest } => ("inject", inject, rest),
            StubResponse::Other(value) => return value,
        };
        rest.insert(tag.to_string(), inner);
        Value::Object(rest)
    }
}

// ============================================================================
// View Options
// ============================================================================

/// Selects which JSON projection of an imposter is produced.
///
/// `list` and `replayable` choose the shape; `remove_proxies` filters stubs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewOptions {
    pub list: bool,
    pub replayable: bool,
    pub remove_proxies: bool,
}

impl ViewOptions {
    pub fn list() -> Self {
        Self {
            list: true,
            ..Default::default()
        }
    }

    pub fn replayable() -> Self {
        Self {
            replayable: true,
            ..Default::default()
        }
    }

    /// Parse query parameters from query string
    pub fn parse(query: Option<&str>) -> Self {
        let mut options = Self::default();
        let Some(query) = query else {
            return options;
        };
        for pair in query.split('&') {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or_default();
            let enabled = parts.next().is_some_and(|v| v.eq_ignore_ascii_case("true"));
            match key {
                "list" => options.list = enabled,
                "replayable" => options.replayable = enabled,
                "removeProxies" => options.remove_proxies = enabled,
                _ => {}
            }
        }
        options
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error types for imposter management
#[derive(Debug, thiserror::Error)]
pub enum ImposterError {
    #[error(transparent)]
    Create(#[from] crate::protocol::ProtocolError),
    #[error("Port {0} is already in use")]
    PortInUse(u16),
    #[error("Imposter not found on port {0}")]
    NotFound(u16),
    #[error("Invalid imposter request: {0}")]
    InvalidRequest(String),
}
