//! Proxy response configuration and record/replay stub generation.
//!
//! Supports three modes:
//! - `proxyOnce`: Record first response, replay on subsequent matches
//! - `proxyAlways`: Always proxy, record all responses
//! - `proxyTransparent`: Always proxy, never record

use crate::imposter::{ImposterRequest, Stub, StubResponse, PROXY_RESPONSE_TIME_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Proxy recording mode (Mountebank-compatible)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::enum_variant_names)] // Keep Mountebank-compatible names
pub enum ProxyMode {
    /// Record first response, replay on subsequent matches (Mountebank default)
    #[default]
    ProxyOnce,
    /// Always proxy, record all responses (for later replay)
    ProxyAlways,
    /// Always proxy, never record
    ProxyTransparent,
}

/// Which request fields become predicates of a recorded stub
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredicateGenerator {
    /// Field selection, e.g. `{"method": true, "query": {"id": true}}`
    #[serde(default)]
    pub matches: Map<String, Value>,
    #[serde(default)]
    pub case_sensitive: Option<bool>,
}

/// Contents of a `proxy` stub response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyOptions {
    pub to: String,
    #[serde(default)]
    pub mode: ProxyMode,
    #[serde(default)]
    pub predicate_generators: Vec<PredicateGenerator>,
    /// Save the observed latency as a `wait` behavior on recorded responses
    #[serde(default)]
    pub add_wait_behavior: bool,
    #[serde(default)]
    pub inject_headers: Map<String, Value>,
}

impl ProxyOptions {
    pub fn records(&self) -> bool {
        self.mode != ProxyMode::ProxyTransparent
    }

    /// Build the stub saved after a proxied call
    pub fn recorded_stub(&self, request: &ImposterRequest, proxied: &Value) -> Stub {
        Stub {
            predicates: generate_predicates(&self.predicate_generators, request),
            responses: vec![self.recorded_response(proxied)],
            ..Default::default()
        }
    }

    /// Wrap proxied fields as an `is` response
    pub fn recorded_response(&self, proxied: &Value) -> StubResponse {
        let is = proxied.as_object().cloned().unwrap_or_default();
        let mut rest = Map::new();
        if self.add_wait_behavior {
            if let Some(latency) = is.get(PROXY_RESPONSE_TIME_FIELD).and_then(Value::as_u64) {
                rest.insert("_behaviors".to_string(), json!({ "wait": latency }));
            }
        }
        StubResponse::Is { is, rest }
    }
}

/// Generate `deepEquals` predicates from the selected request fields
pub fn generate_predicates(
    generators: &[PredicateGenerator],
    request: &ImposterRequest,
) -> Vec<Value> {
    generators
        .iter()
        .filter_map(|generator| {
            let selected = select_fields(&generator.matches, request);
            if selected.is_empty() {
                return None;
            }
            let mut predicate = Map::new();
            predicate.insert("deepEquals".to_string(), Value::Object(selected));
            if let Some(case_sensitive) = generator.case_sensitive {
                predicate.insert("caseSensitive".to_string(), json!(case_sensitive));
            }
            Some(Value::Object(predicate))
        })
        .collect()
}

fn select_fields(selection: &Map<String, Value>, source: &Map<String, Value>) -> Map<String, Value> {
    let mut selected = Map::new();
    for (key, wanted) in selection {
        let Some(value) = source.get(key) else {
            continue;
        };
        match wanted {
            Value::Bool(true) => {
                selected.insert(key.clone(), value.clone());
            }
            Value::Object(nested) => {
                if let Some(source_nested) = value.as_object() {
                    let nested = select_fields(nested, source_nested);
                    if !nested.is_empty() {
                        selected.insert(key.clone(), Value::Object(nested));
                    }
                }
            }
            _ => {}
        }
    }
    selected
}
