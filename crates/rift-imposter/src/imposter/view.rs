//! JSON projections of imposter state.
//!
//! Every function here is a pure read: the caller gathers a [`ViewState`]
//! and gets back a fresh `serde_json::Value`.

use super::types::{RecordedRequest, Stub, ViewOptions};
use serde_json::{json, Map, Value};

/// Point-in-time inputs for a projection
#[derive(Debug, Clone)]
pub struct ViewState<'a> {
    pub protocol: Option<&'a str>,
    pub port: u16,
    pub url: &'a str,
    pub record_requests: bool,
    pub number_of_requests: u64,
    pub requests: Vec<RecordedRequest>,
    pub stubs: Vec<Stub>,
    pub metadata: Map<String, Value>,
}

/// Build the JSON shape selected by `options`
pub fn project(state: ViewState<'_>, options: &ViewOptions) -> Value {
    let ViewState {
        protocol,
        port,
        url,
        record_requests,
        number_of_requests,
        requests,
        mut stubs,
        metadata,
    } = state;

    if options.replayable {
        stubs = stubs.iter().map(Stub::replayable).collect();
    }
    if options.remove_proxies {
        stubs = remove_proxies(&stubs);
    }

    let mut result = Map::new();
    if let Some(protocol) = protocol {
        result.insert("protocol".to_string(), json!(protocol));
    }
    result.insert("port".to_string(), json!(port));

    // Replayable output carries configuration only, never runtime state
    if !options.replayable {
        result.insert("numberOfRequests".to_string(), json!(number_of_requests));
    }
    if !options.list {
        result.insert("recordRequests".to_string(), json!(record_requests));
        if !options.replayable {
            result.insert("requests".to_string(), json!(requests));
        }
        result.insert("stubs".to_string(), json!(stubs));
    }
    if !options.replayable {
        result.insert("_links".to_string(), links(url));
    }

    // Adapter metadata is spread last and wins on key collisions.
    if !options.list {
        result.extend(metadata);
    }

    Value::Object(result)
}

/// Drop proxy responses, then any stub left without responses
pub fn remove_proxies(stubs: &[Stub]) -> Vec<Stub> {
    stubs.iter().filter_map(Stub::without_proxies).collect()
}

fn links(url: &str) -> Value {
    json!({ "self": { "href": url } })
}
