//! Tests for the imposter module.
//!
//! These run against an in-process fake protocol so that creation,
//! journaling, view projection and close can be checked without sockets.

use super::*;
use crate::protocol::{
    ProtocolAdapterFactory, ProtocolError, ProxyError, ProxyHelper, ProxyOptions, RequestHandler,
    ResolveError, ServerHandle, StubRepository,
};
use assert_json_diff::assert_json_eq;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::Span;
use tracing_test::traced_test;

// ============================================================================
// Fakes
// ============================================================================

struct FakeStubs {
    stubs: Mutex<Vec<Stub>>,
    /// `Err` holds the message of an `InvalidResponse` failure
    outcome: Mutex<Result<Value, String>>,
}

#[async_trait]
impl StubRepository for FakeStubs {
    fn add_stub(&self, stub: Stub) {
        self.stubs.lock().push(stub);
    }

    fn stubs(&self) -> Vec<Stub> {
        self.stubs.lock().clone()
    }

    async fn resolve(&self, _request: &ImposterRequest) -> Result<Value, ResolveError> {
        tokio::task::yield_now().await;
        self.outcome
            .lock()
            .clone()
            .map_err(ResolveError::InvalidResponse)
    }
}

struct NoProxy;

#[async_trait]
impl ProxyHelper for NoProxy {
    async fn to(
        &self,
        target: &str,
        _request: &ImposterRequest,
        _options: &ProxyOptions,
    ) -> Result<Value, ProxyError> {
        Err(ProxyError::InvalidTarget(target.to_string()))
    }
}

/// Shared state behind the fake factory and every server it hands out
struct FakeProtocol {
    port: u16,
    metadata: Map<String, Value>,
    failure: Option<ProtocolError>,
    stubs: Arc<FakeStubs>,
    created_with: Mutex<Vec<Value>>,
    close_calls: AtomicUsize,
    stubs_at_listen: Mutex<Option<usize>>,
    handler: Mutex<Option<Arc<dyn RequestHandler>>>,
}

impl FakeProtocol {
    fn new() -> Self {
        Self {
            port: 3535,
            metadata: Map::new(),
            failure: None,
            stubs: Arc::new(FakeStubs {
                stubs: Mutex::new(Vec::new()),
                outcome: Mutex::new(Ok(json!("RESPONSE"))),
            }),
            created_with: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
            stubs_at_listen: Mutex::new(None),
            handler: Mutex::new(None),
        }
    }

    fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata.as_object().cloned().unwrap();
        self
    }

    fn failing(mut self, error: ProtocolError) -> Self {
        self.failure = Some(error);
        self
    }

    fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

struct FakeFactory(Arc<FakeProtocol>);

#[async_trait]
impl ProtocolAdapterFactory for FakeFactory {
    async fn create_server(&self, options: &Value) -> Result<Box<dyn ServerHandle>, ProtocolError> {
        self.0.created_with.lock().push(options.clone());
        if let Some(ref error) = self.0.failure {
            return Err(error.clone());
        }
        Ok(Box::new(FakeServer(Arc::clone(&self.0))))
    }
}

struct FakeServer(Arc<FakeProtocol>);

impl ServerHandle for FakeServer {
    fn port(&self) -> u16 {
        self.0.port
    }

    fn encoding(&self) -> &str {
        "utf8"
    }

    fn metadata(&self) -> Map<String, Value> {
        self.0.metadata.clone()
    }

    fn stubs(&self) -> Arc<dyn StubRepository> {
        Arc::clone(&self.0.stubs) as Arc<dyn StubRepository>
    }

    fn proxy(&self) -> Arc<dyn ProxyHelper> {
        Arc::new(NoProxy)
    }

    fn listen(&self, handler: Arc<dyn RequestHandler>) {
        *self.0.stubs_at_listen.lock() = Some(self.0.stubs.stubs.lock().len());
        *self.0.handler.lock() = Some(handler);
    }

    fn close(&self) {
        self.0.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

async fn create(protocol: &Arc<FakeProtocol>, request: Value, global_record_requests: bool) -> Imposter {
    try_create(protocol, request, global_record_requests)
        .await
        .unwrap()
}

async fn try_create(
    protocol: &Arc<FakeProtocol>,
    request: Value,
    global_record_requests: bool,
) -> Result<Imposter, ProtocolError> {
    let factory = FakeFactory(Arc::clone(protocol));
    Imposter::create(&factory, &request, Span::none(), global_record_requests).await
}

fn request(value: Value) -> ImposterRequest {
    value.as_object().cloned().unwrap()
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn test_url_is_derived_from_port() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(&protocol, json!({}), false).await;
    assert_eq!(imposter.url(), "/imposters/3535");
    assert_eq!(imposter.port(), 3535);
    assert_eq!(imposter.encoding(), "utf8");
}

#[tokio::test]
async fn test_creation_request_is_passed_to_protocol_verbatim() {
    let protocol = Arc::new(FakeProtocol::new());
    let _imposter = create(&protocol, json!({"key": "value"}), false).await;
    assert_eq!(*protocol.created_with.lock(), vec![json!({"key": "value"})]);
}

#[tokio::test]
async fn test_stubs_are_registered_in_order_before_listening() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(
        &protocol,
        json!({"stubs": [{"responses": ["FIRST"]}, {"responses": ["SECOND"]}]}),
        false,
    )
    .await;

    assert_eq!(*protocol.stubs_at_listen.lock(), Some(2));
    assert!(protocol.handler.lock().is_some());
    assert_json_eq!(
        imposter.to_json(&ViewOptions::default())["stubs"],
        json!([{"responses": ["FIRST"]}, {"responses": ["SECOND"]}])
    );
}

#[tokio::test]
async fn test_server_failure_is_propagated_unchanged() {
    let protocol = Arc::new(FakeProtocol::new().failing(ProtocolError::PortInUse(3535)));
    let result = try_create(
        &protocol,
        json!({"stubs": [{"responses": ["FIRST"]}]}),
        false,
    )
    .await;

    assert_eq!(result.unwrap_err(), ProtocolError::PortInUse(3535));
    assert!(protocol.stubs.stubs.lock().is_empty());
    assert!(protocol.handler.lock().is_none());
}

#[tokio::test]
async fn test_malformed_stubs_fail_before_server_creation() {
    let protocol = Arc::new(FakeProtocol::new());
    let result = try_create(&protocol, json!({"stubs": {"responses": []}}), false).await;

    assert!(matches!(result, Err(ProtocolError::InvalidOptions(_))));
    assert!(protocol.created_with.lock().is_empty());
}

#[tokio::test]
#[traced_test]
async fn test_creation_is_logged() {
    let protocol = Arc::new(FakeProtocol::new());
    let _imposter = create(&protocol, json!({"protocol": "test"}), false).await;
    assert!(logs_contain("Imposter created"));
}

// ============================================================================
// Views
// ============================================================================

#[tokio::test]
async fn test_list_view_is_trimmed() {
    let protocol = Arc::new(FakeProtocol::new().with_metadata(json!({"key": "value"})));
    let imposter = create(&protocol, json!({"protocol": "test"}), false).await;

    assert_json_eq!(
        imposter.to_json(&ViewOptions::list()),
        json!({
            "protocol": "test",
            "port": 3535,
            "numberOfRequests": 0,
            "_links": {"self": {"href": "/imposters/3535"}}
        })
    );
}

#[tokio::test]
async fn test_default_view_is_complete() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(&protocol, json!({"protocol": "test"}), false).await;

    assert_json_eq!(
        imposter.to_json(&ViewOptions::default()),
        json!({
            "protocol": "test",
            "port": 3535,
            "numberOfRequests": 0,
            "recordRequests": false,
            "requests": [],
            "stubs": [],
            "_links": {"self": {"href": "/imposters/3535"}}
        })
    );
}

#[tokio::test]
async fn test_metadata_is_spread_into_default_view() {
    let protocol = Arc::new(FakeProtocol::new().with_metadata(json!({"key": "value"})));
    let imposter = create(&protocol, json!({"protocol": "test"}), false).await;

    assert_json_eq!(
        imposter.to_json(&ViewOptions::default()),
        json!({
            "protocol": "test",
            "port": 3535,
            "numberOfRequests": 0,
            "recordRequests": false,
            "requests": [],
            "stubs": [],
            "key": "value",
            "_links": {"self": {"href": "/imposters/3535"}}
        })
    );
}

#[tokio::test]
async fn test_replayable_view_omits_runtime_state() {
    let protocol = Arc::new(FakeProtocol::new().with_metadata(json!({"key": "value"})));
    let imposter = create(&protocol, json!({"protocol": "test"}), false).await;
    imposter.get_response_for(&request(json!({}))).await.unwrap();

    assert_json_eq!(
        imposter.to_json(&ViewOptions::replayable()),
        json!({
            "protocol": "test",
            "port": 3535,
            "recordRequests": false,
            "stubs": [],
            "key": "value"
        })
    );
}

#[tokio::test]
async fn test_list_and_replayable_together() {
    let protocol = Arc::new(FakeProtocol::new().with_metadata(json!({"key": "value"})));
    let imposter = create(&protocol, json!({"protocol": "test"}), false).await;
    let options = ViewOptions {
        list: true,
        replayable: true,
        remove_proxies: false,
    };

    assert_json_eq!(
        imposter.to_json(&options),
        json!({"protocol": "test", "port": 3535})
    );
}

#[tokio::test]
async fn test_protocol_is_omitted_when_not_declared() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(&protocol, json!({}), false).await;
    let view = imposter.to_json(&ViewOptions::default());
    assert!(view.get("protocol").is_none());
    assert_eq!(view["port"], json!(3535));
}

#[tokio::test]
async fn test_replayable_view_removes_stub_matches() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(
        &protocol,
        json!({
            "protocol": "test",
            "port": 3535,
            "stubs": [
                {"responses": ["FIRST"], "matches": ["MATCH"]},
                {"responses": ["SECOND"], "matches": ["MATCH"]}
            ]
        }),
        false,
    )
    .await;

    assert_json_eq!(
        imposter.to_json(&ViewOptions::replayable()),
        json!({
            "protocol": "test",
            "port": 3535,
            "recordRequests": false,
            "stubs": [{"responses": ["FIRST"]}, {"responses": ["SECOND"]}]
        })
    );
    // Live state keeps the match history
    assert_json_eq!(
        imposter.to_json(&ViewOptions::default())["stubs"][0]["matches"],
        json!(["MATCH"])
    );
}

#[tokio::test]
async fn test_replayable_view_removes_proxy_response_time() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(
        &protocol,
        json!({
            "protocol": "test",
            "port": 3535,
            "stubs": [{"responses": [{"is": {"body": "body", "_proxyResponseTime": 3}}]}]
        }),
        false,
    )
    .await;

    assert_json_eq!(
        imposter.to_json(&ViewOptions::replayable()),
        json!({
            "protocol": "test",
            "port": 3535,
            "recordRequests": false,
            "stubs": [{"responses": [{"is": {"body": "body"}}]}]
        })
    );
}

#[tokio::test]
async fn test_remove_proxies_keeps_other_responses() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(
        &protocol,
        json!({
            "stubs": [
                {"responses": [
                    {"proxy": {"to": "http://localhost:3000"}},
                    {"is": {"body": "first"}},
                    {"inject": "inject"}
                ]},
                {"responses": [{"is": {"body": "second"}}]}
            ]
        }),
        false,
    )
    .await;

    let options = ViewOptions {
        remove_proxies: true,
        ..Default::default()
    };
    assert_json_eq!(
        imposter.to_json(&options)["stubs"],
        json!([
            {"responses": [{"is": {"body": "first"}}, {"inject": "inject"}]},
            {"responses": [{"is": {"body": "second"}}]}
        ])
    );
}

#[tokio::test]
async fn test_remove_proxies_drops_emptied_stubs() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(
        &protocol,
        json!({
            "stubs": [
                {"responses": [
                    {"proxy": {"to": "http://localhost:3000"}},
                    {"is": {"body": "first"}},
                    {"inject": "inject"}
                ]},
                {"responses": [{"proxy": {"to": "http://localhost:3001"}}]}
            ]
        }),
        false,
    )
    .await;

    let options = ViewOptions {
        remove_proxies: true,
        ..Default::default()
    };
    assert_json_eq!(
        imposter.to_json(&options)["stubs"],
        json!([{"responses": [{"is": {"body": "first"}}, {"inject": "inject"}]}])
    );
    // The live stubs are untouched
    assert_eq!(imposter.stubs().len(), 2);
}

#[tokio::test]
async fn test_stubs_are_read_through_from_repository() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(&protocol, json!({}), false).await;

    imposter
        .server()
        .stubs()
        .add_stub(Stub::with_responses(vec![StubResponse::Other(json!("LATE"))]));

    assert_json_eq!(
        imposter.to_json(&ViewOptions::default())["stubs"],
        json!([{"responses": ["LATE"]}])
    );
}

// ============================================================================
// Recording policy
// ============================================================================

#[tokio::test]
async fn test_global_record_requests_applies_when_unset() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(&protocol, json!({"protocol": "test"}), true).await;

    assert!(imposter.record_requests());
    assert_eq!(
        imposter.to_json(&ViewOptions::default())["recordRequests"],
        json!(true)
    );
}

#[tokio::test]
async fn test_local_record_requests_true_overrides_global() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(
        &protocol,
        json!({"protocol": "test", "port": 3535, "recordRequests": true}),
        false,
    )
    .await;

    assert_json_eq!(
        imposter.to_json(&ViewOptions::default()),
        json!({
            "protocol": "test",
            "port": 3535,
            "numberOfRequests": 0,
            "recordRequests": true,
            "requests": [],
            "stubs": [],
            "_links": {"self": {"href": "/imposters/3535"}}
        })
    );
}

#[tokio::test]
async fn test_local_record_requests_false_overrides_global() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(&protocol, json!({"recordRequests": false}), true).await;

    imposter.get_response_for(&request(json!({"request": 1}))).await.unwrap();

    let view = imposter.to_json(&ViewOptions::default());
    assert_eq!(view["recordRequests"], json!(false));
    assert_eq!(view["numberOfRequests"], json!(1));
    assert_eq!(view["requests"], json!([]));
}

// ============================================================================
// Request handling
// ============================================================================

#[tokio::test]
async fn test_response_is_resolved_by_stubs() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(&protocol, json!({}), false).await;

    let response = imposter.get_response_for(&request(json!({}))).await.unwrap();
    assert_eq!(response, json!("RESPONSE"));
}

#[tokio::test]
async fn test_requests_are_counted_without_recording() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(&protocol, json!({"recordRequests": false}), false).await;

    imposter.get_response_for(&request(json!({}))).await.unwrap();

    let view = imposter.to_json(&ViewOptions::default());
    assert_eq!(view["numberOfRequests"], json!(1));
    assert_eq!(view["requests"], json!([]));
}

#[tokio::test]
async fn test_requests_are_recorded_when_enabled() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(&protocol, json!({"recordRequests": true}), false).await;

    imposter.get_response_for(&request(json!({"request": 1}))).await.unwrap();
    imposter.get_response_for(&request(json!({"request": 2}))).await.unwrap();

    let view = imposter.to_json(&ViewOptions::default());
    assert_eq!(view["numberOfRequests"], json!(2));
    assert_eq!(view["requests"][0]["request"], json!(1));
    assert_eq!(view["requests"][1]["request"], json!(2));
}

#[tokio::test]
async fn test_recorded_request_has_timestamp() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(&protocol, json!({}), true).await;

    imposter.get_response_for(&request(json!({"request": 1}))).await.unwrap();

    let view = imposter.to_json(&ViewOptions::default());
    let recorded = view["requests"][0].as_object().unwrap();
    let mut keys: Vec<&str> = recorded.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["request", "timestamp"]);
    assert_eq!(recorded["request"], json!(1));

    let timestamp = recorded["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn test_recorded_request_is_an_independent_copy() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(&protocol, json!({}), true).await;

    let mut inbound = request(json!({"path": "/before"}));
    imposter.get_response_for(&inbound).await.unwrap();
    inbound.insert("path".to_string(), json!("/after"));

    assert_eq!(imposter.requests()[0].request["path"], json!("/before"));
}

#[tokio::test]
async fn test_failed_resolution_is_still_counted_and_recorded() {
    let protocol = Arc::new(FakeProtocol::new());
    *protocol.stubs.outcome.lock() = Err("boom".to_string());
    let imposter = create(&protocol, json!({}), true).await;

    let result = imposter.get_response_for(&request(json!({"request": 1}))).await;

    assert!(matches!(result, Err(ResolveError::InvalidResponse(ref m)) if m == "boom"));
    assert_eq!(imposter.number_of_requests(), 1);
    assert_eq!(imposter.requests().len(), 1);
}

#[tokio::test]
async fn test_listener_requests_go_through_the_journal() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(&protocol, json!({}), true).await;

    let handler = protocol.handler.lock().clone().unwrap();
    let response = handler.respond(&request(json!({"from": "socket"}))).await.unwrap();

    assert_eq!(response, json!("RESPONSE"));
    assert_eq!(imposter.number_of_requests(), 1);
    assert_eq!(imposter.requests()[0].request["from"], json!("socket"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_are_all_counted_and_recorded() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = Arc::new(create(&protocol, json!({}), true).await);

    let mut tasks = Vec::new();
    for task in 0..16 {
        let imposter = Arc::clone(&imposter);
        tasks.push(tokio::spawn(async move {
            for i in 0..50 {
                imposter
                    .get_response_for(&request(json!({"task": task, "i": i})))
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let (count, requests) = (imposter.number_of_requests(), imposter.requests());
    assert_eq!(count, 800);
    assert_eq!(requests.len(), 800);

    // Each task's requests keep their relative order
    for task in 0..16 {
        let sequence: Vec<u64> = requests
            .iter()
            .filter(|r| r.request["task"] == json!(task))
            .filter_map(|r| r.request["i"].as_u64())
            .collect();
        assert_eq!(sequence, (0..50).collect::<Vec<u64>>());
    }
}

// ============================================================================
// Close
// ============================================================================

#[tokio::test]
async fn test_close_stops_server_once() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(&protocol, json!({}), false).await;

    imposter.close();
    imposter.close();
    assert!(imposter.is_closed());
    assert_eq!(protocol.close_calls(), 1);

    drop(imposter);
    assert_eq!(protocol.close_calls(), 1);
}

#[tokio::test]
async fn test_drop_closes_server() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(&protocol, json!({}), false).await;

    drop(imposter);
    assert_eq!(protocol.close_calls(), 1);
}

#[tokio::test]
async fn test_closed_imposter_still_renders() {
    let protocol = Arc::new(FakeProtocol::new());
    let imposter = create(&protocol, json!({"protocol": "test"}), true).await;
    imposter.get_response_for(&request(json!({}))).await.unwrap();
    imposter.close();

    let view = imposter.to_json(&ViewOptions::default());
    assert_eq!(view["numberOfRequests"], json!(1));
    assert_eq!(view["requests"].as_array().unwrap().len(), 1);
}

// ============================================================================
// ImposterManager
// ============================================================================

fn manager_with(protocol: &Arc<FakeProtocol>, record_requests: bool) -> ImposterManager {
    let mut manager = ImposterManager::without_protocols(record_requests);
    manager.register_protocol("test", Arc::new(FakeFactory(Arc::clone(protocol))));
    manager
}

#[tokio::test]
async fn test_manager_creates_and_finds_imposter() {
    let protocol = Arc::new(FakeProtocol::new());
    let manager = manager_with(&protocol, false);

    let imposter = manager
        .create_imposter(json!({"protocol": "test"}))
        .await
        .unwrap();

    assert_eq!(imposter.port(), 3535);
    assert_eq!(manager.count(), 1);
    assert_eq!(manager.get_imposter(3535).unwrap().url(), "/imposters/3535");
}

#[tokio::test]
async fn test_manager_passes_global_record_requests() {
    let protocol = Arc::new(FakeProtocol::new());
    let manager = manager_with(&protocol, true);

    let imposter = manager
        .create_imposter(json!({"protocol": "test"}))
        .await
        .unwrap();
    assert!(imposter.record_requests());
}

#[tokio::test]
async fn test_manager_rejects_unknown_protocol() {
    let protocol = Arc::new(FakeProtocol::new());
    let manager = manager_with(&protocol, false);

    let result = manager.create_imposter(json!({"protocol": "smtp"})).await;
    assert!(matches!(
        result,
        Err(ImposterError::Create(ProtocolError::UnsupportedProtocol(ref p))) if p == "smtp"
    ));
    assert!(protocol.created_with.lock().is_empty());
}

#[tokio::test]
async fn test_manager_rejects_non_object_request() {
    let manager = ImposterManager::without_protocols(false);
    let result = manager.create_imposter(json!([1, 2])).await;
    assert!(matches!(result, Err(ImposterError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_manager_rejects_taken_port() {
    let protocol = Arc::new(FakeProtocol::new());
    let manager = manager_with(&protocol, false);

    let _first = manager
        .create_imposter(json!({"protocol": "test", "port": 3535}))
        .await
        .unwrap();
    let second = manager
        .create_imposter(json!({"protocol": "test", "port": 3535}))
        .await;

    assert!(matches!(second, Err(ImposterError::PortInUse(3535))));
    assert_eq!(protocol.created_with.lock().len(), 1);
}

#[tokio::test]
async fn test_manager_delete_returns_state_and_closes() {
    let protocol = Arc::new(FakeProtocol::new());
    let manager = manager_with(&protocol, true);

    let imposter = manager
        .create_imposter(json!({"protocol": "test"}))
        .await
        .unwrap();
    imposter.get_response_for(&request(json!({}))).await.unwrap();

    let deleted = manager
        .delete_imposter(3535, &ViewOptions::default())
        .unwrap();
    assert_eq!(deleted["numberOfRequests"], json!(1));
    assert!(imposter.is_closed());
    assert_eq!(protocol.close_calls(), 1);
    assert!(matches!(
        manager.get_imposter(3535),
        Err(ImposterError::NotFound(3535))
    ));
    assert!(matches!(
        manager.delete_imposter(3535, &ViewOptions::default()),
        Err(ImposterError::NotFound(3535))
    ));
}

#[tokio::test]
async fn test_manager_to_json_lists_or_replays() {
    let protocol = Arc::new(FakeProtocol::new());
    let manager = manager_with(&protocol, false);
    manager
        .create_imposter(json!({"protocol": "test", "stubs": [{"responses": ["FIRST"]}]}))
        .await
        .unwrap();

    assert_json_eq!(
        manager.to_json(&ViewOptions::default()),
        json!({"imposters": [{
            "protocol": "test",
            "port": 3535,
            "numberOfRequests": 0,
            "_links": {"self": {"href": "/imposters/3535"}}
        }]})
    );
    assert_json_eq!(
        manager.to_json(&ViewOptions::replayable()),
        json!({"imposters": [{
            "protocol": "test",
            "port": 3535,
            "recordRequests": false,
            "stubs": [{"responses": ["FIRST"]}]
        }]})
    );
}

#[tokio::test]
async fn test_manager_delete_all_empties_registry() {
    let protocol = Arc::new(FakeProtocol::new());
    let manager = manager_with(&protocol, false);
    manager
        .create_imposter(json!({"protocol": "test"}))
        .await
        .unwrap();

    let removed = manager.delete_all(&ViewOptions::replayable());
    assert_eq!(removed.len(), 1);
    assert_eq!(manager.count(), 0);
    assert_eq!(protocol.close_calls(), 1);
}
