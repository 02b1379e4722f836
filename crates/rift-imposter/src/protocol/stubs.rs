//! In-memory stub repository.
//!
//! Stubs are kept in declaration order and the first stub whose predicates
//! match wins. Each stub cycles through its responses, honoring `repeat`.

use super::predicates::predicates_match;
use super::proxy::{ProxyMode, ProxyOptions};
use super::{ProxyHelper, ResolveError, StubRepository};
use crate::imposter::{ImposterRequest, Stub, StubResponse};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// A stub plus its response cycling position
#[derive(Debug)]
struct StubState {
    /// Stable identity; positions shift when recorded stubs are inserted
    id: u64,
    stub: Stub,
    response_index: usize,
    repeat_index: usize,
}

impl StubState {
    fn new(id: u64, stub: Stub) -> Self {
        Self {
            id,
            stub,
            response_index: 0,
            repeat_index: 0,
        }
    }

    /// Current response, advancing the cycle
    fn next_response(&mut self) -> Option<StubResponse> {
        let count = self.stub.responses.len();
        if count == 0 {
            return None;
        }
        if self.response_index >= count {
            self.response_index = 0;
            self.repeat_index = 0;
        }

        let response = self.stub.responses[self.response_index].clone();
        self.repeat_index += 1;
        if self.repeat_index >= response.repeat_count() {
            self.repeat_index = 0;
            self.response_index = (self.response_index + 1) % count;
        }
        Some(response)
    }
}

/// Ordered stubs with first-match resolution
pub struct InMemoryStubRepository {
    stubs: RwLock<Vec<StubState>>,
    next_id: AtomicU64,
    proxy: Option<Arc<dyn ProxyHelper>>,
    record_matches: bool,
}

impl InMemoryStubRepository {
    pub fn new() -> Self {
        Self {
            stubs: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            proxy: None,
            record_matches: false,
        }
    }

    /// Forward `proxy` responses through `proxy`
    pub fn with_proxy(mut self, proxy: Arc<dyn ProxyHelper>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Keep a match history on each stub
    pub fn with_record_matches(mut self, record_matches: bool) -> Self {
        self.record_matches = record_matches;
        self
    }

    pub fn len(&self) -> usize {
        self.stubs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.read().is_empty()
    }

    fn track(&self, stub: Stub) -> StubState {
        StubState::new(self.next_id.fetch_add(1, Ordering::Relaxed), stub)
    }

    /// Id of the first matching stub and the response it serves
    fn select(&self, request: &ImposterRequest) -> Option<(u64, Option<StubResponse>)> {
        let mut stubs = self.stubs.write();
        stubs
            .iter_mut()
            .find(|state| predicates_match(&state.stub.predicates, request))
            .map(|state| (state.id, state.next_response()))
    }

    async fn forward(
        &self,
        proxy: &Value,
        request: &ImposterRequest,
    ) -> Result<(Value, ProxyOptions), ResolveError> {
        let options: ProxyOptions = serde_json::from_value(proxy.clone())
            .map_err(|e| ResolveError::InvalidResponse(format!("invalid proxy response: {e}")))?;
        let helper = self.proxy.as_ref().ok_or_else(|| {
            ResolveError::InvalidResponse("proxy responses are not supported here".to_string())
        })?;
        let proxied = helper.to(&options.to, request, &options).await?;
        Ok((proxied, options))
    }

    /// Save a proxied response according to the proxy mode
    fn save_proxied(
        &self,
        stubs: &mut Vec<StubState>,
        proxy_index: usize,
        request: &ImposterRequest,
        proxied: &Value,
        options: &ProxyOptions,
    ) {
        let recorded = options.recorded_stub(request, proxied);
        let proxy_index = proxy_index.min(stubs.len());

        match options.mode {
            ProxyMode::ProxyTransparent => {}
            ProxyMode::ProxyOnce => {
                debug!(index = proxy_index, "Saving proxied response before proxy stub");
                stubs.insert(proxy_index, self.track(recorded));
            }
            ProxyMode::ProxyAlways => {
                let existing = stubs.iter_mut().skip(proxy_index + 1).find(|state| {
                    state.stub.predicates == recorded.predicates
                        && !state.stub.responses.iter().any(StubResponse::is_proxy)
                });
                match existing {
                    Some(state) => state.stub.responses.extend(recorded.responses),
                    None => {
                        let at = (proxy_index + 1).min(stubs.len());
                        stubs.insert(at, self.track(recorded));
                    }
                }
            }
        }
    }

    fn record_match(stub: &mut Stub, request: &ImposterRequest, response: &Value) {
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "request": request,
            "response": response,
        });
        stub.matches.get_or_insert_with(Vec::new).push(entry);
    }
}

impl Default for InMemoryStubRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StubRepository for InMemoryStubRepository {
    fn add_stub(&self, stub: Stub) {
        let state = self.track(stub);
        self.stubs.write().push(state);
    }

    fn stubs(&self) -> Vec<Stub> {
        self.stubs
            .read()
            .iter()
            .map(|state| state.stub.clone())
            .collect()
    }

    async fn resolve(&self, request: &ImposterRequest) -> Result<Value, ResolveError> {
        let Some((id, response)) = self.select(request) else {
            debug!("No stub matched, using default response");
            return Ok(Value::Object(Map::new()));
        };
        let Some(response) = response else {
            return Ok(Value::Object(Map::new()));
        };

        let (resolved, proxied_with) = match &response {
            StubResponse::Is { is, .. } => (Value::Object(is.clone()), None),
            StubResponse::Proxy { proxy, .. } => {
                let (proxied, options) = self.forward(proxy, request).await?;
                (proxied, Some(options))
            }
            StubResponse::Inject { .. } => return Err(ResolveError::InjectionUnsupported),
            StubResponse::Other(value) => (value.clone(), None),
        };

        {
            let mut stubs = self.stubs.write();
            // Re-find the stub: concurrent proxies may have shifted it
            let position = stubs.iter().position(|state| state.id == id);
            if self.record_matches {
                if let Some(index) = position {
                    Self::record_match(&mut stubs[index].stub, request, &resolved);
                }
            }
            if let Some(options) = proxied_with.as_ref().filter(|o| o.records()) {
                let index = position.unwrap_or(stubs.len());
                self.save_proxied(&mut stubs, index, request, &resolved, options);
                info!(mode = ?options.mode, to = %options.to, "Recorded proxied response");
            }
        }

        if let Some(wait) = wait_ms(&response) {
            tokio::time::sleep(Duration::from_millis(wait)).await;
        }

        Ok(resolved)
    }
}

/// Fixed `wait` behavior in milliseconds, if any
fn wait_ms(response: &StubResponse) -> Option<u64> {
    response
        .rest()?
        .get("_behaviors")?
        .get("wait")?
        .as_u64()
        .filter(|ms| *ms > 0)
}
