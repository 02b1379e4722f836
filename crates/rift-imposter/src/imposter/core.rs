//! Core Imposter struct and implementation.
//!
//! An `Imposter` owns one protocol server, the request journal and the
//! recording policy. Stubs live in the server's `StubRepository` and are
//! only referenced from here.

use super::journal::RequestJournal;
use super::types::{ImposterRequest, RecordedRequest, Stub, ViewOptions};
use super::view::{project, ViewState};
use crate::protocol::{
    ProtocolAdapterFactory, ProtocolError, RequestHandler, ResolveError, ServerHandle,
    StubRepository,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, Instrument, Span};

/// State shared between the imposter and its listener
struct Dispatcher {
    journal: RequestJournal,
    stubs: Arc<dyn StubRepository>,
    span: Span,
}

#[async_trait]
impl RequestHandler for Dispatcher {
    async fn respond(&self, request: &ImposterRequest) -> Result<Value, ResolveError> {
        // Counted and journaled before resolution so failed requests stay visible.
        self.journal.observe(request);
        self.stubs
            .resolve(request)
            .instrument(self.span.clone())
            .await
    }
}

/// Runtime state of an imposter
pub struct Imposter {
    protocol: Option<String>,
    port: u16,
    encoding: String,
    url: String,
    dispatcher: Arc<Dispatcher>,
    server: Box<dyn ServerHandle>,
    closed: AtomicBool,
}

impl Imposter {
    /// Create an imposter from a raw creation request.
    ///
    /// `request` is handed to `factory` untouched. Declared stubs are
    /// registered in order before the listener starts dispatching, and
    /// `recordRequests` from the request (when it is a boolean) overrides
    /// `global_record_requests`. Server creation errors are returned as-is.
    pub async fn create(
        factory: &dyn ProtocolAdapterFactory,
        request: &Value,
        span: Span,
        global_record_requests: bool,
    ) -> Result<Self, ProtocolError> {
        let declared_stubs = declared_stubs(request)?;
        let record_requests = request
            .get("recordRequests")
            .and_then(Value::as_bool)
            .unwrap_or(global_record_requests);

        let server = factory
            .create_server(request)
            .instrument(span.clone())
            .await?;

        let stubs = server.stubs();
        for stub in declared_stubs {
            stubs.add_stub(stub);
        }

        let port = server.port();
        let protocol = request
            .get("protocol")
            .and_then(Value::as_str)
            .map(str::to_string);

        let dispatcher = Arc::new(Dispatcher {
            journal: RequestJournal::new(record_requests),
            stubs,
            span: span.clone(),
        });
        server.listen(Arc::clone(&dispatcher) as Arc<dyn RequestHandler>);

        span.in_scope(|| {
            info!(
                port,
                protocol = protocol.as_deref().unwrap_or("unknown"),
                record_requests,
                "Imposter created"
            );
        });

        Ok(Self {
            protocol,
            port,
            encoding: server.encoding().to_string(),
            url: format!("/imposters/{port}"),
            dispatcher,
            server,
            closed: AtomicBool::new(false),
        })
    }

    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Resource path of this imposter (`/imposters/{port}`)
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn record_requests(&self) -> bool {
        self.dispatcher.journal.record_requests()
    }

    pub fn number_of_requests(&self) -> u64 {
        self.dispatcher.journal.number_of_requests()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.dispatcher.journal.requests()
    }

    /// Current stubs, read through from the server's repository
    pub fn stubs(&self) -> Vec<Stub> {
        self.dispatcher.stubs.stubs()
    }

    pub fn metadata(&self) -> Map<String, Value> {
        self.server.metadata()
    }

    pub fn server(&self) -> &dyn ServerHandle {
        self.server.as_ref()
    }

    /// Count, journal, then resolve `request` against the stubs
    pub async fn get_response_for(&self, request: &ImposterRequest) -> Result<Value, ResolveError> {
        self.dispatcher.respond(request).await
    }

    /// JSON projection of this imposter; see [`ViewOptions`]
    pub fn to_json(&self, options: &ViewOptions) -> Value {
        let (number_of_requests, requests) = self.dispatcher.journal.snapshot();
        let state = ViewState {
            protocol: self.protocol.as_deref(),
            port: self.port,
            url: &self.url,
            record_requests: self.record_requests(),
            number_of_requests,
            requests,
            stubs: self.stubs(),
            metadata: self.metadata(),
        };
        project(state, options)
    }

    /// Stop the underlying server. Only the first call has an effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.server.close();
        self.dispatcher.span.in_scope(|| {
            info!(port = self.port, "Imposter closed");
        });
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Imposter {
    fn drop(&mut self) {
        if !self.is_closed() {
            debug!(port = self.port, "Closing imposter on drop");
            self.close();
        }
    }
}

impl fmt::Debug for Imposter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Imposter")
            .field("protocol", &self.protocol)
            .field("port", &self.port)
            .field("record_requests", &self.record_requests())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Stubs listed in a creation request, in declared order
fn declared_stubs(request: &Value) -> Result<Vec<Stub>, ProtocolError> {
    match request.get("stubs") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(stubs) => serde_json::from_value(stubs.clone())
            .map_err(|e| ProtocolError::InvalidOptions(format!("invalid stubs: {e}"))),
    }
}
