//! HTTP protocol adapter.
//!
//! Each imposter gets its own `TcpListener` served by hyper. Requests are
//! turned into JSON objects, dispatched to the imposter, and the resolved
//! value is rendered back as an HTTP response.

mod client;
mod request;
mod response;

pub use client::HttpProxy;
pub use request::{parse_query_string, to_imposter_request};
pub use response::{build_response_with_headers, error_response, to_http_response};

use super::stubs::InMemoryStubRepository;
use super::{
    ProtocolAdapterFactory, ProtocolError, ProxyHelper, RequestHandler, ServerHandle,
    StubRepository,
};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// HTTP-specific keys of an imposter creation request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HttpImposterOptions {
    /// `0` or absent lets the OS choose
    #[serde(default)]
    port: u16,
    #[serde(default = "default_host")]
    host: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    record_matches: bool,
    #[serde(default)]
    default_response: Option<Map<String, Value>>,
}

/// Creates hyper-backed HTTP servers
#[derive(Debug, Default, Clone)]
pub struct HttpAdapterFactory;

#[async_trait]
impl ProtocolAdapterFactory for HttpAdapterFactory {
    async fn create_server(&self, options: &Value) -> Result<Box<dyn ServerHandle>, ProtocolError> {
        let options: HttpImposterOptions = serde_json::from_value(options.clone())
            .map_err(|e| ProtocolError::InvalidOptions(e.to_string()))?;

        let listener = TcpListener::bind((options.host.as_str(), options.port))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AddrInUse => ProtocolError::PortInUse(options.port),
                _ => ProtocolError::Bind(options.port, e.to_string()),
            })?;
        let port = listener
            .local_addr()
            .map_err(|e| ProtocolError::Bind(options.port, e.to_string()))?
            .port();

        info!("Imposter bound to {}:{}", options.host, port);
        Ok(Box::new(HttpServer::new(listener, port, options)))
    }
}

/// A bound HTTP listener for one imposter
pub struct HttpServer {
    port: u16,
    metadata: Map<String, Value>,
    default_response: Arc<Map<String, Value>>,
    stubs: Arc<InMemoryStubRepository>,
    proxy: Arc<HttpProxy>,
    listener: Mutex<Option<TcpListener>>,
    shutdown_tx: broadcast::Sender<()>,
    closed: AtomicBool,
}

impl HttpServer {
    fn new(listener: TcpListener, port: u16, options: HttpImposterOptions) -> Self {
        let proxy = Arc::new(HttpProxy::new());
        let stubs = InMemoryStubRepository::new()
            .with_proxy(Arc::clone(&proxy) as Arc<dyn ProxyHelper>)
            .with_record_matches(options.record_matches);

        let mut metadata = Map::new();
        if let Some(name) = options.name {
            metadata.insert("name".to_string(), Value::String(name));
        }
        if let Some(ref default_response) = options.default_response {
            metadata.insert(
                "defaultResponse".to_string(),
                Value::Object(default_response.clone()),
            );
        }

        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            port,
            metadata,
            default_response: Arc::new(options.default_response.unwrap_or_default()),
            stubs: Arc::new(stubs),
            proxy,
            listener: Mutex::new(Some(listener)),
            shutdown_tx,
            closed: AtomicBool::new(false),
        }
    }
}

impl ServerHandle for HttpServer {
    fn port(&self) -> u16 {
        self.port
    }

    fn encoding(&self) -> &str {
        "utf8"
    }

    fn metadata(&self) -> Map<String, Value> {
        self.metadata.clone()
    }

    fn stubs(&self) -> Arc<dyn StubRepository> {
        Arc::clone(&self.stubs) as Arc<dyn StubRepository>
    }

    fn proxy(&self) -> Arc<dyn ProxyHelper> {
        Arc::clone(&self.proxy) as Arc<dyn ProxyHelper>
    }

    fn listen(&self, handler: Arc<dyn RequestHandler>) {
        let Some(listener) = self.listener.lock().take() else {
            warn!(port = self.port, "Imposter server is already listening");
            return;
        };
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        let port = self.port;
        let default_response = Arc::clone(&self.default_response);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                let handler = Arc::clone(&handler);
                                let default_response = Arc::clone(&default_response);
                                tokio::spawn(async move {
                                    let io = TokioIo::new(stream);
                                    let service = service_fn(move |req| {
                                        let handler = Arc::clone(&handler);
                                        let default_response = Arc::clone(&default_response);
                                        async move {
                                            Ok::<_, Infallible>(
                                                handle_request(req, handler, addr, &default_response).await,
                                            )
                                        }
                                    });
                                    if let Err(e) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection error on port {}: {}", port, e);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Accept error on port {}: {}", port, e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Imposter on port {} shutting down", port);
                        break;
                    }
                }
            }
        });
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Drop a listener that never started serving
        self.listener.lock().take();
        let _ = self.shutdown_tx.send(());
    }
}

/// Handle a request to an imposter
async fn handle_request(
    req: Request<Incoming>,
    handler: Arc<dyn RequestHandler>,
    client_addr: SocketAddr,
    default_response: &Map<String, Value>,
) -> Response<Full<Bytes>> {
    let request = to_imposter_request(req, client_addr).await;
    match handler.respond(&request).await {
        Ok(resolved) => to_http_response(resolved, default_response),
        Err(e) => {
            warn!("Failed to resolve request from {}: {}", client_addr, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}
