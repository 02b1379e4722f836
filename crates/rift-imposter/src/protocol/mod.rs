//! Protocol collaborator contracts for imposters.
//!
//! An imposter never touches sockets or matching logic directly. It talks to:
//! - `ProtocolAdapterFactory`: stands up a listener for a creation request
//! - `ServerHandle`: the live listener (port, metadata, stubs, close)
//! - `StubRepository`: ordered stubs and request resolution
//! - `ProxyHelper`: forwards a request to a real backend
//!
//! The `http` submodule provides the HTTP adapter; `stubs` provides the
//! in-memory repository that it uses.
//!
//! ## Module Structure
//!
//! - `http`: hyper-based listener and reqwest-based proxy helper
//! - `predicates`: JSON predicate evaluation for stub matching
//! - `proxy`: proxy modes and recorded-stub generation
//! - `stubs`: in-memory `StubRepository`

pub mod http;
pub mod predicates;
pub mod proxy;
pub mod stubs;

use crate::imposter::{ImposterRequest, Stub};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

pub use proxy::{ProxyMode, ProxyOptions};
pub use stubs::InMemoryStubRepository;

/// Builds protocol servers from raw creation requests.
#[async_trait]
pub trait ProtocolAdapterFactory: Send + Sync {
    /// Bind a server for `options`, the creation request passed through verbatim.
    async fn create_server(&self, options: &Value) -> Result<Box<dyn ServerHandle>, ProtocolError>;
}

/// A live protocol listener bound to one port.
pub trait ServerHandle: Send + Sync {
    fn port(&self) -> u16;

    fn encoding(&self) -> &str;

    /// Protocol-specific fields merged into imposter views
    fn metadata(&self) -> Map<String, Value>;

    fn stubs(&self) -> Arc<dyn StubRepository>;

    fn proxy(&self) -> Arc<dyn ProxyHelper>;

    /// Start dispatching inbound requests to `handler`
    fn listen(&self, handler: Arc<dyn RequestHandler>);

    /// Stop accepting connections. Safe to call more than once.
    fn close(&self);
}

/// Ordered stub storage plus request resolution.
#[async_trait]
pub trait StubRepository: Send + Sync {
    /// Append a stub, preserving order
    fn add_stub(&self, stub: Stub);

    /// Current stubs in resolution order
    fn stubs(&self) -> Vec<Stub>;

    async fn resolve(&self, request: &ImposterRequest) -> Result<Value, ResolveError>;
}

/// Forwards a request to a real service.
#[async_trait]
pub trait ProxyHelper: Send + Sync {
    /// Returns the upstream response as `is`-style fields
    async fn to(
        &self,
        target: &str,
        request: &ImposterRequest,
        options: &ProxyOptions,
    ) -> Result<Value, ProxyError>;
}

/// Receives requests from a listener.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn respond(&self, request: &ImposterRequest) -> Result<Value, ResolveError>;
}

// ============================================================================
// Error Types
// ============================================================================

/// Server creation failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Port {0} is already in use")]
    PortInUse(u16),
    #[error("Failed to bind port {0}: {1}")]
    Bind(u16, String),
    #[error("Invalid imposter options: {0}")]
    InvalidOptions(String),
    #[error("Invalid protocol: {0}")]
    UnsupportedProtocol(String),
}

/// Request resolution failures
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Proxy failed: {0}")]
    Proxy(#[from] ProxyError),
    #[error("inject responses are not supported by this imposter")]
    InjectionUnsupported,
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Proxy forwarding failures
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid proxy target: {0}")]
    InvalidTarget(String),
    #[error("Upstream request failed: {0}")]
    Upstream(String),
}
