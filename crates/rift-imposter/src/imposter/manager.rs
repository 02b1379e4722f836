//! ImposterManager - lifecycle management for multiple imposters.
//!
//! This module keeps the port-keyed registry of live imposters and the
//! protocol adapters used to create them.

use super::core::Imposter;
use super::types::{ImposterError, ViewOptions};
use crate::protocol::http::HttpAdapterFactory;
use crate::protocol::{ProtocolAdapterFactory, ProtocolError};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, info_span, warn};

fn default_protocol() -> String {
    "http".to_string()
}

/// Manages the lifecycle of multiple imposters
pub struct ImposterManager {
    /// Adapter factories by protocol name
    protocols: HashMap<String, Arc<dyn ProtocolAdapterFactory>>,
    /// Global default for imposters that don't set `recordRequests`
    record_requests: bool,
    /// Active imposters by port
    imposters: RwLock<BTreeMap<u16, Arc<Imposter>>>,
}

impl ImposterManager {
    /// Create a manager with the built-in `http` adapter registered
    pub fn new(record_requests: bool) -> Self {
        let mut manager = Self::without_protocols(record_requests);
        manager.register_protocol("http", Arc::new(HttpAdapterFactory::default()));
        manager
    }

    /// Create a manager with no protocol adapters
    pub fn without_protocols(record_requests: bool) -> Self {
        Self {
            protocols: HashMap::new(),
            record_requests,
            imposters: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn register_protocol(
        &mut self,
        name: impl Into<String>,
        factory: Arc<dyn ProtocolAdapterFactory>,
    ) {
        self.protocols.insert(name.into(), factory);
    }

    pub fn record_requests(&self) -> bool {
        self.record_requests
    }

    /// Create and start an imposter from a raw creation request
    pub async fn create_imposter(&self, mut request: Value) -> Result<Arc<Imposter>, ImposterError> {
        let fields = request.as_object_mut().ok_or_else(|| {
            ImposterError::InvalidRequest("imposter must be a JSON object".to_string())
        })?;

        let protocol = match fields.get("protocol") {
            None | Some(Value::Null) => default_protocol(),
            Some(Value::String(p)) => p.clone(),
            Some(other) => {
                return Err(ImposterError::InvalidRequest(format!(
                    "protocol must be a string, got {other}"
                )))
            }
        };
        fields.insert("protocol".to_string(), json!(protocol));

        let factory = self
            .protocols
            .get(&protocol)
            .cloned()
            .ok_or_else(|| ProtocolError::UnsupportedProtocol(protocol.clone()))?;

        // Check if specified port is already in use
        if let Some(port) = requested_port(&request) {
            if self.imposters.read().contains_key(&port) {
                return Err(ImposterError::PortInUse(port));
            }
        }

        let span = info_span!("imposter", protocol = %protocol);
        let imposter =
            Imposter::create(factory.as_ref(), &request, span, self.record_requests).await?;
        let port = imposter.port();

        let imposter = Arc::new(imposter);
        {
            let mut imposters = self.imposters.write();
            if imposters.contains_key(&port) {
                warn!(port, "Imposter created on a port that is already registered");
                imposter.close();
                return Err(ImposterError::PortInUse(port));
            }
            imposters.insert(port, Arc::clone(&imposter));
        }

        info!(port, protocol = %protocol, "Imposter registered");
        Ok(imposter)
    }

    /// Get an imposter by port
    pub fn get_imposter(&self, port: u16) -> Result<Arc<Imposter>, ImposterError> {
        self.imposters
            .read()
            .get(&port)
            .cloned()
            .ok_or(ImposterError::NotFound(port))
    }

    /// List all imposters, ordered by port
    pub fn list_imposters(&self) -> Vec<Arc<Imposter>> {
        self.imposters.read().values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.imposters.read().len()
    }

    /// Close and remove an imposter, returning its final state
    pub fn delete_imposter(&self, port: u16, options: &ViewOptions) -> Result<Value, ImposterError> {
        let imposter = self
            .imposters
            .write()
            .remove(&port)
            .ok_or(ImposterError::NotFound(port))?;

        let json = imposter.to_json(options);
        imposter.close();
        info!(port, "Imposter deleted");
        Ok(json)
    }

    /// Close and remove every imposter
    pub fn delete_all(&self, options: &ViewOptions) -> Vec<Value> {
        let removed: Vec<Arc<Imposter>> = {
            let mut imposters = self.imposters.write();
            std::mem::take(&mut *imposters).into_values().collect()
        };

        removed
            .into_iter()
            .map(|imposter| {
                let json = imposter.to_json(options);
                imposter.close();
                json
            })
            .collect()
    }

    /// `{ "imposters": [...] }`, summarized unless `replayable` is requested
    pub fn to_json(&self, options: &ViewOptions) -> Value {
        let options = ViewOptions {
            list: !options.replayable,
            ..*options
        };
        let imposters: Vec<Value> = self
            .list_imposters()
            .iter()
            .map(|imposter| imposter.to_json(&options))
            .collect();
        json!({ "imposters": imposters })
    }
}

impl Default for ImposterManager {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Explicit, non-zero port from a creation request
fn requested_port(request: &Value) -> Option<u16> {
    request
        .get("port")
        .and_then(Value::as_u64)
        .and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p != 0)
}
