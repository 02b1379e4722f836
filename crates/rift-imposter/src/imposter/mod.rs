//! Mountebank-compatible imposters for Rift.
//!
//! This module provides:
//! - `Imposter`: one virtual endpoint with its server, journal and views
//! - `ImposterManager`: port-keyed lifecycle management for imposters
//! - `Stub` / `StubResponse`: the declarative stub model
//!
//! ## Module Structure
//!
//! - `types`: stub model, recorded requests, view options, errors
//! - `journal`: request counter and recording journal
//! - `view`: JSON projections (list, default, replayable, proxy-free)
//! - `core`: the `Imposter` orchestrator
//! - `manager`: `ImposterManager`

mod core;
mod journal;
mod manager;
mod types;
mod view;

#[cfg(test)]
mod tests;

pub use self::core::Imposter;
pub use journal::RequestJournal;
pub use manager::ImposterManager;
pub use types::{
    ImposterError, ImposterRequest, RecordedRequest, Stub, StubResponse, ViewOptions,
    PROXY_RESPONSE_TIME_FIELD,
};
pub use view::remove_proxies;
