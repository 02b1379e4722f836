//! Rift imposter engine.
//!
//! An imposter is a fake service bound to a port: it journals the requests it
//! receives, resolves them against its stubs, and can describe itself as JSON
//! in several views (summary, full, replayable).
//!
//! - `imposter`: the imposter lifecycle, request journal, views and registry
//! - `protocol`: collaborator traits plus the HTTP adapter, stubs and predicates
//! - `config`: CLI flags and imposters-file loading for the binary

pub mod config;
pub mod imposter;
pub mod protocol;

pub use imposter::{Imposter, ImposterError, ImposterManager, ViewOptions};
pub use protocol::{ProtocolAdapterFactory, ProtocolError, ResolveError};
