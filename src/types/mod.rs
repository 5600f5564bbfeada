//! Core types for the gateway.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed identifiers (TransportId, ClientId)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for server, upstream, auth, and paths

mod config;
mod errors;
mod ids;

pub use config::{
    AuthConfig, Config, ObservabilityConfig, PathMapConfig, ServerConfig, UpstreamConfig,
};
pub use errors::{Error, Result};
pub use ids::{ClientId, TransportId};
