//! # Sandbox Gateway - MCP gateway to a remote tool sandbox
//!
//! Rust implementation of a gateway that sits between an MCP client and a
//! remote tool backend, providing:
//! - Bearer-token authentication with structural token decoding
//! - A single lazily created upstream MCP session shared by all requests
//! - A local mirror of the backend tool catalog with schema validation
//! - Transparent upload of caller-local files into the backend sandbox and
//!   rewriting of `filepath` arguments to sandbox paths
//! - Per-request cancellation propagated to the backend
//!
//! ## Architecture
//!
//! ```text
//!                      ┌──────────────────────────────────────┐
//!   POST /mcp  ──────► │ AuthGate ─► RequestRouter            │
//!                      │               │ ensure_session       │
//!                      │               ▼                      │
//!                      │   SessionManager ─► UpstreamSession  │ ──► backend /mcp
//!                      │               │                      │
//!                      │               ▼                      │
//!                      │   ToolDispatcher ─► PathVirtualizer  │
//!                      │               │                      │
//!                      │               └─► SandboxUploader    │ ──► backend upload
//!                      └──────────────────────────────────────┘
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod auth;
pub mod catalog;
pub mod mcp;
pub mod paths;
pub mod router;
pub mod types;
pub mod upstream;

// Internal utilities
pub mod observability;

pub use types::{Config, Error, Result};
