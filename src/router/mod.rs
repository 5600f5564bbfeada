//! Inbound side: HTTP surface and per-request transports.

pub mod http;
pub mod transport;

pub use http::{build_gateway, build_router, internal_error_response, GatewayState};
pub use transport::RequestTransport;
