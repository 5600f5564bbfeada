//! Inbound authentication: structural bearer decoding, the stub client
//! registry, the axum middleware, and OAuth discovery metadata.

pub mod clients;
pub mod metadata;
pub mod middleware;
pub mod token;

pub use clients::{ClientRegistration, ClientRegistry};
pub use middleware::{require_bearer, BearerAuth};
pub use token::{decode_bearer, AuthInfo};
