//! Local mirror of the backend tool catalog.

pub mod dispatch;
pub mod mirror;
pub mod registry;
pub mod schema;

pub use dispatch::{CallContext, ToolDispatcher};
pub use mirror::CatalogMirror;
pub use registry::{MirroredTool, ToolDescriptor, ToolRegistry};
pub use schema::InputSchema;
