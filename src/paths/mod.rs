//! Path virtualization: translating caller-local file paths into paths that
//! exist inside the backend sandbox.

pub mod upload;
pub mod virtualizer;

pub use upload::{sandbox_path, FileUploader, SandboxUploader};
pub use virtualizer::PathVirtualizer;
