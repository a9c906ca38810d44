//! Tools that can cross the sandbox boundary.
//!
//! This crate provides:
//! - The tool factory registry both sides populate identically
//! - Built-in tools (echo, calculator)
//! - The descriptor codec that turns live tools into type references and back

pub mod builtin;
pub mod descriptor;
pub mod registry;

pub use builtin::*;
pub use descriptor::{type_reference, ToolDescriptorCodec};
pub use registry::{builtin_registry, ToolFactory, ToolFactoryRegistry};
