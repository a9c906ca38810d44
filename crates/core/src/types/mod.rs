//! Core type definitions for Codebox.
//!
//! Everything that describes one sandboxed execution: what goes in
//! (`Invocation`), what comes back (`ExecutionResult`), and the container
//! that carries it (`ContainerRecord`).

pub mod container;
pub mod invocation;
pub mod result;
pub mod tool;

pub use container::*;
pub use invocation::*;
pub use result::*;
pub use tool::*;
