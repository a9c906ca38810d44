//! Guest side of the Codebox sandbox.
//!
//! Runs inside the sandbox container. Reads the invocation from the
//! environment, rebuilds the tools from the shared registry, hands the code
//! to an [`ExecutionEngine`] and prints one encoded result on stdout.

pub mod engine;
pub mod entrypoint;

pub use engine::{EngineOutcome, ExecutionEngine, ExecutionScope, ProcessEngine, ENV_INTERPRETER};
pub use entrypoint::{
    parse_authorized_imports, parse_variables, run, run_from_env, GuestInvocation,
};
