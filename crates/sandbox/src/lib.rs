//! Host side of the Codebox sandbox.
//!
//! Runs one piece of untrusted code per disposable Docker container and
//! reads the result back from the container's output.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │  HostExecutor                          │
//! │    ping → ensure image → encode        │
//! │    ↓ create + start (deadline)         │
//! │    → decode → cleanup                  │
//! ├────────────────────────────────────────┤
//! │  ContainerLifecycle                    │
//! │    ensure_image / create / start / stop│
//! ├────────────────────────────────────────┤
//! │  ContainerRuntime (DockerRuntime)      │
//! │    ↓ Docker API via bollard            │
//! ├────────────────────────────────────────┤
//! │  Container: codebox-guest              │
//! │    env: AUTHORIZED_IMPORTS, TOOLS,     │
//! │         CODE_ACTION, ADDITIONAL_VARS   │
//! │    stdout: one encoded result          │
//! └────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use codebox_sandbox::HostExecutor;
//!
//! let executor = HostExecutor::connect(config.executor).await?;
//! let result = executor.execute(&invocation).await?;
//! if !result.success {
//!     tracing::warn!(output = %result.output, "Sandboxed code failed");
//! }
//! ```

pub mod engine;
pub mod executor;
pub mod lifecycle;

pub use engine::{
    BuildSpec, ContainerRuntime, DockerRuntime, MockRun, MockRuntime, RunSpec, RuntimeCall,
};
pub use executor::{invocation_env, HostExecutor};
pub use lifecycle::{ContainerLifecycle, ImageStatus};
