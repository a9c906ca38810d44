//! Error types for Codebox.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using Codebox's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Codebox.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Host Errors (container engine)
    // =========================================================================
    #[error("Container engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Image build failed: {0}")]
    ImageBuild(String),

    #[error("Container run failed: {0}")]
    ContainerRun(String),

    #[error("Container cleanup failed: {0}")]
    ContainerCleanup(String),

    #[error("Execution timed out after {0:?}")]
    ExecutionTimeout(Duration),

    // =========================================================================
    // Boundary Errors (payload and result encoding)
    // =========================================================================
    #[error("Malformed sandbox result: {0}")]
    MalformedResult(String),

    #[error("Sandbox produced no output")]
    NoOutput,

    #[error("Literal parse error: {0}")]
    Literal(String),

    #[error("Invalid invocation: {0}")]
    InvalidInvocation(String),

    // =========================================================================
    // Guest Errors
    // =========================================================================
    #[error("Tool resolution failed: {0}")]
    ToolResolution(String),

    /// Raised by the sandboxed code itself; the message is reported verbatim.
    #[error("{0}")]
    Execution(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create an engine unavailable error.
    pub fn engine_unavailable(msg: impl Into<String>) -> Self {
        Self::EngineUnavailable(msg.into())
    }

    /// Create an image build error.
    pub fn image_build(msg: impl Into<String>) -> Self {
        Self::ImageBuild(msg.into())
    }

    /// Create a container run error.
    pub fn container_run(msg: impl Into<String>) -> Self {
        Self::ContainerRun(msg.into())
    }

    /// Create a container cleanup error.
    pub fn container_cleanup(msg: impl Into<String>) -> Self {
        Self::ContainerCleanup(msg.into())
    }

    /// Create a malformed result error.
    pub fn malformed_result(msg: impl Into<String>) -> Self {
        Self::MalformedResult(msg.into())
    }

    /// Create an invalid invocation error.
    pub fn invalid_invocation(msg: impl Into<String>) -> Self {
        Self::InvalidInvocation(msg.into())
    }

    /// Create a tool resolution error.
    pub fn tool_resolution(msg: impl Into<String>) -> Self {
        Self::ToolResolution(msg.into())
    }

    /// Create an execution error.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a tool not found error.
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound(name.into())
    }

    /// Create a tool execution error.
    pub fn tool_execution(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error happened on the host, outside the sandbox.
    ///
    /// Guest-side failures never reach the host as errors; they arrive as a
    /// failed [`ExecutionResult`](crate::types::ExecutionResult).
    pub fn is_host_local(&self) -> bool {
        matches!(
            self,
            Self::EngineUnavailable(_)
                | Self::ImageBuild(_)
                | Self::ContainerRun(_)
                | Self::ContainerCleanup(_)
                | Self::ExecutionTimeout(_)
                | Self::MalformedResult(_)
                | Self::NoOutput
        )
    }
}
