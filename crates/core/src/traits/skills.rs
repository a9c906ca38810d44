//! Tool traits.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{ToolDefinition, ToolOutput};

/// A capability exposed to sandboxed code.
///
/// Tools cross the sandbox boundary by identity only: the host sends a type
/// reference and the guest constructs a fresh instance from its own
/// registry. Implementations must therefore be cheap to construct and must
/// not depend on instance state set up on the host.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the unique name of the tool.
    fn name(&self) -> &str;

    /// Get the human-readable description.
    fn description(&self) -> &str;

    /// Get the JSON Schema for parameters.
    fn parameters(&self) -> Value;

    /// Bare name this tool is registered under, if it has one. Tools
    /// without a display name are referenced by [`type_path`](Self::type_path).
    fn display_name(&self) -> Option<&str> {
        None
    }

    /// Stable path identifying the implementing type, such as
    /// `concat!(module_path!(), "::EchoTool")`.
    ///
    /// Host and guest are separate builds, so this must not come from
    /// `std::any::type_name`, whose output is not guaranteed to match
    /// across compiler versions.
    fn type_path(&self) -> &str;

    /// Definition exposed to the interpreter under `name`.
    fn definition(&self, name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> Result<ToolOutput>;
}
