//! Built-in tools.

use async_trait::async_trait;
use serde_json::{json, Value};

use codebox_core::{traits::Tool, types::ToolOutput, Error, Result};

// =============================================================================
// Echo Tool
// =============================================================================

/// Simple echo tool, mostly useful for checking the tool bridge end to end.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes the input message back"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to echo"
                }
            },
            "required": ["message"]
        })
    }

    fn display_name(&self) -> Option<&str> {
        Some("echo")
    }

    fn type_path(&self) -> &str {
        concat!(module_path!(), "::EchoTool")
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("No message provided");

        Ok(ToolOutput::text(format!("Echo: {}", message)))
    }
}

// =============================================================================
// Calculator Tool
// =============================================================================

/// Basic arithmetic. Referenced across the boundary by its type path.
#[derive(Debug, Default, Clone, Copy)]
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Perform basic arithmetic operations"
    }

    fn type_path(&self) -> &str {
        concat!(module_path!(), "::CalculatorTool")
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["add", "subtract", "multiply", "divide"],
                    "description": "The arithmetic operation to perform"
                },
                "a": {
                    "type": "number",
                    "description": "First operand"
                },
                "b": {
                    "type": "number",
                    "description": "Second operand"
                }
            },
            "required": ["operation", "a", "b"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let operation = args
            .get("operation")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::tool_execution("operation is required"))?;

        let a = args
            .get("a")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| Error::tool_execution("a must be a number"))?;

        let b = args
            .get("b")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| Error::tool_execution("b must be a number"))?;

        let result = match operation {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" => {
                if b == 0.0 {
                    return Ok(ToolOutput::error("Division by zero"));
                }
                a / b
            }
            _ => {
                return Ok(ToolOutput::error(format!(
                    "Unknown operation: {}",
                    operation
                )));
            }
        };

        Ok(ToolOutput::text(format!("{} {} {} = {}", a, operation, b, result))
            .with_data(json!({ "result": result })))
    }
}
