use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one sandboxed execution: `(output, logs, success)`.
///
/// A failed execution has the same shape as a successful one; `output`
/// then holds the error message. Callers branch on [`success`](Self::success).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub output: Value,
    #[serde(default)]
    pub logs: String,
    pub success: bool,
}

impl ExecutionResult {
    pub fn new(output: Value, logs: impl Into<String>, success: bool) -> Self {
        Self {
            output,
            logs: logs.into(),
            success,
        }
    }

    /// A successful result.
    pub fn succeeded(output: Value, logs: impl Into<String>) -> Self {
        Self::new(output, logs, true)
    }

    /// A failed result carrying the error message as its output.
    pub fn failed(message: impl Into<String>, logs: impl Into<String>) -> Self {
        Self::new(Value::String(message.into()), logs, false)
    }

    pub fn into_tuple(self) -> (Value, String, bool) {
        (self.output, self.logs, self.success)
    }
}

impl From<(Value, String, bool)> for ExecutionResult {
    fn from((output, logs, success): (Value, String, bool)) -> Self {
        Self::new(output, logs, success)
    }
}
