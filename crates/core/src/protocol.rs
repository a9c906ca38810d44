//! Wire contract between the host executor and the guest entrypoint.
//!
//! The invocation travels as four environment variables. The result travels
//! back as text on the container's combined output stream, which also carries
//! whatever else the guest environment printed. The guest writes one tagged
//! record line:
//!
//! ```text
//! @@CODEBOX_RESULT@@ {"output":4,"logs":"","success":true}
//! ```
//!
//! or, on failure, a line starting with the error sentinel:
//!
//! ```text
//! Error processing: division by zero
//! ```
//!
//! The decoder also accepts the older literal form `(output, 'logs', True)`
//! preceded by arbitrary noise.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::literal;
use crate::types::ExecutionResult;

/// Environment variable carrying the authorized-imports list literal.
pub const ENV_AUTHORIZED_IMPORTS: &str = "AUTHORIZED_IMPORTS";
/// Environment variable carrying the tool descriptor mapping literal.
pub const ENV_TOOLS: &str = "TOOLS";
/// Environment variable carrying the code to execute.
pub const ENV_CODE_ACTION: &str = "CODE_ACTION";
/// Environment variable carrying the additional variables mapping literal.
pub const ENV_ADDITIONAL_VARIABLES: &str = "ADDITIONAL_VARIABLES";

/// Marks output as an execution failure, wherever it appears.
pub const ERROR_SENTINEL: &str = "Error processing";
/// Prefix the guest writes before a failure message.
pub const ERROR_PREFIX: &str = "Error processing: ";
/// Log text attached to every failure decoded from the sentinel.
pub const ERROR_LOGS: &str = "Error processing commands";
/// Tag that starts the structured result line.
pub const RECORD_TAG: &str = "@@CODEBOX_RESULT@@";

/// Encodes and decodes [`ExecutionResult`]s on the text channel.
pub struct ResultCodec;

impl ResultCodec {
    /// Encode a result as a tagged record line.
    pub fn encode(result: &ExecutionResult) -> Result<String> {
        Ok(format!("{} {}", RECORD_TAG, serde_json::to_string(result)?))
    }

    /// Encode a failure message behind the error sentinel.
    pub fn encode_error(message: &str) -> String {
        format!("{}{}", ERROR_PREFIX, message)
    }

    /// Decode captured container output.
    ///
    /// Any occurrence of [`ERROR_SENTINEL`] classifies the output as a
    /// failure, even if the rest would also parse as a valid result.
    pub fn decode(raw: &str) -> Result<ExecutionResult> {
        let text = raw.trim_end();
        if text.trim_start().is_empty() {
            return Err(Error::NoOutput);
        }

        if let Some(message) = sentinel_message(text) {
            return Ok(ExecutionResult::failed(message, ERROR_LOGS));
        }

        if let Some(payload) = text
            .lines()
            .rev()
            .find_map(|line| line.trim_start().strip_prefix(RECORD_TAG))
        {
            return serde_json::from_str(payload.trim()).map_err(|e| {
                Error::malformed_result(format!("invalid result record: {}", e))
            });
        }

        decode_literal(text)
    }
}

fn sentinel_message(text: &str) -> Option<&str> {
    let start = text.find(ERROR_SENTINEL)?;
    let tail = &text[start..];
    let message = match tail.split_once(": ") {
        Some((_, message)) => message,
        None => tail[ERROR_SENTINEL.len()..]
            .trim_start_matches(|c: char| c == ':' || c.is_whitespace()),
    };
    Some(message)
}

fn decode_literal(text: &str) -> Result<ExecutionResult> {
    // Everything before the tuple is environment noise (banners, warnings).
    let start = text
        .find('(')
        .ok_or_else(|| Error::malformed_result("no result tuple in output"))?;
    let value = literal::parse(&text[start..])
        .map_err(|e| Error::malformed_result(e.to_string()))?;

    let mut items = match value {
        Value::Array(items) if items.len() == 3 => items,
        other => {
            return Err(Error::malformed_result(format!(
                "expected a 3-element tuple, got {}",
                literal::render(&other)
            )))
        }
    };

    let success = match items.pop() {
        Some(Value::Bool(flag)) => flag,
        other => {
            return Err(Error::malformed_result(format!(
                "success flag must be a bool, got {:?}",
                other
            )))
        }
    };
    let logs = match items.pop() {
        Some(Value::String(logs)) => logs,
        Some(Value::Null) => String::new(),
        other => {
            return Err(Error::malformed_result(format!(
                "logs must be a string, got {:?}",
                other
            )))
        }
    };
    let output = items.pop().unwrap_or(Value::Null);

    Ok(ExecutionResult::new(output, logs, success))
}
