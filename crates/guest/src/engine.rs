//! Execution engines for the guest.
//!
//! The guest does not interpret code itself. An [`ExecutionEngine`] receives
//! the scope (authorized imports, live tools, variables) and the code, and
//! returns the final value plus captured logs. [`ProcessEngine`] delegates to
//! an interpreter process over a newline-delimited JSON bridge.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};

use codebox_core::{
    traits::Tool,
    types::{ToolDefinition, ToolOutput},
    Error, Result,
};

/// Environment variable holding the interpreter command line.
pub const ENV_INTERPRETER: &str = "CODEBOX_INTERPRETER";

/// How long an interpreter gets to exit after its final message.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// What the executing code may see.
pub struct ExecutionScope {
    pub authorized_imports: Vec<String>,
    pub tools: BTreeMap<String, Arc<dyn Tool>>,
    /// Pre-bound variables.
    pub variables: Map<String, Value>,
}

/// Final value and captured logs of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutcome {
    pub output: Value,
    pub logs: String,
}

/// Runs code against a scope.
///
/// Errors raised by the executed code are reported as [`Error::Execution`]
/// carrying the interpreter's own message.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn execute(&self, scope: &ExecutionScope, code: &str) -> Result<EngineOutcome>;
}

// =============================================================================
// Bridge messages
// =============================================================================

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum HostMessage<'a> {
    Start {
        code: &'a str,
        authorized_imports: &'a [String],
        variables: &'a Map<String, Value>,
        tools: Vec<ToolDefinition>,
    },
    ToolResult {
        id: Value,
        output: ToolOutput,
    },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InterpreterMessage {
    ToolCall {
        id: Value,
        name: String,
        #[serde(default)]
        args: Value,
    },
    Final {
        #[serde(default)]
        output: Value,
        #[serde(default)]
        logs: String,
    },
    Error {
        message: String,
    },
}

// =============================================================================
// Process engine
// =============================================================================

/// Runs each execution in a fresh interpreter process.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: String,
    args: Vec<String>,
}

impl ProcessEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line.
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::invalid_invocation("interpreter command is empty"))?;
        Ok(Self::new(program, parts.collect()))
    }

    /// Read the interpreter command from `CODEBOX_INTERPRETER`.
    pub fn from_env() -> Result<Self> {
        let command = std::env::var(ENV_INTERPRETER).map_err(|_| {
            Error::invalid_invocation(format!("{} is not set", ENV_INTERPRETER))
        })?;
        Self::from_command_line(&command)
    }

    async fn call_tool(scope: &ExecutionScope, name: &str, args: Value) -> ToolOutput {
        let Some(tool) = scope.tools.get(name) else {
            tracing::warn!(tool = %name, "Interpreter called an unknown tool");
            return ToolOutput::error(Error::tool_not_found(name).to_string());
        };
        tracing::debug!(tool = %name, "Executing tool call");
        match tool.execute(args).await {
            Ok(output) => output,
            Err(e) => ToolOutput::error(e.to_string()),
        }
    }
}

async fn send(stdin: &mut ChildStdin, message: &HostMessage<'_>) -> Result<()> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await?;
    Ok(())
}

#[async_trait]
impl ExecutionEngine for ProcessEngine {
    async fn execute(&self, scope: &ExecutionScope, code: &str) -> Result<EngineOutcome> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::execution(format!("failed to start interpreter '{}': {}", self.program, e))
            })?;

        let (mut stdin, stdout, mut stderr) =
            match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
                (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
                _ => return Err(Error::internal("interpreter pipes are not available")),
            };

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let start = HostMessage::Start {
            code,
            authorized_imports: &scope.authorized_imports,
            variables: &scope.variables,
            tools: scope
                .tools
                .iter()
                .map(|(name, tool)| tool.definition(name))
                .collect(),
        };
        // An interpreter that exits early closes the pipe; its stderr says why.
        if let Err(e) = send(&mut stdin, &start).await {
            tracing::debug!(error = %e, "Failed to send start message");
        }

        let mut lines = BufReader::new(stdout).lines();
        let mut stray = Vec::new();
        let mut finished = None;
        while let Some(line) = lines.next_line().await? {
            match serde_json::from_str::<InterpreterMessage>(&line) {
                Ok(InterpreterMessage::ToolCall { id, name, args }) => {
                    let output = Self::call_tool(scope, &name, args).await;
                    send(&mut stdin, &HostMessage::ToolResult { id, output }).await?;
                }
                Ok(InterpreterMessage::Final { output, logs }) => {
                    finished = Some(Ok((output, logs)));
                    break;
                }
                Ok(InterpreterMessage::Error { message }) => {
                    finished = Some(Err(Error::execution(message)));
                    break;
                }
                // Anything else is the code's own printing.
                Err(_) => stray.push(line),
            }
        }
        drop(stdin);

        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(status) => {
                let status = status?;
                tracing::debug!(%status, "Interpreter exited");
            }
            Err(_) => {
                tracing::warn!("Interpreter did not exit, killing it");
                let _ = child.kill().await;
            }
        }
        let stderr = stderr_task.await.unwrap_or_default();

        match finished {
            Some(Ok((output, logs))) => {
                let mut captured = stray.join("\n");
                if !logs.is_empty() {
                    if !captured.is_empty() {
                        captured.push('\n');
                    }
                    captured.push_str(&logs);
                }
                Ok(EngineOutcome {
                    output,
                    logs: captured,
                })
            }
            Some(Err(e)) => Err(e),
            None => {
                let stderr = stderr.trim();
                Err(Error::execution(if stderr.is_empty() {
                    "interpreter exited without producing a result".to_string()
                } else {
                    stderr.to_string()
                }))
            }
        }
    }
}
