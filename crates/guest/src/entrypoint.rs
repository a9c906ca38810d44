//! Guest entrypoint: environment in, one encoded result out.
//!
//! Whatever goes wrong, the guest prints exactly one result to stdout. Setup
//! and execution failures are reported through the error sentinel so the host
//! can tell them apart from a crashed container.

use serde_json::{Map, Value};

use codebox_core::{
    literal,
    protocol::{
        ResultCodec, ENV_ADDITIONAL_VARIABLES, ENV_AUTHORIZED_IMPORTS, ENV_CODE_ACTION, ENV_TOOLS,
    },
    types::ExecutionResult,
    Error, Result,
};
use codebox_skills::{builtin_registry, ToolDescriptorCodec, ToolFactoryRegistry};

use crate::engine::{ExecutionEngine, ExecutionScope, ProcessEngine};

/// Raw invocation payload as received through the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestInvocation {
    pub authorized_imports: Option<String>,
    pub tools: Option<String>,
    pub code_action: Option<String>,
    pub additional_variables: Option<String>,
}

impl GuestInvocation {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the payload through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            authorized_imports: lookup(ENV_AUTHORIZED_IMPORTS),
            tools: lookup(ENV_TOOLS),
            code_action: lookup(ENV_CODE_ACTION),
            additional_variables: lookup(ENV_ADDITIONAL_VARIABLES),
        }
    }
}

/// Parse the authorized-imports payload: a list literal, or one bare module
/// name. Absent or blank means no imports.
pub fn parse_authorized_imports(raw: Option<&str>) -> Result<Vec<String>> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(Vec::new()),
        Some(raw) => raw,
    };

    if !raw.starts_with(['[', '(', '{']) {
        return Ok(vec![raw.to_string()]);
    }

    match literal::parse(raw)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(module) => Ok(module),
                other => Err(Error::invalid_invocation(format!(
                    "authorized import must be a string, got {}",
                    literal::render(&other)
                ))),
            })
            .collect(),
        other => Err(Error::invalid_invocation(format!(
            "authorized imports must be a list, got {}",
            literal::render(&other)
        ))),
    }
}

/// Parse the additional-variables payload. Absent or blank means none.
pub fn parse_variables(raw: Option<&str>) -> Result<Map<String, Value>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Map::new()),
        Some(raw) => match literal::parse(raw)? {
            Value::Object(variables) => Ok(variables),
            other => Err(Error::invalid_invocation(format!(
                "additional variables must be a dict, got {}",
                literal::render(&other)
            ))),
        },
    }
}

async fn try_run(
    engine: &dyn ExecutionEngine,
    registry: &ToolFactoryRegistry,
    invocation: &GuestInvocation,
) -> Result<ExecutionResult> {
    let code = invocation
        .code_action
        .as_deref()
        .ok_or_else(|| Error::invalid_invocation(format!("{} is not set", ENV_CODE_ACTION)))?;

    let authorized_imports = parse_authorized_imports(invocation.authorized_imports.as_deref())?;
    let tools = match invocation.tools.as_deref().map(str::trim) {
        None | Some("") => Default::default(),
        Some(encoded) => ToolDescriptorCodec::decode(encoded, registry)?,
    };
    let variables = parse_variables(invocation.additional_variables.as_deref())?;

    tracing::debug!(
        imports = authorized_imports.len(),
        tools = tools.len(),
        variables = variables.len(),
        "Executing code action"
    );

    let scope = ExecutionScope {
        authorized_imports,
        tools,
        variables,
    };
    let outcome = engine.execute(&scope, code).await?;
    Ok(ExecutionResult::succeeded(outcome.output, outcome.logs))
}

/// Run one invocation and return the single line to print.
///
/// Never fails: every error becomes an `Error processing: <message>` line.
pub async fn run(
    engine: &dyn ExecutionEngine,
    registry: &ToolFactoryRegistry,
    invocation: &GuestInvocation,
) -> String {
    let encoded = match try_run(engine, registry, invocation).await {
        Ok(result) => ResultCodec::encode(&result),
        Err(e) => Err(e),
    };
    encoded.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Code action failed");
        ResultCodec::encode_error(&e.to_string())
    })
}

/// Run the invocation found in the process environment with the built-in
/// tools and the interpreter named by `CODEBOX_INTERPRETER`.
pub async fn run_from_env() -> String {
    let setup = builtin_registry().and_then(|registry| Ok((registry, ProcessEngine::from_env()?)));
    match setup {
        Ok((registry, engine)) => run(&engine, &registry, &GuestInvocation::from_env()).await,
        Err(e) => ResultCodec::encode_error(&e.to_string()),
    }
}
