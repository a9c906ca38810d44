//! Codebox - run untrusted code in disposable Docker sandboxes.
//!
//! Builds the sandbox image on first use, runs one container per call and
//! prints the decoded `(output, logs, success)` result as JSON.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use codebox_core::config::CodeboxConfig;
use codebox_core::literal;
use codebox_core::telemetry::configure_tracing;
use codebox_core::types::Invocation;
use codebox_sandbox::HostExecutor;
use codebox_skills::builtin_registry;

#[derive(Parser)]
#[command(name = "codebox")]
#[command(version, about = "Run untrusted code in a disposable Docker sandbox")]
struct Cli {
    /// Code to execute
    #[arg(long, conflicts_with = "code_file", required_unless_present = "code_file")]
    code: Option<String>,

    /// Read the code to execute from a file
    #[arg(long, value_name = "PATH")]
    code_file: Option<PathBuf>,

    /// Module the code may import (repeatable)
    #[arg(long = "import", value_name = "MODULE")]
    imports: Vec<String>,

    /// Expose a registered tool under a name
    #[arg(long = "tool", value_name = "NAME=TYPE_REF", value_parser = parse_key_value)]
    tools: Vec<(String, String)>,

    /// Bind a variable to a literal value, e.g. `limit=3` or `names=['a', 'b']`
    #[arg(long = "var", value_name = "NAME=LITERAL", value_parser = parse_key_value)]
    vars: Vec<(String, String)>,

    /// Remove and rebuild the sandbox image before running
    #[arg(long)]
    force_rebuild: bool,

    /// Execution deadline in seconds
    #[arg(long, value_name = "SECS", env = "CODEBOX_TIMEOUT")]
    timeout: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{}`", s))?;
    if key.is_empty() {
        return Err(format!("missing name in `{}`", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CodeboxConfig::load().context("Failed to load configuration")?;
    if cli.force_rebuild {
        config.executor.force_rebuild = true;
    }
    if let Some(secs) = cli.timeout {
        config.executor.timeout_secs = secs;
    }

    configure_tracing("info,codebox=debug", cli.json_logs || config.logging.json)?;
    tracing::info!("Starting Codebox v{}", env!("CARGO_PKG_VERSION"));

    let code = match (cli.code, cli.code_file) {
        (Some(code), _) => code,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => anyhow::bail!("either --code or --code-file is required"),
    };

    let registry = builtin_registry()?;
    let mut builder = Invocation::builder(code).authorized_imports(cli.imports);
    for (name, type_ref) in cli.tools {
        let tool = registry
            .create(&type_ref)
            .with_context(|| format!("Unknown tool type for '{}'", name))?;
        builder = builder.tool(name, tool);
    }
    for (name, raw) in cli.vars {
        let value = literal::parse(&raw)
            .with_context(|| format!("Invalid literal for variable '{}'", name))?;
        builder = builder.variable(name, value);
    }
    let invocation = builder.build();

    let executor = match HostExecutor::connect(config.executor.clone()).await {
        Ok(executor) => executor,
        Err(e) => {
            tracing::error!(error = %e, "Container engine is not reachable");
            std::process::exit(1);
        }
    };

    if config.executor.force_rebuild {
        let status = executor.prepare().await?;
        tracing::info!(?status, "Sandbox image ready");
    }

    let result = executor.execute(&invocation).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
