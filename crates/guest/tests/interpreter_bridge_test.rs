//! The shipped interpreter bridge driven by the real `ProcessEngine`.
//!
//! Needs `python3` on the PATH; each test returns early without it.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Map};

use codebox_core::traits::Tool;
use codebox_core::Error;
use codebox_guest::{ExecutionEngine, ExecutionScope, ProcessEngine};
use codebox_skills::{CalculatorTool, EchoTool};

// =============================================================================
// Helpers
// =============================================================================

fn bridge_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("interpreter/bridge.py")
}

fn bridge() -> Option<ProcessEngine> {
    let available = std::process::Command::new("python3")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false);
    if !available {
        eprintln!("python3 not found, skipping");
        return None;
    }
    Some(ProcessEngine::new(
        "python3",
        vec!["-u".into(), bridge_path().display().to_string()],
    ))
}

fn scope(imports: &[&str]) -> ExecutionScope {
    let mut tools: BTreeMap<String, Arc<dyn Tool>> = BTreeMap::new();
    tools.insert("say".into(), Arc::new(EchoTool));
    ExecutionScope {
        authorized_imports: imports.iter().map(|s| s.to_string()).collect(),
        tools,
        variables: Map::new(),
    }
}

// =============================================================================
// 1. Image contents
// =============================================================================

#[test]
fn test_dockerfile_ships_the_bridge() {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..");
    let dockerfile = std::fs::read_to_string(root.join("executor.Dockerfile")).unwrap();

    assert!(bridge_path().is_file());
    assert!(dockerfile.contains("COPY crates/guest/interpreter/bridge.py /opt/codebox/bridge.py"));
    assert!(dockerfile.contains("python3 -u /opt/codebox/bridge.py"));
    // Release builds resolve the same dependency versions as the host.
    assert!(dockerfile.contains("COPY Cargo.toml Cargo.lock* ./"));
}

// =============================================================================
// 2. Execution
// =============================================================================

#[tokio::test]
async fn test_last_assignment_is_the_output() {
    let Some(engine) = bridge() else { return };

    let outcome = engine.execute(&scope(&[]), "result = 2+2").await.unwrap();

    assert_eq!(outcome.output, json!(4));
    assert_eq!(outcome.logs, "");
}

#[tokio::test]
async fn test_authorized_import_and_captured_print() {
    let Some(engine) = bridge() else { return };

    let outcome = engine
        .execute(&scope(&["math"]), "import math\nprint('floor')\nmath.floor(2.5)")
        .await
        .unwrap();

    assert_eq!(outcome.output, json!(2));
    assert_eq!(outcome.logs, "floor");
}

#[tokio::test]
async fn test_unauthorized_import_is_rejected() {
    let Some(engine) = bridge() else { return };

    let err = engine
        .execute(&scope(&["math"]), "import os\nresult = os.getcwd()")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Execution(_)));
    assert!(err.to_string().contains("os is not allowed"));
}

#[tokio::test]
async fn test_raised_error_carries_its_message() {
    let Some(engine) = bridge() else { return };

    let err = engine
        .execute(&scope(&[]), "raise ValueError('bad')")
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "bad");
}

#[tokio::test]
async fn test_variables_are_bound() {
    let Some(engine) = bridge() else { return };
    let mut scope = scope(&[]);
    scope.variables.insert("limit".into(), json!(3));
    scope.variables.insert("names".into(), json!(["a", "b"]));

    let outcome = engine
        .execute(&scope, "result = names * limit")
        .await
        .unwrap();

    assert_eq!(outcome.output, json!(["a", "b", "a", "b", "a", "b"]));
}

#[tokio::test]
async fn test_tool_call_goes_through_the_host() {
    let Some(engine) = bridge() else { return };

    let outcome = engine
        .execute(&scope(&[]), "first = say(message='x')\nsay('y') + ' / ' + first")
        .await
        .unwrap();

    assert_eq!(outcome.output, json!("Echo: y / Echo: x"));
}

#[tokio::test]
async fn test_tool_data_and_failures_reach_the_code() {
    let Some(engine) = bridge() else { return };
    let mut scope = scope(&[]);
    scope.tools.insert("calc".into(), Arc::new(CalculatorTool));

    let outcome = engine
        .execute(
            &scope,
            concat!(
                "total = calc('add', 1, 2)['result']\n",
                "try:\n",
                "    calc(operation='divide', a=1, b=0)\n",
                "    failure = None\n",
                "except Exception as e:\n",
                "    failure = str(e)\n",
                "[total, failure]",
            ),
        )
        .await
        .unwrap();

    assert_eq!(outcome.output, json!([3.0, "Division by zero"]));
}
