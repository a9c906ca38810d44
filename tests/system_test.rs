//! End-to-end tests: host executor → (mock) container → guest entrypoint.
//!
//! The mock runtime answers each container run by invoking the real guest
//! entrypoint with the container's environment, so the full wire contract
//! is exercised without Docker or an interpreter.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};

use codebox_core::config::ExecutorConfig;
use codebox_core::traits::Tool;
use codebox_core::types::{ExecutionResult, Invocation, ToolOutput};
use codebox_core::{Error, Result};
use codebox_guest::{EngineOutcome, ExecutionEngine, ExecutionScope, GuestInvocation};
use codebox_sandbox::{HostExecutor, MockRuntime, RunSpec, RuntimeCall};
use codebox_skills::{builtin_registry, ToolFactoryRegistry};

// =============================================================================
// Test tool and scripted interpreter
// =============================================================================

#[derive(Default)]
struct SearchTool;

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Searches the web"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {"query": {"type": "string"}}})
    }

    fn display_name(&self) -> Option<&str> {
        Some("web_search")
    }

    fn type_path(&self) -> &str {
        concat!(module_path!(), "::SearchTool")
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        Ok(ToolOutput::text(format!("results for {}", args["query"])))
    }
}

/// Understands just enough code to drive the tests.
struct ScriptedInterpreter;

#[async_trait]
impl ExecutionEngine for ScriptedInterpreter {
    async fn execute(&self, scope: &ExecutionScope, code: &str) -> Result<EngineOutcome> {
        match code {
            "result = 2+2" => Ok(EngineOutcome {
                output: json!(4),
                logs: String::new(),
            }),
            "raise ValueError('bad')" => Err(Error::execution("bad")),
            "search('rust')" => {
                let tool = scope
                    .tools
                    .get("search")
                    .ok_or_else(|| Error::execution("NameError: name 'search' is not defined"))?;
                let output = tool.execute(json!({"query": "rust"})).await?;
                Ok(EngineOutcome {
                    output: json!(output.content),
                    logs: format!("imports: {}", scope.authorized_imports.join(",")),
                })
            }
            other => Err(Error::execution(format!("unsupported code: {}", other))),
        }
    }
}

fn guest_registry() -> ToolFactoryRegistry {
    let registry = builtin_registry().unwrap();
    registry.register::<SearchTool>().unwrap();
    registry
}

/// A runtime whose containers run the guest entrypoint in-process.
fn sandbox() -> Arc<MockRuntime> {
    Arc::new(MockRuntime::new().with_responder(Arc::new(
        |spec: RunSpec| -> BoxFuture<'static, Result<String>> {
            async move {
                let invocation = GuestInvocation::from_lookup(|key| spec.env.get(key).cloned());
                let line =
                    codebox_guest::run(&ScriptedInterpreter, &guest_registry(), &invocation).await;
                Ok::<_, Error>(format!("container banner\n{}\n", line))
            }
            .boxed()
        },
    )))
}

fn executor(runtime: &Arc<MockRuntime>) -> HostExecutor {
    HostExecutor::new(runtime.clone(), ExecutorConfig::default())
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_end_to_end_success() {
    let runtime = sandbox();
    let invocation = Invocation::builder("result = 2+2")
        .authorized_import("math")
        .tool("search", Arc::new(SearchTool))
        .build();

    let result = executor(&runtime).execute(&invocation).await.unwrap();

    assert_eq!(result, ExecutionResult::new(json!(4), "", true));
    assert_eq!(
        runtime
            .count(|c| matches!(c, RuntimeCall::RemoveContainer(_)))
            .await,
        1
    );
}

#[tokio::test]
async fn test_end_to_end_failure_is_data() {
    let runtime = sandbox();
    let invocation = Invocation::builder("raise ValueError('bad')").build();

    let result = executor(&runtime).execute(&invocation).await.unwrap();

    assert_eq!(result.into_tuple(), (json!("bad"), "Error processing commands".to_string(), false));
}

#[tokio::test]
async fn test_tool_is_rebuilt_in_guest() {
    let runtime = sandbox();
    let invocation = Invocation::builder("search('rust')")
        .authorized_imports(["math", "re"])
        .tool("search", Arc::new(SearchTool))
        .build();

    let result = executor(&runtime).execute(&invocation).await.unwrap();

    assert!(result.success);
    assert_eq!(result.output, json!("results for \"rust\""));
    assert_eq!(result.logs, "imports: math,re");
}

#[tokio::test]
async fn test_tool_unknown_to_guest_fails_in_sandbox() {
    struct HostOnlyTool;

    #[async_trait]
    impl Tool for HostOnlyTool {
        fn name(&self) -> &str {
            "host_only"
        }

        fn description(&self) -> &str {
            "Not registered in the guest"
        }

        fn parameters(&self) -> Value {
            json!({})
        }

        fn type_path(&self) -> &str {
            concat!(module_path!(), "::HostOnlyTool")
        }

        async fn execute(&self, _args: Value) -> Result<ToolOutput> {
            Ok(ToolOutput::text(""))
        }
    }

    let runtime = sandbox();
    let invocation = Invocation::builder("result = 2+2")
        .tool("secret", Arc::new(HostOnlyTool))
        .build();

    let result = executor(&runtime).execute(&invocation).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.logs, "Error processing commands");
    let message = result.output.as_str().unwrap();
    assert!(message.contains("secret"));
    assert!(message.contains("HostOnlyTool"));
}

#[tokio::test]
async fn test_variables_reach_the_guest() {
    struct VariableEcho;

    #[async_trait]
    impl ExecutionEngine for VariableEcho {
        async fn execute(&self, scope: &ExecutionScope, _code: &str) -> Result<EngineOutcome> {
            Ok(EngineOutcome {
                output: Value::Object(scope.variables.clone()),
                logs: String::new(),
            })
        }
    }

    let runtime = Arc::new(MockRuntime::new().with_responder(Arc::new(
        |spec: RunSpec| -> BoxFuture<'static, Result<String>> {
            async move {
                let invocation = GuestInvocation::from_lookup(|key| spec.env.get(key).cloned());
                Ok::<_, Error>(codebox_guest::run(&VariableEcho, &guest_registry(), &invocation).await)
            }
            .boxed()
        },
    )));
    let invocation = Invocation::builder("print(limit)")
        .variable("limit", json!(3))
        .variable("names", json!(["a", "b"]))
        .variable("note", json!("it's"))
        .build();

    let result = executor(&runtime).execute(&invocation).await.unwrap();

    assert_eq!(
        result.output,
        json!({"limit": 3, "names": ["a", "b"], "note": "it's"})
    );
}
