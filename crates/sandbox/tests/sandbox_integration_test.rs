//! Sandbox integration tests.
//!
//! Tests the full host pipeline: HostExecutor → ContainerLifecycle →
//! ContainerRuntime (MockRuntime). These tests do NOT require Docker.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use codebox_core::config::ExecutorConfig;
use codebox_core::protocol::{ResultCodec, ENV_CODE_ACTION, ENV_TOOLS};
use codebox_core::types::{ExecutionResult, Invocation};
use codebox_core::Error;
use codebox_sandbox::{HostExecutor, ImageStatus, MockRun, MockRuntime, RuntimeCall};
use codebox_skills::EchoTool;

// =============================================================================
// Helpers
// =============================================================================

fn executor(mock: &Arc<MockRuntime>) -> HostExecutor {
    HostExecutor::new(mock.clone(), ExecutorConfig::default())
}

fn invocation() -> Invocation {
    Invocation::builder("result = 2+2")
        .authorized_import("math")
        .build()
}

fn encoded(result: &ExecutionResult) -> String {
    ResultCodec::encode(result).unwrap()
}

async fn cleanup_calls(mock: &MockRuntime) -> usize {
    mock.count(|c| matches!(c, RuntimeCall::StopContainer(_)))
        .await
}

// =============================================================================
// 1. Successful execution
// =============================================================================

#[tokio::test]
async fn test_execute_success_returns_decoded_result() {
    let mock = Arc::new(
        MockRuntime::new().with_output(encoded(&ExecutionResult::succeeded(json!(4), ""))),
    );

    let result = executor(&mock).execute(&invocation()).await.unwrap();

    assert_eq!(result, ExecutionResult::new(json!(4), "", true));
    assert_eq!(cleanup_calls(&mock).await, 1);
    assert_eq!(
        mock.count(|c| matches!(c, RuntimeCall::RemoveContainer(_)))
            .await,
        1
    );
}

#[tokio::test]
async fn test_execute_accepts_legacy_literal_output() {
    let mock = Arc::new(MockRuntime::new().with_output("(42, 'ok', True)\n"));

    let result = executor(&mock).execute(&invocation()).await.unwrap();

    assert_eq!(result.output, json!(42));
    assert_eq!(result.logs, "ok");
    assert!(result.success);
}

// =============================================================================
// 2. Failures inside the sandbox are data
// =============================================================================

#[tokio::test]
async fn test_guest_error_is_unsuccessful_result() {
    let mock = Arc::new(MockRuntime::new().with_output("Error processing: bad\n"));

    let result = executor(&mock).execute(&invocation()).await.unwrap();

    assert_eq!(result.output, json!("bad"));
    assert_eq!(result.logs, "Error processing commands");
    assert!(!result.success);
    assert_eq!(cleanup_calls(&mock).await, 1);
}

// =============================================================================
// 3. Host-side failures
// =============================================================================

#[tokio::test]
async fn test_engine_unavailable_does_no_container_work() {
    let mock = Arc::new(MockRuntime::new().unavailable());

    let err = executor(&mock).execute(&invocation()).await.unwrap_err();

    assert!(matches!(err, Error::EngineUnavailable(_)));
    assert_eq!(mock.calls().await, vec![RuntimeCall::Ping]);
}

#[tokio::test]
async fn test_build_failure_is_image_build_error() {
    let mock = Arc::new(MockRuntime::new().with_build_failure("missing build file"));

    let err = executor(&mock).execute(&invocation()).await.unwrap_err();

    assert!(matches!(err, Error::ImageBuild(_)));
    assert_eq!(
        mock.count(|c| matches!(c, RuntimeCall::CreateContainer(_)))
            .await,
        0
    );
}

#[tokio::test]
async fn test_create_failure_leaves_existing_container_alone() {
    // A fixed name already taken by another caller's container.
    let mock = Arc::new(MockRuntime::new().with_create_failure("409 Conflict: name in use"));
    let config = ExecutorConfig {
        container_name: Some("shared-executor".into()),
        ..Default::default()
    };

    let err = HostExecutor::new(mock.clone(), config)
        .execute(&invocation())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ContainerRun(_)));
    assert_eq!(cleanup_calls(&mock).await, 0);
    assert_eq!(
        mock.count(|c| matches!(c, RuntimeCall::RemoveContainer(_)))
            .await,
        0
    );
}

#[tokio::test]
async fn test_run_failure_still_cleans_up_once() {
    let mock = Arc::new(MockRuntime::new().with_run(MockRun::Fail("start failed".into())));

    let err = executor(&mock).execute(&invocation()).await.unwrap_err();

    assert!(matches!(err, Error::ContainerRun(_)));
    assert_eq!(cleanup_calls(&mock).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_container_times_out_and_is_removed() {
    let mock = Arc::new(MockRuntime::new().with_run(MockRun::Hang));
    let config = ExecutorConfig {
        timeout_secs: 2,
        ..Default::default()
    };

    let err = HostExecutor::new(mock.clone(), config)
        .execute(&invocation())
        .await
        .unwrap_err();

    match err {
        Error::ExecutionTimeout(after) => assert_eq!(after, Duration::from_secs(2)),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(cleanup_calls(&mock).await, 1);
}

#[tokio::test]
async fn test_empty_output_is_no_output() {
    let mock = Arc::new(MockRuntime::new().with_output("  \n"));

    let err = executor(&mock).execute(&invocation()).await.unwrap_err();

    assert!(matches!(err, Error::NoOutput));
    assert_eq!(cleanup_calls(&mock).await, 1);
}

#[tokio::test]
async fn test_garbage_output_is_malformed_result() {
    let mock = Arc::new(MockRuntime::new().with_output("garbage{{{"));

    let err = executor(&mock).execute(&invocation()).await.unwrap_err();

    assert!(matches!(err, Error::MalformedResult(_)));
    assert_eq!(cleanup_calls(&mock).await, 1);
}

#[tokio::test]
async fn test_cleanup_failure_does_not_replace_result() {
    let mock = Arc::new(
        MockRuntime::new()
            .with_cleanup_failure("daemon restarting")
            .with_output(encoded(&ExecutionResult::succeeded(json!("done"), "log"))),
    );

    let result = executor(&mock).execute(&invocation()).await.unwrap();

    assert!(result.success);
    assert_eq!(result.output, json!("done"));
}

// =============================================================================
// 4. Image and container naming
// =============================================================================

#[tokio::test]
async fn test_image_built_once_across_executions() {
    let mock = Arc::new(MockRuntime::new());
    let executor = executor(&mock);

    executor.execute(&invocation()).await.unwrap_err();
    executor.execute(&invocation()).await.unwrap_err();

    assert_eq!(
        mock.count(|c| matches!(c, RuntimeCall::BuildImage(_)))
            .await,
        1
    );
}

#[tokio::test]
async fn test_prepare_honours_force_rebuild() {
    let mock = Arc::new(MockRuntime::new().with_image("codebox-python-executor"));
    let config = ExecutorConfig {
        force_rebuild: true,
        ..Default::default()
    };

    let status = HostExecutor::new(mock.clone(), config)
        .prepare()
        .await
        .unwrap();

    assert_eq!(status, ImageStatus::Built);
    assert_eq!(
        mock.count(|c| matches!(c, RuntimeCall::RemoveImage(_)))
            .await,
        1
    );
}

#[tokio::test]
async fn test_each_execution_gets_its_own_container() {
    let mock = Arc::new(MockRuntime::new());
    let executor = executor(&mock);

    let _ = executor.execute(&invocation()).await;
    let _ = executor.execute(&invocation()).await;

    let specs = mock.created().await;
    assert_eq!(specs.len(), 2);
    assert_ne!(specs[0].name, specs[1].name);
    assert!(specs.iter().all(|s| s.name.starts_with("codebox-executor-")));
    // No host port is published, so concurrent containers never clash.
    assert!(specs.iter().all(|s| s.port.is_none()));
}

#[tokio::test]
async fn test_run_spec_carries_invocation_payload() {
    let mock = Arc::new(MockRuntime::new());
    let invocation = Invocation::builder("print('hi')")
        .tool("say", Arc::new(EchoTool))
        .build();

    let _ = executor(&mock).execute(&invocation).await;

    let spec = mock.created().await.remove(0);
    assert_eq!(spec.image, "codebox-python-executor");
    assert_eq!(spec.port, None);
    assert_eq!(spec.env[ENV_CODE_ACTION], "print('hi')");
    assert_eq!(spec.env[ENV_TOOLS], "{'say': 'echo'}");
}

#[tokio::test]
async fn test_reserved_port_is_published_only_when_configured() {
    let mock = Arc::new(MockRuntime::new());
    let config = ExecutorConfig {
        reserved_port: Some(5000),
        ..Default::default()
    };

    let _ = HostExecutor::new(mock.clone(), config)
        .execute(&invocation())
        .await;

    assert_eq!(mock.created().await[0].port, Some(5000));
}

#[tokio::test]
async fn test_extra_env_cannot_override_payload() {
    let mock = Arc::new(MockRuntime::new());
    let mut config = ExecutorConfig::default();
    config
        .extra_env
        .insert("PYTHONUNBUFFERED".into(), "1".into());
    config
        .extra_env
        .insert(ENV_CODE_ACTION.into(), "import os".into());

    let _ = HostExecutor::new(mock.clone(), config)
        .execute(&invocation())
        .await;

    let spec = mock.created().await.remove(0);
    assert_eq!(spec.env["PYTHONUNBUFFERED"], "1");
    assert_eq!(spec.env[ENV_CODE_ACTION], "result = 2+2");
}
