//! Host side of a sandboxed execution.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::Instrument;

use codebox_core::{
    config::ExecutorConfig,
    literal,
    protocol::{
        ResultCodec, ENV_ADDITIONAL_VARIABLES, ENV_AUTHORIZED_IMPORTS, ENV_CODE_ACTION, ENV_TOOLS,
    },
    types::{ContainerRecord, ContainerState, ExecutionResult, Invocation},
    Error, Result,
};
use codebox_skills::ToolDescriptorCodec;
use serde_json::Value;

use crate::engine::{ContainerRuntime, DockerRuntime};
use crate::lifecycle::{ContainerLifecycle, ImageStatus};

/// Runs invocations in disposable sandbox containers.
///
/// One call to [`execute`](Self::execute) drives exactly one container from
/// launch to removal. The image is built on first use and shared afterwards.
pub struct HostExecutor {
    lifecycle: ContainerLifecycle,
    config: ExecutorConfig,
}

impl HostExecutor {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: ExecutorConfig) -> Self {
        Self {
            lifecycle: ContainerLifecycle::new(runtime, &config),
            config,
        }
    }

    /// Connect to the local Docker daemon and check that it answers.
    pub async fn connect(config: ExecutorConfig) -> Result<Self> {
        let runtime = DockerRuntime::connect()?
            .with_engine_cli(config.engine_cli.clone())
            .with_stop_grace(config.stop_grace_secs);
        runtime.ping().await.map_err(engine_unavailable)?;
        tracing::info!("Connected to container engine");
        Ok(Self::new(Arc::new(runtime), config))
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Check the engine and build the image up front, honouring
    /// `force_rebuild`.
    pub async fn prepare(&self) -> Result<ImageStatus> {
        self.lifecycle.runtime().ping().await.map_err(engine_unavailable)?;
        self.lifecycle
            .ensure_image(&self.config.image_name, self.config.force_rebuild)
            .await
    }

    /// Run one invocation in a fresh container and decode its result.
    ///
    /// Errors raised by the submitted code come back as a result with
    /// `success == false`. An `Err` means the host side failed. A container
    /// this call created is stopped and removed exactly once, whatever
    /// happens after creation.
    pub async fn execute(&self, invocation: &Invocation) -> Result<ExecutionResult> {
        self.lifecycle.runtime().ping().await.map_err(engine_unavailable)?;
        self.lifecycle
            .ensure_image(&self.config.image_name, false)
            .await?;

        let mut env = self.config.extra_env.clone();
        env.extend(invocation_env(invocation));
        let mut record = ContainerRecord::new(
            self.config.image_name.clone(),
            self.config.container_name_for(invocation.request_id()),
        );

        let span = tracing::info_span!(
            "sandbox_execution",
            request_id = %invocation.request_id(),
            container = %record.name,
        );

        async {
            tracing::info!(
                tools = invocation.tools().len(),
                imports = invocation.authorized_imports().len(),
                "Launching sandbox container"
            );

            let timeout = self.config.timeout();
            let mut create_failed = false;
            let run = tokio::time::timeout(timeout, async {
                let created = self
                    .lifecycle
                    .create(
                        &record.image,
                        &record.name,
                        &env,
                        self.config.reserved_port,
                    )
                    .await;
                if let Err(e) = created {
                    create_failed = true;
                    return Err(e);
                }
                record.transition(ContainerState::Running);
                self.lifecycle.start(&record.name).await
            })
            .await;

            let outcome = match run {
                Ok(Ok(output)) => {
                    record.transition(ContainerState::Exited);
                    tracing::debug!(bytes = output.len(), "Sandbox output captured");
                    ResultCodec::decode(&output)
                }
                Ok(Err(e)) => Err(e),
                Err(_) => {
                    tracing::warn!(?timeout, "Sandbox execution timed out");
                    Err(Error::ExecutionTimeout(timeout))
                }
            };

            // A rejected create leaves nothing of ours under this name; with a
            // fixed container name it may belong to another caller.
            if create_failed {
                tracing::debug!("Container was not created, skipping cleanup");
            } else {
                match self.lifecycle.stop(&record.name).await {
                    Ok(()) => record.transition(ContainerState::Removed),
                    Err(e) => tracing::warn!(error = %e, "Failed to clean up sandbox container"),
                }
            }

            match &outcome {
                Ok(result) => tracing::info!(success = result.success, "Sandbox execution finished"),
                Err(e) => tracing::error!(error = %e, "Sandbox execution failed"),
            }
            outcome
        }
        .instrument(span)
        .await
    }
}

fn engine_unavailable(err: Error) -> Error {
    match err {
        Error::EngineUnavailable(_) => err,
        other => Error::engine_unavailable(other.to_string()),
    }
}

/// Environment passed to the guest for one invocation.
pub fn invocation_env(invocation: &Invocation) -> BTreeMap<String, String> {
    let imports = Value::Array(
        invocation
            .authorized_imports()
            .iter()
            .cloned()
            .map(Value::String)
            .collect(),
    );
    let variables = Value::Object(invocation.additional_variables().clone());

    BTreeMap::from([
        (ENV_AUTHORIZED_IMPORTS.to_string(), literal::render(&imports)),
        (
            ENV_TOOLS.to_string(),
            ToolDescriptorCodec::encode(invocation.tools()),
        ),
        (
            ENV_CODE_ACTION.to_string(),
            invocation.code_action().to_string(),
        ),
        (ENV_ADDITIONAL_VARIABLES.to_string(), literal::render(&variables)),
    ])
}
