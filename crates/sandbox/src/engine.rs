//! Container runtime backends.
//!
//! This module provides the `ContainerRuntime` trait and a Docker-based
//! implementation using the `bollard` crate. Each execution gets one
//! container that is created, then started, waited on and read back in a
//! single blocking `start_container` call.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bollard::container::LogOutput;
use futures::future::BoxFuture;
use futures::{Stream, StreamExt};
use tokio::sync::Mutex;

use codebox_core::{Error, Result};

// =============================================================================
// Runtime Types
// =============================================================================

/// How to build the sandbox image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    /// Tag applied to the built image.
    pub tag: String,
    /// Build context directory.
    pub context: PathBuf,
    /// Build-definition file name, relative to `context`.
    pub dockerfile: String,
}

/// One container launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub image: String,
    pub name: String,
    pub env: BTreeMap<String, String>,
    /// TCP port mapped to the same port on the host.
    pub port: Option<u16>,
}

// =============================================================================
// Container Runtime Trait
// =============================================================================

/// Trait for container engine backends.
///
/// The default implementation talks to the local Docker daemon via `bollard`.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check that the engine is reachable.
    async fn ping(&self) -> Result<()>;

    /// Whether an image with this name exists locally.
    async fn image_exists(&self, image: &str) -> Result<bool>;

    /// Remove an image. Removing a missing image is not an error.
    async fn remove_image(&self, image: &str) -> Result<()>;

    /// Build and tag an image.
    async fn build_image(&self, spec: &BuildSpec) -> Result<()>;

    /// Create a container without starting it.
    async fn create_container(&self, spec: &RunSpec) -> Result<()>;

    /// Start a created container, block until it exits, and return its
    /// combined stdout/stderr in emission order.
    async fn start_container(&self, name: &str) -> Result<String>;

    /// Stop a container. Already-stopped and missing containers are fine.
    async fn stop_container(&self, name: &str) -> Result<()>;

    /// Remove a container. Missing containers are fine.
    async fn remove_container(&self, name: &str) -> Result<()>;
}

// =============================================================================
// Docker Runtime Implementation
// =============================================================================

/// Docker-based runtime using the `bollard` crate.
///
/// Image builds go through the Docker CLI, which tars up the build context;
/// everything else uses the engine API directly.
pub struct DockerRuntime {
    docker: bollard::Docker,
    engine_cli: String,
    stop_grace_secs: i64,
}

impl DockerRuntime {
    /// Connect to the local Docker daemon.
    pub fn connect() -> Result<Self> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            Error::engine_unavailable(format!(
                "Failed to connect to Docker daemon: {}. Is Docker running?",
                e
            ))
        })?;
        Ok(Self::from_client(docker))
    }

    /// Create from an existing bollard Docker client.
    pub fn from_client(docker: bollard::Docker) -> Self {
        Self {
            docker,
            engine_cli: "docker".to_string(),
            stop_grace_secs: 5,
        }
    }

    /// CLI binary used for image builds.
    pub fn with_engine_cli(mut self, cli: impl Into<String>) -> Self {
        self.engine_cli = cli.into();
        self
    }

    /// Seconds a container gets to exit before it is killed on stop.
    pub fn with_stop_grace(mut self, secs: i64) -> Self {
        self.stop_grace_secs = secs;
        self
    }
}

/// Concatenate log frames and decode once, so a character split across
/// frames survives.
async fn collect_output<S>(mut frames: S) -> Result<String>
where
    S: Stream<Item = std::result::Result<LogOutput, bollard::errors::Error>> + Unpin,
{
    let mut output = Vec::new();
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(
                LogOutput::StdOut { message }
                | LogOutput::StdErr { message }
                | LogOutput::Console { message },
            ) => output.extend_from_slice(&message),
            Ok(_) => {} // ignore stdin echoes
            Err(e) => {
                return Err(Error::container_run(format!(
                    "Failed to read sandbox output: {}",
                    e
                )))
            }
        }
    }
    Ok(String::from_utf8_lossy(&output).into_owned())
}

fn has_status(err: &bollard::errors::Error, codes: &[u16]) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if codes.contains(status_code)
    )
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| Error::engine_unavailable(format!("Docker ping failed: {}", e)))
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(e) if has_status(&e, &[404]) => Ok(false),
            Err(e) => Err(Error::image_build(format!(
                "Failed to inspect image '{}': {}",
                image, e
            ))),
        }
    }

    async fn remove_image(&self, image: &str) -> Result<()> {
        use bollard::image::RemoveImageOptions;

        let options = RemoveImageOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_image(image, Some(options), None).await {
            Ok(_) => Ok(()),
            Err(e) if has_status(&e, &[404]) => Ok(()),
            Err(e) => Err(Error::image_build(format!(
                "Failed to remove image '{}': {}",
                image, e
            ))),
        }
    }

    async fn build_image(&self, spec: &BuildSpec) -> Result<()> {
        let dockerfile = spec.context.join(&spec.dockerfile);

        let output = tokio::process::Command::new(&self.engine_cli)
            .args(["build", "--rm", "-t", spec.tag.as_str(), "-f"])
            .arg(&dockerfile)
            .arg(&spec.context)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                Error::image_build(format!("Failed to launch '{}': {}", self.engine_cli, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::image_build(format!(
                "{} build failed for {}: {}",
                self.engine_cli,
                spec.tag,
                stderr.trim()
            )));
        }

        Ok(())
    }

    async fn create_container(&self, spec: &RunSpec) -> Result<()> {
        use bollard::container::{Config, CreateContainerOptions};
        use bollard::models::{HostConfig, PortBinding};

        let env: Vec<String> = spec
            .env
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();

        let (exposed_ports, port_bindings) = match spec.port {
            Some(port) => {
                let key = format!("{}/tcp", port);
                let binding = PortBinding {
                    host_ip: None,
                    host_port: Some(port.to_string()),
                };
                (
                    Some(HashMap::from([(key.clone(), HashMap::new())])),
                    Some(HashMap::from([(key, Some(vec![binding]))])),
                )
            }
            None => (None, None),
        };

        let container_config = Config {
            image: Some(spec.image.clone()),
            env: Some(env),
            exposed_ports,
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            host_config: Some(HostConfig {
                port_bindings,
                ..Default::default()
            }),
            labels: Some(HashMap::from([(
                "managed-by".to_string(),
                "codebox".to_string(),
            )])),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        self.docker
            .create_container(Some(options), container_config)
            .await
            .map_err(|e| {
                Error::container_run(format!("Failed to create sandbox container: {}", e))
            })?;

        tracing::debug!(container = %spec.name, image = %spec.image, "Sandbox container created");
        Ok(())
    }

    async fn start_container(&self, name: &str) -> Result<String> {
        use bollard::container::{LogsOptions, WaitContainerOptions};

        self.docker
            .start_container::<String>(name, None)
            .await
            .map_err(|e| {
                Error::container_run(format!("Failed to start sandbox container: {}", e))
            })?;

        tracing::info!(container = %name, "Sandbox container started");

        let mut exit_code = 0;
        let mut wait = Box::pin(self.docker.wait_container(
            name,
            Some(WaitContainerOptions {
                condition: "not-running",
            }),
        ));
        while let Some(status) = wait.next().await {
            match status {
                Ok(response) => exit_code = response.status_code,
                // Non-zero exits arrive as an error carrying the code.
                Err(bollard::errors::Error::DockerContainerWaitError { code, .. }) => {
                    exit_code = code
                }
                Err(e) => {
                    return Err(Error::container_run(format!(
                        "Failed to wait for sandbox container: {}",
                        e
                    )))
                }
            }
        }

        let output = collect_output(Box::pin(self.docker.logs(
            name,
            Some(LogsOptions::<String> {
                stdout: true,
                stderr: true,
                follow: false,
                tail: "all".to_string(),
                ..Default::default()
            }),
        )))
        .await?;

        tracing::debug!(
            container = %name,
            exit_code,
            bytes = output.len(),
            "Sandbox container exited"
        );

        Ok(output)
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        use bollard::container::StopContainerOptions;

        match self
            .docker
            .stop_container(
                name,
                Some(StopContainerOptions {
                    t: self.stop_grace_secs,
                }),
            )
            .await
        {
            Ok(()) => Ok(()),
            // 304: already stopped, 404: already gone
            Err(e) if has_status(&e, &[304, 404]) => Ok(()),
            Err(e) => Err(Error::container_cleanup(format!(
                "Failed to stop container '{}': {}",
                name, e
            ))),
        }
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        use bollard::container::RemoveContainerOptions;

        match self
            .docker
            .remove_container(
                name,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
        {
            Ok(()) => {
                tracing::info!(container = %name, "Sandbox container removed");
                Ok(())
            }
            Err(e) if has_status(&e, &[404]) => Ok(()),
            Err(e) => Err(Error::container_cleanup(format!(
                "Failed to remove container '{}': {}",
                name, e
            ))),
        }
    }
}

// =============================================================================
// Mock Runtime (for testing without Docker)
// =============================================================================

/// Produces container output from the launch request.
pub type MockResponder = Arc<dyn Fn(RunSpec) -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// Scripted outcome of one `start_container` call.
pub enum MockRun {
    /// Container prints this and exits.
    Output(String),
    /// Start fails after the container was created.
    Fail(String),
    /// Container never exits.
    Hang,
}

/// A call recorded by [`MockRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    Ping,
    ImageExists(String),
    RemoveImage(String),
    BuildImage(BuildSpec),
    CreateContainer(RunSpec),
    StartContainer(String),
    StopContainer(String),
    RemoveContainer(String),
}

/// In-memory runtime for unit testing. Records every call.
#[derive(Default)]
pub struct MockRuntime {
    unavailable: bool,
    build_failure: Option<String>,
    create_failure: Option<String>,
    cleanup_failure: Option<String>,
    images: Mutex<HashSet<String>>,
    containers: Mutex<HashMap<String, RunSpec>>,
    runs: Mutex<VecDeque<MockRun>>,
    responder: Option<MockResponder>,
    calls: Mutex<Vec<RuntimeCall>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every ping.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Pretend the image is already built.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.images.get_mut().insert(image.into());
        self
    }

    pub fn with_build_failure(mut self, msg: impl Into<String>) -> Self {
        self.build_failure = Some(msg.into());
        self
    }

    /// Fail every container creation, as a name clash would.
    pub fn with_create_failure(mut self, msg: impl Into<String>) -> Self {
        self.create_failure = Some(msg.into());
        self
    }

    pub fn with_cleanup_failure(mut self, msg: impl Into<String>) -> Self {
        self.cleanup_failure = Some(msg.into());
        self
    }

    /// Queue the outcome of the next container start.
    pub fn with_run(mut self, run: MockRun) -> Self {
        self.runs.get_mut().push_back(run);
        self
    }

    /// Queue output for the next container start.
    pub fn with_output(self, output: impl Into<String>) -> Self {
        self.with_run(MockRun::Output(output.into()))
    }

    /// Answer starts that have nothing queued.
    pub fn with_responder(mut self, responder: MockResponder) -> Self {
        self.responder = Some(responder);
        self
    }

    /// All calls so far, in order.
    pub async fn calls(&self) -> Vec<RuntimeCall> {
        self.calls.lock().await.clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub async fn count(&self, predicate: impl Fn(&RuntimeCall) -> bool) -> usize {
        self.calls.lock().await.iter().filter(|c| predicate(c)).count()
    }

    /// Launch requests of every created container, in order.
    pub async fn created(&self) -> Vec<RunSpec> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                RuntimeCall::CreateContainer(spec) => Some(spec.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: RuntimeCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn ping(&self) -> Result<()> {
        self.record(RuntimeCall::Ping).await;
        if self.unavailable {
            return Err(Error::engine_unavailable("mock engine is down"));
        }
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        self.record(RuntimeCall::ImageExists(image.to_string())).await;
        Ok(self.images.lock().await.contains(image))
    }

    async fn remove_image(&self, image: &str) -> Result<()> {
        self.record(RuntimeCall::RemoveImage(image.to_string())).await;
        self.images.lock().await.remove(image);
        Ok(())
    }

    async fn build_image(&self, spec: &BuildSpec) -> Result<()> {
        self.record(RuntimeCall::BuildImage(spec.clone())).await;
        if let Some(ref msg) = self.build_failure {
            return Err(Error::image_build(msg.clone()));
        }
        self.images.lock().await.insert(spec.tag.clone());
        Ok(())
    }

    async fn create_container(&self, spec: &RunSpec) -> Result<()> {
        self.record(RuntimeCall::CreateContainer(spec.clone())).await;
        if let Some(ref msg) = self.create_failure {
            return Err(Error::container_run(msg.clone()));
        }
        self.containers
            .lock()
            .await
            .insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn start_container(&self, name: &str) -> Result<String> {
        self.record(RuntimeCall::StartContainer(name.to_string())).await;
        let spec = self
            .containers
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| Error::container_run(format!("no such container: {}", name)))?;
        let next = self.runs.lock().await.pop_front();
        match next {
            Some(MockRun::Output(output)) => Ok(output),
            Some(MockRun::Fail(msg)) => Err(Error::container_run(msg)),
            Some(MockRun::Hang) => std::future::pending().await,
            None => match self.responder {
                Some(ref responder) => responder(spec).await,
                None => Ok(String::new()),
            },
        }
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        self.record(RuntimeCall::StopContainer(name.to_string())).await;
        match self.cleanup_failure {
            Some(ref msg) => Err(Error::container_cleanup(msg.clone())),
            None => Ok(()),
        }
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        self.record(RuntimeCall::RemoveContainer(name.to_string())).await;
        self.containers.lock().await.remove(name);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
