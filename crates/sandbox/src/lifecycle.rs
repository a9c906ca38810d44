//! Disposable container lifecycle: build the image once, create and start
//! one container per execution, tear it down afterwards.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use codebox_core::{config::ExecutorConfig, Error, Result};

use crate::engine::{BuildSpec, ContainerRuntime, RunSpec};

/// Outcome of [`ContainerLifecycle::ensure_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    /// The image was present; nothing was built.
    AlreadyExists,
    Built,
}

pub struct ContainerLifecycle {
    runtime: Arc<dyn ContainerRuntime>,
    build_context: PathBuf,
    dockerfile: String,
}

impl ContainerLifecycle {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: &ExecutorConfig) -> Self {
        Self {
            runtime,
            build_context: config.build_context.clone(),
            dockerfile: config.dockerfile.clone(),
        }
    }

    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }

    /// Make sure the image `name` exists, building it if needed.
    ///
    /// Without `force` an existing image is reused as is. With `force` it is
    /// removed and rebuilt.
    pub async fn ensure_image(&self, name: &str, force: bool) -> Result<ImageStatus> {
        match self.runtime.image_exists(name).await {
            Ok(true) if !force => {
                tracing::info!(image = %name, "Image already exists, skipping build");
                return Ok(ImageStatus::AlreadyExists);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(image = %name, error = %e, "Error checking for existing image"),
        }

        if force {
            tracing::info!(image = %name, "Removing existing image");
            self.runtime.remove_image(name).await?;
        }

        let spec = BuildSpec {
            tag: name.to_string(),
            context: self.build_context.clone(),
            dockerfile: self.dockerfile.clone(),
        };
        tracing::info!(
            image = %name,
            context = %spec.context.display(),
            dockerfile = %spec.dockerfile,
            "Building sandbox image"
        );
        self.runtime.build_image(&spec).await.map_err(|e| match e {
            Error::ImageBuild(_) => e,
            other => Error::image_build(other.to_string()),
        })?;
        tracing::info!(image = %name, "Image built successfully");

        Ok(ImageStatus::Built)
    }

    /// Create the container without starting it.
    ///
    /// On error no container under `name` belongs to this caller, so there
    /// is nothing to clean up.
    pub async fn create(
        &self,
        image: &str,
        name: &str,
        env: &BTreeMap<String, String>,
        port: Option<u16>,
    ) -> Result<()> {
        let spec = RunSpec {
            image: image.to_string(),
            name: name.to_string(),
            env: env.clone(),
            port,
        };
        self.runtime.create_container(&spec).await
    }

    /// Start a created container, wait for it and return its combined output.
    pub async fn start(&self, name: &str) -> Result<String> {
        self.runtime.start_container(name).await
    }

    /// Stop and remove the container. Safe on containers that already exited.
    ///
    /// Removal is attempted even when stopping fails; the first error wins.
    pub async fn stop(&self, name: &str) -> Result<()> {
        let stopped = self.runtime.stop_container(name).await;
        let removed = self.runtime.remove_container(name).await;
        stopped.and(removed).map_err(|e| match e {
            Error::ContainerCleanup(_) => e,
            other => Error::container_cleanup(other.to_string()),
        })
    }
}
