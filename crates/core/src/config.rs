use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CodeboxConfig {
    pub executor: ExecutorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Tag of the sandbox image.
    pub image_name: String,
    /// Build-definition file name, relative to `build_context`.
    pub dockerfile: String,
    pub build_context: PathBuf,
    /// CLI used for image builds.
    pub engine_cli: String,
    /// Prefix of per-invocation container names.
    pub container_prefix: String,
    /// Fixed container name. Concurrent executions collide when set.
    pub container_name: Option<String>,
    /// Port published on the same host port, reserved for interactive use.
    /// Off by default: a fixed host port admits one container at a time.
    pub reserved_port: Option<u16>,
    pub timeout_secs: u64,
    pub stop_grace_secs: i64,
    pub force_rebuild: bool,
    /// Extra environment for every container. Invocation variables win on
    /// a clash.
    pub extra_env: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
}

impl ExecutorConfig {
    /// Deadline for a single container run.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Container name for the given request.
    pub fn container_name_for(&self, request_id: &Uuid) -> String {
        match &self.container_name {
            Some(name) => name.clone(),
            None => format!("{}-{}", self.container_prefix, request_id.simple()),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            image_name: "codebox-python-executor".into(),
            dockerfile: "executor.Dockerfile".into(),
            build_context: PathBuf::from("."),
            engine_cli: "docker".into(),
            container_prefix: "codebox-executor".into(),
            container_name: None,
            reserved_port: None,
            timeout_secs: 300,
            stop_grace_secs: 5,
            force_rebuild: false,
            extra_env: BTreeMap::new(),
        }
    }
}

impl CodeboxConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("CODEBOX_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Map CODEBOX__EXECUTOR__TIMEOUT_SECS=60 to executor.timeout_secs
            .add_source(Environment::with_prefix("CODEBOX").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
