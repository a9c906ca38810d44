use serde::{Deserialize, Serialize};

/// Lifecycle state of a sandbox container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    /// Not launched yet.
    Pending,
    Running,
    Exited,
    /// Stopped and removed.
    Removed,
}

/// One container, scoped to a single execution. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub image: String,
    pub name: String,
    pub state: ContainerState,
}

impl ContainerRecord {
    pub fn new(image: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            name: name.into(),
            state: ContainerState::Pending,
        }
    }

    pub fn transition(&mut self, state: ContainerState) {
        tracing::trace!(container = %self.name, from = ?self.state, to = ?state, "Container state change");
        self.state = state;
    }
}
