//! Common types exchanged with the container daemon

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Container ID wrapper
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        if self.0.len() > 12 {
            &self.0[..12]
        } else {
            &self.0
        }
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ContainerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Exec instance ID wrapper
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecId(pub String);

impl ExecId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ExecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for creating a container
///
/// `extra` holds daemon API keys (`Env`, `Cmd`, `HostConfig`, ...) that are
/// merged over the typed fields verbatim when the create request is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerOptions {
    /// Image to create the container from
    pub image: String,
    /// Run without attaching stdout/stderr
    pub detach: bool,
    /// Daemon-side container name
    pub name: Option<String>,
    /// Pass-through creation options
    pub extra: Map<String, Value>,
}

impl ContainerOptions {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            detach: true,
            name: None,
            extra: Map::new(),
        }
    }

    /// Set a single pass-through option
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_detach(mut self, detach: bool) -> Self {
        self.detach = detach;
        self
    }

    /// Merge pass-through options, overwriting existing keys
    pub fn merge(&mut self, options: Map<String, Value>) {
        self.extra.extend(options);
    }
}

/// Options for starting a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Key sequence for detaching from an attached container (`ctrl-p,ctrl-q`)
    pub detach_keys: Option<String>,
}

/// Options for removing a container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Kill the container if it is still running
    pub force: bool,
    /// Remove anonymous volumes attached to the container
    pub volumes: bool,
}

/// Options for an exec instance
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Environment variables
    pub env: HashMap<String, String>,
    /// Working directory
    pub working_dir: Option<String>,
    /// User to run as
    pub user: Option<String>,
    /// Allocate TTY
    pub tty: bool,
    /// Privileged mode
    pub privileged: bool,
}

/// Raw state flags reported by the daemon
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateInfo {
    pub oom_killed: bool,
    pub dead: bool,
    pub paused: bool,
    pub running: bool,
    pub restarting: bool,
    pub pid: i64,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub exit_code: i64,
    pub error: Option<String>,
}

/// Inspection snapshot of a container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerInspect {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub state: StateInfo,
    /// Address on the default bridge network
    pub ip_address: Option<String>,
}

/// A host-side binding of a container port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub host_ip: Option<String>,
    pub host_port: String,
}

/// Inspection snapshot of an exec instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecInspect {
    pub id: ExecId,
    pub running: bool,
    pub exit_code: Option<i64>,
    pub pid: Option<i64>,
}

impl ExecInspect {
    /// Finished with exit code zero
    pub fn succeeded(&self) -> bool {
        !self.running && self.exit_code == Some(0)
    }
}

/// Output chunks of a running exec, in delivery order
pub type OutputStream = BoxStream<'static, crate::Result<Vec<u8>>>;
