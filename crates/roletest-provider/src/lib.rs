//! Container daemon connection for ansible-role-test
//!
//! This crate provides the RPC boundary to the container daemon: a
//! [`DaemonClient`] trait mirroring the daemon's container and exec
//! endpoints, and a bollard-backed [`DockerDaemon`] reaching the daemon over
//! a unix socket or TCP (optionally with TLS).

mod docker;
mod endpoint;
mod error;
mod types;

pub use docker::DockerDaemon;
pub use endpoint::*;
pub use error::*;
pub use types::*;

use async_trait::async_trait;

/// Requests the harness issues against the container daemon.
///
/// Every call is a single request; no call retries or applies its own
/// timeout.
#[async_trait]
pub trait DaemonClient: Send + Sync {
    /// URL identifying the transport (`unix://...`, `http://...`, `https://...`)
    fn base_url(&self) -> &str;

    /// Check the daemon is reachable
    async fn ping(&self) -> Result<()>;

    /// Create a container, returning its id
    async fn create_container(&self, options: &ContainerOptions) -> Result<ContainerId>;

    /// Start a created container
    async fn start(&self, id: &ContainerId, options: &StartOptions) -> Result<()>;

    /// Stop a running container
    async fn stop(&self, id: &ContainerId, timeout: Option<u32>) -> Result<()>;

    /// Remove a container
    async fn remove_container(&self, id: &ContainerId, options: &RemoveOptions) -> Result<()>;

    /// Get the current inspection snapshot of a container
    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInspect>;

    /// Create an exec instance in a running container
    async fn exec_create(
        &self,
        id: &ContainerId,
        cmd: &[String],
        options: &ExecOptions,
    ) -> Result<ExecId>;

    /// Run an exec instance to completion and return its combined output
    async fn exec_start(&self, exec_id: &ExecId) -> Result<Vec<u8>>;

    /// Run an exec instance, streaming output chunks as the daemon sends them
    async fn exec_start_stream(&self, exec_id: &ExecId) -> Result<OutputStream>;

    /// Get the inspection snapshot of an exec instance
    async fn exec_inspect(&self, exec_id: &ExecId) -> Result<ExecInspect>;

    /// Host bindings of a container port (`"8080/tcp"`)
    async fn port(&self, id: &ContainerId, port: &str) -> Result<Vec<PortBinding>>;

    /// Wait for the container to exit and return its status code
    async fn wait(&self, id: &ContainerId) -> Result<i64>;
}
