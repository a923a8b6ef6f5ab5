//! Handle to a single daemon-side container

use crate::{ContainerState, CoreError, ExecEvent, ExecEvents, ExecOutput, Result};
use futures::{stream, StreamExt};
use roletest_provider::{
    ContainerId, ContainerInspect, ContainerOptions, DaemonClient, DaemonEndpoint, ExecOptions,
    ProviderError, RemoveOptions, StartOptions,
};
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};

/// Address used for port bindings when the daemon is on a local socket
pub const LOOPBACK_ADDR: &str = "127.0.0.1";

/// A container managed through the daemon.
///
/// The handle has no id until [`create`](Self::create) or
/// [`start`](Self::start) is called. The last inspection snapshot is cached:
/// `start` and `stop` invalidate it, and `inspect(true)` forces a refetch.
/// Reads such as [`state`](Self::state), [`internal_ip`](Self::internal_ip)
/// use whatever snapshot is cached and never refresh on their own.
pub struct Container {
    client: Arc<dyn DaemonClient>,
    options: ContainerOptions,
    id: Option<ContainerId>,
    inspected: Option<ContainerInspect>,
    host_ip: OnceLock<String>,
    stop_timeout: Option<u32>,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("image", &self.options.image)
            .field("id", &self.id)
            .field("inspected", &self.inspected.is_some())
            .finish()
    }
}

impl Container {
    pub fn new(client: Arc<dyn DaemonClient>, options: ContainerOptions) -> Self {
        Self {
            client,
            options,
            id: None,
            inspected: None,
            host_ip: OnceLock::new(),
            stop_timeout: None,
        }
    }

    /// Grace period passed to the daemon on stop (daemon default if unset)
    pub fn with_stop_timeout(mut self, secs: u32) -> Self {
        self.stop_timeout = Some(secs);
        self
    }

    pub fn id(&self) -> Option<&ContainerId> {
        self.id.as_ref()
    }

    pub fn image(&self) -> &str {
        &self.options.image
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.options
    }

    fn require_id(&self) -> Result<&ContainerId> {
        self.id
            .as_ref()
            .ok_or_else(|| CoreError::NotCreated(self.options.image.clone()))
    }

    /// Merge `options` into the configuration and create the container.
    ///
    /// A handle creates at most one daemon-side container at a time; call
    /// [`destroy`](Self::destroy) before creating again.
    pub async fn create(&mut self, options: Map<String, Value>) -> Result<ContainerId> {
        if let Some(id) = &self.id {
            return Err(CoreError::InvalidState(format!(
                "Container {} already created from {}",
                id.short(),
                self.options.image
            )));
        }

        self.options.merge(options);
        let id = self.client.create_container(&self.options).await?;
        tracing::info!("Created container {} from {}", id.short(), self.options.image);

        self.id = Some(id.clone());
        self.inspected = None;
        Ok(id)
    }

    /// Stop (if running) and remove the container.
    ///
    /// No-op without an id. The current state is always refetched before
    /// deciding whether to stop. The daemon's running flag is used rather
    /// than the derived status, since it stays set while paused or
    /// restarting. A container the daemon no longer knows is treated as
    /// already removed.
    pub async fn destroy(&mut self, options: RemoveOptions) -> Result<()> {
        let Some(id) = self.id.clone() else {
            return Ok(());
        };

        let running = self.inspect(true).await.map(|snapshot| snapshot.state.running);
        match running {
            Ok(true) => self.stop().await?,
            Ok(false) => {}
            Err(CoreError::Provider(ProviderError::ContainerNotFound(_))) => {
                tracing::debug!("Container {} already gone", id.short());
                self.forget();
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        match self.client.remove_container(&id, &options).await {
            Ok(()) | Err(ProviderError::ContainerNotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!("Removed container {}", id.short());

        self.forget();
        Ok(())
    }

    fn forget(&mut self) {
        self.id = None;
        self.inspected = None;
    }

    /// Start the container, creating it first if it has no id
    pub async fn start(&mut self, options: StartOptions) -> Result<()> {
        if self.id.is_none() {
            self.create(Map::new()).await?;
        }
        let id = self.require_id()?.clone();

        let result = self.client.start(&id, &options).await;
        self.inspected = None;
        result?;

        tracing::info!("Started container {}", id.short());
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        let id = self.require_id()?.clone();

        let result = self.client.stop(&id, self.stop_timeout).await;
        self.inspected = None;
        result?;

        tracing::info!("Stopped container {}", id.short());
        Ok(())
    }

    /// Return the cached inspection snapshot, fetching one if none is cached
    /// or `refresh` is set
    pub async fn inspect(&mut self, refresh: bool) -> Result<&ContainerInspect> {
        let snapshot = match self.inspected.take() {
            Some(cached) if !refresh => cached,
            _ => {
                let id = self.require_id()?;
                tracing::debug!("Inspecting container {}", id.short());
                self.client.inspect_container(id).await?
            }
        };
        Ok(self.inspected.insert(snapshot))
    }

    /// Derived state over the current snapshot; see [`inspect`](Self::inspect)
    pub async fn state(&mut self) -> Result<ContainerState> {
        let snapshot = self.inspect(false).await?;
        Ok(ContainerState::from(&snapshot.state))
    }

    /// Private network address from the current snapshot
    pub async fn internal_ip(&mut self) -> Result<Option<String>> {
        let snapshot = self.inspect(false).await?;
        Ok(snapshot.ip_address.clone())
    }

    /// Address where published ports are reachable, resolved once
    pub fn host_ip(&self) -> Result<&str> {
        if let Some(ip) = self.host_ip.get() {
            return Ok(ip.as_str());
        }
        let ip = resolve_host_ip(self.client.base_url())?;
        Ok(self.host_ip.get_or_init(|| ip).as_str())
    }

    /// Host address and port bound to a TCP container port
    pub async fn port(&self, port: u16) -> Result<Option<(String, u16)>> {
        self.port_with_protocol(port, "tcp").await
    }

    /// Host address and port bound to a container port, `None` if unbound
    pub async fn port_with_protocol(
        &self,
        port: u16,
        protocol: &str,
    ) -> Result<Option<(String, u16)>> {
        let id = self.require_id()?;
        let bindings = self
            .client
            .port(id, &format!("{}/{}", port, protocol))
            .await?;

        let Some(binding) = bindings.first() else {
            return Ok(None);
        };
        let host_port = binding.host_port.parse::<u16>().map_err(|_| {
            CoreError::InvalidState(format!(
                "Daemon reported invalid host port '{}' for {}/{}",
                binding.host_port, port, protocol
            ))
        })?;

        Ok(Some((self.host_ip()?.to_string(), host_port)))
    }

    /// Run a command to completion inside the running container
    pub async fn execute(&self, cmd: &[String], options: &ExecOptions) -> Result<ExecOutput> {
        let id = self.require_id()?;
        tracing::debug!("Executing in {}: {:?}", id.short(), cmd);

        let exec_id = self.client.exec_create(id, cmd, options).await?;
        let output = self.client.exec_start(&exec_id).await?;
        let inspect = self.client.exec_inspect(&exec_id).await?;

        Ok(ExecOutput { output, inspect })
    }

    /// Run a command and stream its output.
    ///
    /// The exec instance is created and started before this returns, so a
    /// rejected command fails here rather than inside the stream. The stream
    /// ends with the exec's post-completion inspection.
    pub async fn stream(&self, cmd: &[String], options: &ExecOptions) -> Result<ExecEvents> {
        let id = self.require_id()?;
        tracing::debug!("Streaming exec in {}: {:?}", id.short(), cmd);

        let exec_id = self.client.exec_create(id, cmd, options).await?;
        let output = self.client.exec_start_stream(&exec_id).await?;

        let client = Arc::clone(&self.client);
        let status = stream::once(async move {
            client
                .exec_inspect(&exec_id)
                .await
                .map(ExecEvent::Status)
                .map_err(CoreError::from)
        });

        Ok(output
            .map(|chunk| chunk.map(ExecEvent::Chunk).map_err(CoreError::from))
            .chain(status)
            .boxed())
    }

    /// Wait for the container to exit and return its status code
    pub async fn wait(&self) -> Result<i64> {
        let id = self.require_id()?;
        Ok(self.client.wait(id).await?)
    }
}

fn resolve_host_ip(base_url: &str) -> Result<String> {
    let endpoint = DaemonEndpoint::parse(base_url, false)?;
    if endpoint.is_local() {
        return Ok(LOOPBACK_ADDR.to_string());
    }
    endpoint.hostname().ok_or_else(|| {
        CoreError::InvalidState(format!("No host in daemon URL '{}'", base_url))
    })
}
