//! Docker daemon client using bollard

use crate::{
    ContainerId, ContainerInspect, ContainerOptions, DaemonClient, DaemonEndpoint, ExecId,
    ExecInspect, ExecOptions, OutputStream, PortBinding, ProviderError, RemoveOptions, Result,
    StartOptions, StateInfo,
};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogOutput, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::models::{ContainerInspectResponse, ContainerWaitResponse, PortMap};
use bollard::Docker;
use futures::StreamExt;
use roletest_config::DaemonConfig;
use serde_json::Value;

/// Daemon connection backed by the bollard crate
pub struct DockerDaemon {
    client: Docker,
    base_url: String,
}

impl DockerDaemon {
    /// Connect to the daemon described by `config` and check it responds
    pub async fn connect(config: &DaemonConfig) -> Result<Self> {
        let endpoint = DaemonEndpoint::parse(&config.host, config.tls_verify)?;
        let timeout = config.timeout_secs;

        let client = match &endpoint {
            DaemonEndpoint::Unix(path) => Docker::connect_with_socket(
                &path.to_string_lossy(),
                timeout,
                bollard::API_DEFAULT_VERSION,
            ),
            DaemonEndpoint::Http(url) => {
                Docker::connect_with_http(url, timeout, bollard::API_DEFAULT_VERSION)
            }
            DaemonEndpoint::Https(url) => {
                let certs = config.cert_dir().ok_or_else(|| {
                    ProviderError::ConfigError(format!(
                        "TLS endpoint {} requires daemon.cert_path",
                        url
                    ))
                })?;
                Docker::connect_with_ssl(
                    url,
                    &certs.join("key.pem"),
                    &certs.join("cert.pem"),
                    &certs.join("ca.pem"),
                    timeout,
                    bollard::API_DEFAULT_VERSION,
                )
            }
        }
        .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        let daemon = Self {
            client,
            base_url: endpoint.url(),
        };
        daemon.ping().await?;

        tracing::debug!("Connected to container daemon at {}", daemon.base_url);
        Ok(daemon)
    }
}

#[async_trait]
impl DaemonClient for DockerDaemon {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .ping()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;
        Ok(())
    }

    async fn create_container(&self, options: &ContainerOptions) -> Result<ContainerId> {
        let config = container_config(options)?;
        let create_options = options.name.as_deref().map(|name| CreateContainerOptions {
            name,
            platform: None,
        });

        let response = self
            .client
            .create_container(create_options, config)
            .await
            .map_err(|e| not_found(e, ProviderError::ImageNotFound))?;

        for warning in &response.warnings {
            tracing::warn!("Daemon warning creating {}: {}", options.image, warning);
        }

        Ok(ContainerId::new(response.id))
    }

    async fn start(&self, id: &ContainerId, options: &StartOptions) -> Result<()> {
        let options = options
            .detach_keys
            .clone()
            .map(|detach_keys| StartContainerOptions { detach_keys });
        self.client
            .start_container(&id.0, options)
            .await
            .map_err(|e| not_found(e, ProviderError::ContainerNotFound))?;
        Ok(())
    }

    async fn stop(&self, id: &ContainerId, timeout: Option<u32>) -> Result<()> {
        let options = StopContainerOptions {
            t: timeout.unwrap_or(10) as i64,
        };
        self.client
            .stop_container(&id.0, Some(options))
            .await
            .map_err(|e| not_found(e, ProviderError::ContainerNotFound))?;
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, options: &RemoveOptions) -> Result<()> {
        let options = RemoveContainerOptions {
            force: options.force,
            v: options.volumes,
            ..Default::default()
        };
        self.client
            .remove_container(&id.0, Some(options))
            .await
            .map_err(|e| not_found(e, ProviderError::ContainerNotFound))?;
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInspect> {
        let info = self
            .client
            .inspect_container(&id.0, None::<InspectContainerOptions>)
            .await
            .map_err(|e| not_found(e, ProviderError::ContainerNotFound))?;

        Ok(inspect_from_response(info, id))
    }

    async fn exec_create(
        &self,
        id: &ContainerId,
        cmd: &[String],
        options: &ExecOptions,
    ) -> Result<ExecId> {
        let env: Vec<String> = options
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let create = CreateExecOptions {
            cmd: Some(cmd.to_vec()),
            env: if env.is_empty() { None } else { Some(env) },
            working_dir: options.working_dir.clone(),
            user: options.user.clone(),
            tty: Some(options.tty),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            privileged: Some(options.privileged),
            ..Default::default()
        };

        let exec = self
            .client
            .create_exec(&id.0, create)
            .await
            .map_err(|e| not_found(e, ProviderError::ContainerNotFound))?;
        Ok(ExecId::new(exec.id))
    }

    async fn exec_start(&self, exec_id: &ExecId) -> Result<Vec<u8>> {
        let mut output = self.exec_start_stream(exec_id).await?;

        let mut captured = Vec::new();
        while let Some(chunk) = output.next().await {
            captured.extend_from_slice(&chunk?);
        }
        Ok(captured)
    }

    async fn exec_start_stream(&self, exec_id: &ExecId) -> Result<OutputStream> {
        let options = StartExecOptions {
            detach: false,
            ..Default::default()
        };

        let started = self
            .client
            .start_exec(&exec_id.0, Some(options))
            .await
            .map_err(|e| not_found(e, ProviderError::ExecError))?;

        match started {
            StartExecResults::Attached { output, .. } => Ok(output
                .map(|chunk| chunk.map(log_bytes).map_err(ProviderError::from))
                .boxed()),
            StartExecResults::Detached => Err(ProviderError::ExecError(format!(
                "Exec {} started in detached mode",
                exec_id
            ))),
        }
    }

    async fn exec_inspect(&self, exec_id: &ExecId) -> Result<ExecInspect> {
        let info = self
            .client
            .inspect_exec(&exec_id.0)
            .await
            .map_err(|e| not_found(e, ProviderError::ExecError))?;
        Ok(ExecInspect {
            id: ExecId::new(info.id.unwrap_or_else(|| exec_id.0.clone())),
            running: info.running.unwrap_or(false),
            exit_code: info.exit_code,
            pid: info.pid,
        })
    }

    async fn port(&self, id: &ContainerId, port: &str) -> Result<Vec<PortBinding>> {
        let info = self
            .client
            .inspect_container(&id.0, None::<InspectContainerOptions>)
            .await
            .map_err(|e| not_found(e, ProviderError::ContainerNotFound))?;

        let ports = info
            .network_settings
            .and_then(|ns| ns.ports)
            .unwrap_or_default();
        Ok(bindings_for(ports, port))
    }

    async fn wait(&self, id: &ContainerId) -> Result<i64> {
        let mut stream = Box::pin(
            self.client
                .wait_container(&id.0, None::<WaitContainerOptions<String>>),
        );

        wait_status(stream.next().await, id)
    }
}

/// Translate an inspect response into the snapshot the core works with.
/// Empty strings the daemon uses for "unset" become `None`.
fn inspect_from_response(info: ContainerInspectResponse, id: &ContainerId) -> ContainerInspect {
    let state = info.state.unwrap_or_default();
    let non_empty = |s: Option<String>| s.filter(|s| !s.is_empty());

    ContainerInspect {
        id: ContainerId::new(info.id.unwrap_or_else(|| id.0.clone())),
        name: info
            .name
            .unwrap_or_default()
            .trim_start_matches('/')
            .to_string(),
        image: info
            .config
            .and_then(|c| c.image)
            .unwrap_or_default(),
        state: StateInfo {
            oom_killed: state.oom_killed.unwrap_or(false),
            dead: state.dead.unwrap_or(false),
            paused: state.paused.unwrap_or(false),
            running: state.running.unwrap_or(false),
            restarting: state.restarting.unwrap_or(false),
            pid: state.pid.unwrap_or(0),
            started_at: non_empty(state.started_at),
            finished_at: non_empty(state.finished_at),
            exit_code: state.exit_code.unwrap_or(0),
            error: non_empty(state.error),
        },
        ip_address: non_empty(info.network_settings.and_then(|ns| ns.ip_address)),
    }
}

/// Host bindings of `port` (`"8080/tcp"`); an exposed but unpublished port
/// maps to `null` and yields nothing
fn bindings_for(mut ports: PortMap, port: &str) -> Vec<PortBinding> {
    ports
        .remove(port)
        .flatten()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|b| {
            b.host_port.map(|host_port| PortBinding {
                host_ip: b.host_ip,
                host_port,
            })
        })
        .collect()
}

fn wait_status(
    item: Option<std::result::Result<ContainerWaitResponse, DockerError>>,
    id: &ContainerId,
) -> Result<i64> {
    match item {
        Some(Ok(response)) => Ok(response.status_code),
        // bollard reports a non-zero exit as an error carrying the code
        Some(Err(DockerError::DockerContainerWaitError { code, .. })) => Ok(code),
        Some(Err(e)) => Err(not_found(e, ProviderError::ContainerNotFound)),
        None => Err(ProviderError::RuntimeError(format!(
            "Wait on {} ended without a status",
            id.short()
        ))),
    }
}

/// Build the create request body: typed fields first, then the
/// pass-through options merged over them
fn container_config(options: &ContainerOptions) -> Result<Config<String>> {
    let attach = !options.detach;
    let base: Config<String> = Config {
        image: Some(options.image.clone()),
        attach_stdout: Some(attach),
        attach_stderr: Some(attach),
        ..Default::default()
    };

    let mut body = serde_json::to_value(&base)?;
    if let Value::Object(map) = &mut body {
        for (key, value) in &options.extra {
            map.insert(key.clone(), value.clone());
        }
    }
    let config: Config<String> = serde_json::from_value(body)?;

    let accepted = serde_json::to_value(&config)?;
    for (key, value) in &options.extra {
        if !value.is_null() && accepted.get(key).is_none() {
            tracing::warn!("Container option '{}' is not understood by the daemon API", key);
        }
    }

    Ok(config)
}

fn log_bytes(output: LogOutput) -> Vec<u8> {
    match output {
        LogOutput::StdOut { message } => message.to_vec(),
        LogOutput::StdErr { message } => message.to_vec(),
        LogOutput::StdIn { message } => message.to_vec(),
        LogOutput::Console { message } => message.to_vec(),
    }
}

/// Map a 404 from the daemon to a typed not-found error
fn not_found(e: DockerError, wrap: fn(String) -> ProviderError) -> ProviderError {
    match e {
        DockerError::DockerResponseServerError {
            status_code: 404,
            message,
        } => wrap(message),
        other => other.into(),
    }
}
