//! Test support utilities for roletest-core
//!
//! Provides MockDaemon and helpers for unit testing `Container` and
//! `ContainerManager` without a running container daemon.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use roletest_provider::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Records which methods were called on the mock
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Ping,
    Create { image: String, name: Option<String> },
    Start { id: String },
    Stop { id: String, timeout: Option<u32> },
    Remove { id: String, force: bool, volumes: bool },
    Inspect { id: String },
    ExecCreate { id: String, cmd: Vec<String> },
    ExecStart { exec_id: String },
    ExecStartStream { exec_id: String },
    ExecInspect { exec_id: String },
    Port { id: String, port: String },
    Wait { id: String },
}

/// Configurable mock daemon for testing.
///
/// Created containers get ids `mock_container_1`, `mock_container_2`, ...
/// and exec instances `mock_exec_1`, ... in call order.
pub struct MockDaemon {
    pub base_url: String,
    pub calls: Arc<Mutex<Vec<MockCall>>>,
    /// Options of the most recent create call
    pub last_create: Arc<Mutex<Option<ContainerOptions>>>,
    /// Error for create calls (if Some, create returns this error)
    pub create_error: Arc<Mutex<Option<ProviderError>>>,
    /// Options of the most recent start call
    pub last_start: Arc<Mutex<Option<StartOptions>>>,
    pub start_result: Arc<Mutex<Result<()>>>,
    pub stop_result: Arc<Mutex<Result<()>>>,
    pub remove_result: Arc<Mutex<Result<()>>>,
    pub ping_result: Arc<Mutex<Result<()>>>,
    /// State flags reported by inspect calls
    pub state_result: Arc<Mutex<Result<StateInfo>>>,
    pub ip_address: Arc<Mutex<Option<String>>>,
    /// Output chunks delivered by exec calls
    pub exec_chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    pub exec_exit_code: Arc<Mutex<i64>>,
    /// Error for exec_create calls (if Some, exec_create returns this error)
    pub exec_error: Arc<Mutex<Option<ProviderError>>>,
    pub port_result: Arc<Mutex<Result<Vec<PortBinding>>>>,
    pub wait_result: Arc<Mutex<Result<i64>>>,
    next_container: AtomicUsize,
    next_exec: AtomicUsize,
}

impl Default for MockDaemon {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDaemon {
    /// Create a mock on a local socket with default success results
    pub fn new() -> Self {
        Self::with_base_url("unix:///var/run/docker.sock")
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
            last_create: Arc::new(Mutex::new(None)),
            create_error: Arc::new(Mutex::new(None)),
            last_start: Arc::new(Mutex::new(None)),
            start_result: Arc::new(Mutex::new(Ok(()))),
            stop_result: Arc::new(Mutex::new(Ok(()))),
            remove_result: Arc::new(Mutex::new(Ok(()))),
            ping_result: Arc::new(Mutex::new(Ok(()))),
            state_result: Arc::new(Mutex::new(Ok(mock_running_state()))),
            ip_address: Arc::new(Mutex::new(Some("172.17.0.2".to_string()))),
            exec_chunks: Arc::new(Mutex::new(Vec::new())),
            exec_exit_code: Arc::new(Mutex::new(0)),
            exec_error: Arc::new(Mutex::new(None)),
            port_result: Arc::new(Mutex::new(Ok(Vec::new()))),
            wait_result: Arc::new(Mutex::new(Ok(0))),
            next_container: AtomicUsize::new(1),
            next_exec: AtomicUsize::new(1),
        }
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Check if a specific call was made
    pub fn was_called(&self, call: &MockCall) -> bool {
        self.calls.lock().unwrap().contains(call)
    }

    /// Number of recorded calls matching `pred`
    pub fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn take_error(slot: &Arc<Mutex<Option<ProviderError>>>) -> Result<()> {
        match &*slot.lock().unwrap() {
            Some(e) => Err(clone_provider_error(e)),
            None => Ok(()),
        }
    }
}

/// State flags of a running container
pub fn mock_running_state() -> StateInfo {
    StateInfo {
        running: true,
        pid: 1234,
        started_at: Some("2024-01-01T00:00:00Z".to_string()),
        finished_at: Some("0001-01-01T00:00:00Z".to_string()),
        ..Default::default()
    }
}

/// Helper to build a container inspection snapshot
pub fn mock_container_inspect(id: &str, state: StateInfo) -> ContainerInspect {
    ContainerInspect {
        id: ContainerId::new(id),
        name: format!("/{}", id),
        image: "sha256:mock_image".to_string(),
        state,
        ip_address: None,
    }
}

/// Helper to clone a Result<T> from an Arc<Mutex<Result<T>>>
fn clone_result<T: Clone>(r: &Arc<Mutex<Result<T>>>) -> Result<T> {
    let guard = r.lock().unwrap();
    match &*guard {
        Ok(v) => Ok(v.clone()),
        Err(e) => Err(clone_provider_error(e)),
    }
}

/// Clone a ProviderError (thiserror types don't implement Clone)
fn clone_provider_error(e: &ProviderError) -> ProviderError {
    match e {
        ProviderError::ConnectionError(s) => ProviderError::ConnectionError(s.clone()),
        ProviderError::ContainerNotFound(s) => ProviderError::ContainerNotFound(s.clone()),
        ProviderError::ImageNotFound(s) => ProviderError::ImageNotFound(s.clone()),
        ProviderError::ExecError(s) => ProviderError::ExecError(s.clone()),
        ProviderError::RuntimeError(s) => ProviderError::RuntimeError(s.clone()),
        ProviderError::ConfigError(s) => ProviderError::ConfigError(s.clone()),
        ProviderError::Docker(e) => ProviderError::RuntimeError(e.to_string()),
        ProviderError::Json(e) => ProviderError::RuntimeError(e.to_string()),
    }
}

#[async_trait]
impl DaemonClient for MockDaemon {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn ping(&self) -> Result<()> {
        self.record(MockCall::Ping);
        clone_result(&self.ping_result)
    }

    async fn create_container(&self, options: &ContainerOptions) -> Result<ContainerId> {
        self.record(MockCall::Create {
            image: options.image.clone(),
            name: options.name.clone(),
        });
        *self.last_create.lock().unwrap() = Some(options.clone());
        Self::take_error(&self.create_error)?;

        let n = self.next_container.fetch_add(1, Ordering::SeqCst);
        Ok(ContainerId::new(format!("mock_container_{}", n)))
    }

    async fn start(&self, id: &ContainerId, options: &StartOptions) -> Result<()> {
        self.record(MockCall::Start { id: id.0.clone() });
        *self.last_start.lock().unwrap() = Some(options.clone());
        clone_result(&self.start_result)
    }

    async fn stop(&self, id: &ContainerId, timeout: Option<u32>) -> Result<()> {
        self.record(MockCall::Stop {
            id: id.0.clone(),
            timeout,
        });
        clone_result(&self.stop_result)
    }

    async fn remove_container(&self, id: &ContainerId, options: &RemoveOptions) -> Result<()> {
        self.record(MockCall::Remove {
            id: id.0.clone(),
            force: options.force,
            volumes: options.volumes,
        });
        clone_result(&self.remove_result)
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInspect> {
        self.record(MockCall::Inspect { id: id.0.clone() });
        let state = clone_result(&self.state_result)?;
        let mut inspect = mock_container_inspect(&id.0, state);
        inspect.ip_address = self.ip_address.lock().unwrap().clone();
        Ok(inspect)
    }

    async fn exec_create(
        &self,
        id: &ContainerId,
        cmd: &[String],
        _options: &ExecOptions,
    ) -> Result<ExecId> {
        self.record(MockCall::ExecCreate {
            id: id.0.clone(),
            cmd: cmd.to_vec(),
        });
        Self::take_error(&self.exec_error)?;

        let n = self.next_exec.fetch_add(1, Ordering::SeqCst);
        Ok(ExecId::new(format!("mock_exec_{}", n)))
    }

    async fn exec_start(&self, exec_id: &ExecId) -> Result<Vec<u8>> {
        self.record(MockCall::ExecStart {
            exec_id: exec_id.0.clone(),
        });
        Ok(self.exec_chunks.lock().unwrap().concat())
    }

    async fn exec_start_stream(&self, exec_id: &ExecId) -> Result<OutputStream> {
        self.record(MockCall::ExecStartStream {
            exec_id: exec_id.0.clone(),
        });
        let chunks = self.exec_chunks.lock().unwrap().clone();
        Ok(stream::iter(chunks.into_iter().map(Ok)).boxed())
    }

    async fn exec_inspect(&self, exec_id: &ExecId) -> Result<ExecInspect> {
        self.record(MockCall::ExecInspect {
            exec_id: exec_id.0.clone(),
        });
        Ok(ExecInspect {
            id: exec_id.clone(),
            running: false,
            exit_code: Some(*self.exec_exit_code.lock().unwrap()),
            pid: Some(4321),
        })
    }

    async fn port(&self, id: &ContainerId, port: &str) -> Result<Vec<PortBinding>> {
        self.record(MockCall::Port {
            id: id.0.clone(),
            port: port.to_string(),
        });
        clone_result(&self.port_result)
    }

    async fn wait(&self, id: &ContainerId) -> Result<i64> {
        self.record(MockCall::Wait { id: id.0.clone() });
        clone_result(&self.wait_result)
    }
}
