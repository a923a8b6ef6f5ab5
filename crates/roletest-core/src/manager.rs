//! Container manager - named registry with guaranteed teardown

use crate::{Container, CoreError, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use roletest_provider::{ContainerOptions, DaemonClient, RemoveOptions};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Owns a set of containers by logical name.
///
/// Every registered container is destroyed exactly once, either through
/// [`destroy`](Self::destroy) or when a [`scope`](Self::scope) ends.
pub struct ContainerManager {
    client: Arc<dyn DaemonClient>,
    containers: HashMap<String, Container>,
    stop_timeout: Option<u32>,
    remove_options: RemoveOptions,
}

impl ContainerManager {
    pub fn new(client: Arc<dyn DaemonClient>) -> Self {
        Self {
            client,
            containers: HashMap::new(),
            stop_timeout: None,
            remove_options: RemoveOptions::default(),
        }
    }

    /// Stop timeout given to every container created afterwards
    pub fn with_stop_timeout(mut self, secs: u32) -> Self {
        self.stop_timeout = Some(secs);
        self
    }

    /// Options used when removing containers on destroy
    pub fn with_remove_options(mut self, options: RemoveOptions) -> Self {
        self.remove_options = options;
        self
    }

    /// Register a new container under `name`.
    ///
    /// Nothing is sent to the daemon until the container is created or
    /// started.
    pub fn create(&mut self, name: &str, options: ContainerOptions) -> Result<&mut Container> {
        if self.containers.contains_key(name) {
            return Err(CoreError::ContainerExists(name.to_string()));
        }

        let mut container = Container::new(Arc::clone(&self.client), options);
        if let Some(secs) = self.stop_timeout {
            container = container.with_stop_timeout(secs);
        }
        tracing::debug!("Registered container '{}' ({})", name, container.image());

        Ok(self.containers.entry(name.to_string()).or_insert(container))
    }

    pub fn get(&self, name: &str) -> Option<&Container> {
        self.containers.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Container> {
        self.containers.get_mut(name)
    }

    /// Like [`get_mut`](Self::get_mut), failing on unknown names
    pub fn container(&mut self, name: &str) -> Result<&mut Container> {
        self.containers
            .get_mut(name)
            .ok_or_else(|| CoreError::ContainerNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.containers.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.containers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Destroy and unregister containers.
    ///
    /// `None` destroys everything; otherwise only the listed names, ignoring
    /// unknown ones. Every name is attempted. A container that fails to be
    /// destroyed stays registered and the first error is returned.
    pub async fn destroy(&mut self, names: Option<&[&str]>) -> Result<()> {
        let targets: Vec<String> = match names {
            None => self.names(),
            Some(names) => names
                .iter()
                .filter(|n| self.containers.contains_key(**n))
                .map(|n| n.to_string())
                .collect(),
        };

        let mut first_error = None;
        for name in targets {
            let Some(container) = self.containers.get_mut(&name) else {
                continue;
            };
            match container.destroy(self.remove_options).await {
                Ok(()) => {
                    self.containers.remove(&name);
                    tracing::debug!("Unregistered container '{}'", name);
                }
                Err(e) => {
                    tracing::warn!("Failed to destroy container '{}': {}", name, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub async fn destroy_all(&mut self) -> Result<()> {
        self.destroy(None).await
    }

    /// Run `f` with this manager, then destroy every container it still owns.
    ///
    /// Teardown runs exactly once whether `f` returns `Ok`, returns `Err` or
    /// panics; a panic is resumed after teardown. When both `f` and teardown
    /// fail, the error from `f` is returned and the teardown error is logged.
    pub async fn scope<T, E, F>(mut self, f: F) -> std::result::Result<T, E>
    where
        F: for<'a> FnOnce(&'a mut ContainerManager) -> BoxFuture<'a, std::result::Result<T, E>>,
        E: From<CoreError>,
    {
        let outcome = AssertUnwindSafe(f(&mut self)).catch_unwind().await;
        let cleanup = self.destroy(None).await;

        match outcome {
            Ok(Ok(value)) => {
                cleanup?;
                Ok(value)
            }
            Ok(Err(e)) => {
                if let Err(cleanup_err) = cleanup {
                    tracing::warn!("Cleanup after failure also failed: {}", cleanup_err);
                }
                Err(e)
            }
            Err(panic) => {
                if let Err(cleanup_err) = cleanup {
                    tracing::warn!("Cleanup after panic failed: {}", cleanup_err);
                }
                std::panic::resume_unwind(panic)
            }
        }
    }

    /// Shorthand for `ContainerManager::new(client).scope(f)`
    pub async fn scoped<T, E, F>(client: Arc<dyn DaemonClient>, f: F) -> std::result::Result<T, E>
    where
        F: for<'a> FnOnce(&'a mut ContainerManager) -> BoxFuture<'a, std::result::Result<T, E>>,
        E: From<CoreError>,
    {
        Self::new(client).scope(f).await
    }
}

impl Drop for ContainerManager {
    fn drop(&mut self) {
        let leaked: Vec<String> = self
            .containers
            .iter()
            .filter_map(|(name, c)| c.id().map(|id| format!("{} ({})", name, id.short())))
            .collect();
        if !leaked.is_empty() {
            tracing::warn!(
                "Container manager dropped with live containers: {}",
                leaked.join(", ")
            );
        }
    }
}
