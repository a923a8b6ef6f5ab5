//! Error types for the daemon connection

use thiserror::Error;

/// A rejected or failed request to the container daemon
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to connect to container daemon: {0}")]
    ConnectionError(String),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Exec failed: {0}")]
    ExecError(String),

    #[error("Container daemon error: {0}")]
    RuntimeError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Daemon request failed: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("Invalid container options: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProviderError>;
