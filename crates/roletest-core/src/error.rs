//! Error types for roletest-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Daemon request failed: {0}")]
    Provider(#[from] roletest_provider::ProviderError),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Container already exists: {0}")]
    ContainerExists(String),

    #[error("Container from image {0} has not been created")]
    NotCreated(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
