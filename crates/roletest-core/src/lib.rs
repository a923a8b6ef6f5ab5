//! Container lifecycle and execution core for ansible-role-test
//!
//! This crate provides:
//! - `Container`: a handle to one daemon-side container with a lazily
//!   refreshed inspection cache
//! - `ContainerManager`: a named registry of containers with guaranteed
//!   teardown when its scope ends
//! - Derived container state and exec output types

mod container;
mod error;
mod exec;
mod manager;
mod state;

pub use container::*;
pub use error::*;
pub use exec::*;
pub use manager::*;
pub use state::*;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
