//! Configuration parsing for ansible-role-test
//!
//! This crate handles parsing of:
//! - Global configuration (`~/.config/ansible-role-test/config.toml`)
//! - Role paths files passed with `--config`

mod error;
mod global;
mod paths;

pub use error::*;
pub use global::*;
pub use paths::*;
