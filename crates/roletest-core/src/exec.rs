//! Exec output types

use crate::Result;
use futures::stream::BoxStream;
use roletest_provider::ExecInspect;
use std::borrow::Cow;

/// One element of a streamed exec.
///
/// A stream yields any number of `Chunk`s in the order the daemon sent them,
/// then exactly one `Status` as its last element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecEvent {
    Chunk(Vec<u8>),
    Status(ExecInspect),
}

/// Streamed exec output, consumed by value and not restartable
pub type ExecEvents = BoxStream<'static, Result<ExecEvent>>;

/// Result of a command run to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// Combined stdout/stderr in delivery order
    pub output: Vec<u8>,
    pub inspect: ExecInspect,
}

impl ExecOutput {
    pub fn exit_code(&self) -> Option<i64> {
        self.inspect.exit_code
    }

    pub fn succeeded(&self) -> bool {
        self.inspect.succeeded()
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }
}
