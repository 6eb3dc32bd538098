//! Container engine abstraction
//!
//! The engine is an external command-line program (normally `docker`). This
//! module hides how a command line is executed so the lifecycle can be
//! driven by a real shell or by a scripted double in tests.

use async_trait::async_trait;
use log::Level;

use crate::errors::Result;
use crate::sink::LogSink;

pub mod quote;
pub mod shell;

pub use shell::ShellEngine;

/// Combined stdout/stderr of a finished command and its exit code
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    pub fn line_count(&self) -> usize {
        self.stdout.lines().count()
    }
}

#[async_trait]
pub trait Engine: Send + Sync {
    /// Execute an already quoted shell command line and wait for it.
    ///
    /// Output lines are forwarded to `sink` at `level` as they arrive.
    /// Dropping the returned future must stop the underlying process.
    async fn execute(&self, command: &str, level: Level, sink: &dyn LogSink)
        -> Result<CommandOutput>;
}
