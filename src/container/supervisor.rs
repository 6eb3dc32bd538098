//! Execution supervision: deadlines, exit-code classification and the
//! background callback

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use log::Level;

use crate::engine::{CommandOutput, Engine};
use crate::errors::{Result, ThrowawayError};
use crate::sink::LogSink;

/// What a background callback learns about the container it runs beside
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningContainer {
    pub name: String,
    /// Host name that reaches this machine from inside the container
    pub host: String,
}

pub type Callback = Box<
    dyn FnOnce(RunningContainer) -> BoxFuture<'static, anyhow::Result<Option<String>>> + Send,
>;

/// How the container's main process relates to the caller
pub enum Mode {
    /// Wait for the container to exit and return what it printed
    Foreground,
    /// Start detached, hand the container to the callback, return its logs
    /// unless the callback returns a value of its own
    Background(Callback),
}

impl Mode {
    pub fn background<F, Fut>(callback: F) -> Self
    where
        F: FnOnce(RunningContainer) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Option<String>>> + Send + 'static,
    {
        Mode::Background(Box::new(move |container| callback(container).boxed()))
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, Mode::Background(_))
    }
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Foreground => f.write_str("Foreground"),
            Mode::Background(_) => f.write_str("Background(..)"),
        }
    }
}

/// Result of supervising the run command
#[derive(Debug)]
pub(crate) struct Supervised {
    /// Exit code of the run command, `None` if it never finished
    pub exit_code: Option<i32>,
    pub outcome: Result<Outcome>,
}

#[derive(Debug)]
pub(crate) enum Outcome {
    /// Foreground output of the workload
    Output(String),
    /// Whatever the background callback returned, next to what the
    /// detached start printed
    Callback {
        value: Option<String>,
        started: String,
    },
}

/// Run `command` on `engine`, giving up once `limit` has elapsed
pub(crate) async fn bounded(
    engine: &dyn Engine,
    command: &str,
    limit: Duration,
    level: Level,
    sink: &dyn LogSink,
) -> Result<CommandOutput> {
    match tokio::time::timeout(limit, engine.execute(command, level, sink)).await {
        Ok(result) => result,
        Err(_) => {
            let error = ThrowawayError::Timeout {
                command: command.to_string(),
                timeout: limit,
            };
            sink.log(Level::Error, &error.to_string());
            Err(error)
        }
    }
}

/// Turn a finished run command into its output, or a failure if it exited non-zero
pub(crate) fn classify(command: &str, output: CommandOutput, sink: &dyn LogSink) -> Result<String> {
    if output.success() {
        return Ok(output.stdout);
    }
    sink.log(Level::Error, &output.stdout);
    Err(ThrowawayError::RunFailed {
        command: command.to_string(),
        code: output.code,
        lines: output.line_count(),
        output: output.stdout,
    })
}

pub(crate) async fn supervise(
    engine: &dyn Engine,
    command: &str,
    limit: Duration,
    mode: Mode,
    container: RunningContainer,
    sink: &dyn LogSink,
) -> Supervised {
    let output = match bounded(engine, command, limit, Level::Debug, sink).await {
        Ok(output) => output,
        Err(e) => {
            return Supervised {
                exit_code: None,
                outcome: Err(e),
            }
        }
    };
    let exit_code = Some(output.code);

    let stdout = match classify(command, output, sink) {
        Ok(stdout) => stdout,
        Err(e) => {
            return Supervised {
                exit_code,
                outcome: Err(e),
            }
        }
    };

    let outcome = match mode {
        Mode::Foreground => Ok(Outcome::Output(stdout)),
        Mode::Background(callback) => {
            log::debug!("Container {} started in background", container.name);
            callback(container)
                .await
                .map(|value| Outcome::Callback {
                    value,
                    started: stdout,
                })
                .map_err(ThrowawayError::CallbackFailed)
        }
    };

    Supervised { exit_code, outcome }
}
