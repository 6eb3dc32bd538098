//! One container lifecycle from image to teardown
//!
//! Two nested scopes guarantee cleanup: the image scope wraps the build and
//! the container scope, and the container scope wraps the run and the
//! callback. Each scope releases what it acquired on every exit path,
//! including a panic in the callback, which is resumed afterwards.

use std::panic::{self, AssertUnwindSafe};

use futures_util::FutureExt;

use super::cleanup;
use super::image::{self, ResolvedImage};
use super::launch::{self, Host};
use super::names;
use super::supervisor::{self, Mode, Outcome, RunningContainer};
use crate::config::EngineConfig;
use crate::engine::{Engine, ShellEngine};
use crate::errors::Result;
use crate::request::{ImageSource, RunRequest};
use crate::sink::LogSink;

/// Build or reuse an image, run a container from it, clean up, and return
/// what the container printed.
///
/// The engine program and the sudo toggle are read from the environment,
/// commands go through `sh`.
pub async fn run(request: &RunRequest, mode: Mode, sink: &dyn LogSink) -> Result<String> {
    let config = EngineConfig::from_env();
    run_with(
        &ShellEngine::default(),
        &config,
        &Host::current(),
        request,
        mode,
        sink,
    )
    .await
}

/// Same as [`run`] with every collaborator supplied by the caller
pub async fn run_with(
    engine: &dyn Engine,
    config: &EngineConfig,
    host: &Host,
    request: &RunRequest,
    mode: Mode,
    sink: &dyn LogSink,
) -> Result<String> {
    let source = request.validate()?;
    let image = ResolvedImage::plan(&source);

    let result = AssertUnwindSafe(build_and_run(
        engine, config, host, request, &source, &image, mode, sink,
    ))
    .catch_unwind()
    .await;

    if image.is_owned() {
        cleanup::remove_image(engine, config, image.name(), sink).await;
    }

    result.unwrap_or_else(|payload| panic::resume_unwind(payload))
}

#[allow(clippy::too_many_arguments)]
async fn build_and_run(
    engine: &dyn Engine,
    config: &EngineConfig,
    host: &Host,
    request: &RunRequest,
    source: &ImageSource,
    image: &ResolvedImage,
    mode: Mode,
    sink: &dyn LogSink,
) -> Result<String> {
    image::build_image(engine, config, request, source, image, sink).await?;

    let container = names::unique_name();
    let args = launch::run_arguments(host, request, image.name(), &container, mode.is_detached())?;
    let command = config.command_line(args)?;
    log::info!("Starting container {} from {}", container, image.name());

    let running = RunningContainer {
        name: container.clone(),
        host: host.gateway().to_string(),
    };
    let supervised = AssertUnwindSafe(supervisor::supervise(
        engine,
        &command,
        request.timeout(),
        mode,
        running,
        sink,
    ))
    .catch_unwind()
    .await;

    let exit_code = supervised.as_ref().ok().and_then(|s| s.exit_code);
    let logs = cleanup::dispose_container(engine, config, &container, exit_code, sink).await;

    let supervised = supervised.unwrap_or_else(|payload| panic::resume_unwind(payload));
    match supervised.outcome? {
        Outcome::Output(stdout) => Ok(stdout),
        Outcome::Callback {
            value: Some(value), ..
        } => Ok(value),
        Outcome::Callback {
            value: None,
            started,
        } => Ok(logs.unwrap_or(started)),
    }
}
