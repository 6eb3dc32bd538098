//! Image resolution: reuse the caller's image or build a fresh one
//!
//! Building happens either in the caller's directory or in a temporary
//! context holding nothing but the inline Dockerfile. The temporary
//! directory lives only as long as the build command.

use std::path::Path;

use log::Level;

use super::names;
use super::supervisor;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::errors::{Result, ThrowawayError};
use crate::request::{ImageSource, RunRequest};
use crate::sink::LogSink;

/// The image a container will be started from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    name: String,
    owned: bool,
}

impl ResolvedImage {
    /// Decide the image name before anything is built, so a failed build
    /// can still be cleaned up by tag
    pub fn plan(source: &ImageSource) -> Self {
        match source {
            ImageSource::Image(image) => Self {
                name: image.clone(),
                owned: false,
            },
            ImageSource::Dockerfile(_) | ImageSource::Home(_) => Self {
                name: names::unique_name(),
                owned: true,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this invocation created the image and must remove it
    pub fn is_owned(&self) -> bool {
        self.owned
    }
}

/// Arguments of the engine's `build` command, without the engine prefix
pub fn build_arguments(image: &str, request: &RunRequest, context: &Path) -> Vec<String> {
    let mut args = vec!["build".to_string(), "--tag".to_string(), image.to_string()];
    for (name, value) in &request.build_args {
        args.push("--build-arg".to_string());
        args.push(format!("{}={}", name, value));
    }
    args.push(context.display().to_string());
    args
}

/// Build the image described by `source`; a no-op for existing images
pub(crate) async fn build_image(
    engine: &dyn Engine,
    config: &EngineConfig,
    request: &RunRequest,
    source: &ImageSource,
    image: &ResolvedImage,
    sink: &dyn LogSink,
) -> Result<()> {
    match source {
        ImageSource::Image(_) => {
            log::debug!("Using existing image {}", image.name());
            Ok(())
        }
        ImageSource::Home(home) => build_in(engine, config, request, image, home, sink).await,
        ImageSource::Dockerfile(text) => {
            let context = tempfile::Builder::new().prefix("throwaway-").tempdir()?;
            tokio::fs::write(context.path().join("Dockerfile"), text).await?;
            let built = build_in(engine, config, request, image, context.path(), sink).await;
            if let Err(e) = context.close() {
                sink.log(
                    Level::Warn,
                    &format!("Failed to delete temporary build context: {}", e),
                );
            }
            built
        }
    }
}

async fn build_in(
    engine: &dyn Engine,
    config: &EngineConfig,
    request: &RunRequest,
    image: &ResolvedImage,
    context: &Path,
    sink: &dyn LogSink,
) -> Result<()> {
    let command = config.command_line(build_arguments(image.name(), request, context))?;
    log::info!("Building image {} from {}", image.name(), context.display());

    let output =
        supervisor::bounded(engine, &command, request.build_timeout(), Level::Debug, sink).await?;
    if !output.success() {
        sink.log(Level::Error, &output.stdout);
        return Err(ThrowawayError::BuildFailed {
            image: image.name().to_string(),
            command,
            code: output.code,
            output: output.stdout,
        });
    }
    Ok(())
}
