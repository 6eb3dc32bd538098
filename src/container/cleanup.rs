//! Best-effort teardown of everything an invocation created
//!
//! None of these steps fail: problems are reported to the sink and the
//! next step runs anyway.

use log::Level;

use crate::config::{EngineConfig, IMAGE_REMOVAL_TIMEOUT};
use crate::engine::Engine;
use crate::sink::LogSink;

/// Fetch the container's logs, then force-remove it.
///
/// Logs are echoed at debug when the run command exited with zero and at
/// error otherwise. Returns the logs if they could be fetched.
pub(crate) async fn dispose_container(
    engine: &dyn Engine,
    config: &EngineConfig,
    container: &str,
    exit_code: Option<i32>,
    sink: &dyn LogSink,
) -> Option<String> {
    let level = if exit_code == Some(0) {
        Level::Debug
    } else {
        Level::Error
    };
    let logs = fetch_logs(engine, config, container, level, sink).await;
    remove_container(engine, config, container, sink).await;
    logs
}

async fn fetch_logs(
    engine: &dyn Engine,
    config: &EngineConfig,
    container: &str,
    level: Level,
    sink: &dyn LogSink,
) -> Option<String> {
    let command = match config.command_line(["logs", container]) {
        Ok(command) => command,
        Err(e) => {
            sink.log(Level::Warn, &format!("Cannot fetch logs of {}: {}", container, e));
            return None;
        }
    };
    match engine.execute(&command, level, sink).await {
        Ok(output) if output.success() => Some(output.stdout),
        Ok(output) => {
            sink.log(
                Level::Warn,
                &format!(
                    "Failed to fetch logs of {} (exit code is #{})",
                    container, output.code
                ),
            );
            None
        }
        Err(e) => {
            sink.log(Level::Warn, &format!("Failed to fetch logs of {}: {}", container, e));
            None
        }
    }
}

async fn remove_container(
    engine: &dyn Engine,
    config: &EngineConfig,
    container: &str,
    sink: &dyn LogSink,
) {
    let command = match config.command_line(["rm", "--force", container]) {
        Ok(command) => command,
        Err(e) => {
            sink.log(Level::Warn, &format!("Cannot remove container {}: {}", container, e));
            return;
        }
    };
    match engine.execute(&command, Level::Debug, sink).await {
        Ok(output) if output.success() => {
            log::debug!("Removed container {}", container);
        }
        Ok(output) => sink.log(
            Level::Warn,
            &format!(
                "Failed to remove container {} (exit code is #{})",
                container, output.code
            ),
        ),
        Err(e) => sink.log(
            Level::Warn,
            &format!("Failed to remove container {}: {}", container, e),
        ),
    }
}

/// Remove an image this invocation built, within a fixed short deadline
pub(crate) async fn remove_image(
    engine: &dyn Engine,
    config: &EngineConfig,
    image: &str,
    sink: &dyn LogSink,
) {
    let command = match config.command_line(["rmi", image]) {
        Ok(command) => command,
        Err(e) => {
            sink.log(Level::Warn, &format!("Cannot remove image {}: {}", image, e));
            return;
        }
    };
    let removal = tokio::time::timeout(
        IMAGE_REMOVAL_TIMEOUT,
        engine.execute(&command, Level::Debug, sink),
    );
    match removal.await {
        Ok(Ok(output)) if output.success() => {
            log::debug!("Removed image {}", image);
        }
        Ok(Ok(output)) => sink.log(
            Level::Warn,
            &format!(
                "Failed to remove image {} (exit code is #{})",
                image, output.code
            ),
        ),
        Ok(Err(e)) => sink.log(
            Level::Warn,
            &format!("Failed to remove image {}: {}", image, e),
        ),
        Err(_) => sink.log(
            Level::Warn,
            &format!(
                "Gave up removing image {} after {} seconds",
                image,
                IMAGE_REMOVAL_TIMEOUT.as_secs()
            ),
        ),
    }
}
