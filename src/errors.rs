use std::time::Duration;

/// Errors that can occur while building, running or supervising a container
#[derive(Debug, thiserror::Error)]
pub enum ThrowawayError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Failed to build image {image} with {command} (exit code is #{code})")]
    BuildFailed {
        image: String,
        command: String,
        code: i32,
        output: String,
    },
    #[error("Failed to run {command} (exit code is #{code}, stdout has {lines} lines)")]
    RunFailed {
        command: String,
        code: i32,
        lines: usize,
        output: String,
    },
    #[error("Command timed out after {} seconds: {command}", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },
    #[error("Failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Container callback failed: {0}")]
    CallbackFailed(#[source] anyhow::Error),
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ThrowawayError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Exit code reported by the engine, if the failure carries one
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::BuildFailed { code, .. } | Self::RunFailed { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type Result<T, E = ThrowawayError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_failure_message() {
        let error = ThrowawayError::RunFailed {
            command: "docker run --name x ubuntu false".to_string(),
            code: 1,
            lines: 3,
            output: "a\nb\nc\n".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Failed to run docker run --name x ubuntu false (exit code is #1, stdout has 3 lines)"
        );
        assert_eq!(error.exit_code(), Some(1));
        assert!(!error.is_timeout());
    }

    #[test]
    fn test_timeout_message() {
        let error = ThrowawayError::Timeout {
            command: "docker run ubuntu sleep 100".to_string(),
            timeout: Duration::from_secs(10),
        };

        assert!(error.to_string().contains("timed out after 10 seconds"));
        assert!(error.to_string().ends_with("docker run ubuntu sleep 100"));
        assert!(error.is_timeout());
        assert_eq!(error.exit_code(), None);
    }
}
