use std::ffi::OsString;
use std::time::Duration;

use crate::engine::quote;
use crate::errors::Result;

/// Environment variable that makes every engine command run through `sudo`
pub const SUDO_ENV: &str = "THROWAWAY_SUDO";

/// Environment variable overriding the engine program, e.g. `podman`
pub const ENGINE_ENV: &str = "THROWAWAY_ENGINE";

pub const DEFAULT_ENGINE: &str = "docker";

/// Prefix of every generated image and container name
pub const NAME_PREFIX: &str = "throwaway";

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 600;

/// Deadline for `rmi`, independent of the caller's timeouts
pub const IMAGE_REMOVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// How the container engine is invoked; resolved once per call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub program: String,
    pub sudo: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_ENGINE.to_string(),
            sudo: false,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Resolve the configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let program = lookup(ENGINE_ENV)
            .map(|value| value.to_string_lossy().trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ENGINE.to_string());

        // Any value counts, even an empty one
        let sudo = lookup(SUDO_ENV).is_some();

        Self { program, sudo }
    }

    /// The words that start every engine command
    pub fn prefix(&self) -> Vec<String> {
        let mut words = Vec::with_capacity(2);
        if self.sudo {
            words.push("sudo".to_string());
        }
        words.push(self.program.clone());
        words
    }

    /// Quote the engine prefix followed by `args` into one shell command line
    pub fn command_line<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut words = self.prefix();
        words.extend(args.into_iter().map(|arg| arg.as_ref().to_string()));
        quote::join(&words)
    }
}
