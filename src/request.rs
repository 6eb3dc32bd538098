//! What the caller asks for: where the image comes from and how to run it
//!
//! A [`RunRequest`] mirrors the loosely typed options a test author writes
//! down (possibly in a JSON file). [`RunRequest::validate`] turns it into a
//! strict [`ImageSource`] and rejects anything that could not be executed,
//! before a single engine command is issued.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_BUILD_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS};
use crate::engine::quote;
use crate::errors::{Result, ThrowawayError};

/// Dockerfile content: one string, or lines joined with newlines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dockerfile {
    Text(String),
    Lines(Vec<String>),
}

impl Dockerfile {
    pub fn render(&self) -> String {
        match self {
            Dockerfile::Text(text) => text.clone(),
            Dockerfile::Lines(lines) => lines.join("\n"),
        }
    }
}

impl From<&str> for Dockerfile {
    fn from(text: &str) -> Self {
        Dockerfile::Text(text.to_string())
    }
}

impl From<String> for Dockerfile {
    fn from(text: String) -> Self {
        Dockerfile::Text(text)
    }
}

impl From<Vec<String>> for Dockerfile {
    fn from(lines: Vec<String>) -> Self {
        Dockerfile::Lines(lines)
    }
}

impl<const N: usize> From<[&str; N]> for Dockerfile {
    fn from(lines: [&str; N]) -> Self {
        Dockerfile::Lines(lines.iter().map(|l| l.to_string()).collect())
    }
}

/// Shell words: a single line split like a shell would, or an explicit list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Words {
    Line(String),
    List(Vec<String>),
}

impl Default for Words {
    fn default() -> Self {
        Words::List(Vec::new())
    }
}

impl Words {
    pub fn to_argv(&self) -> Result<Vec<String>> {
        match self {
            Words::Line(line) => shlex::split(line).ok_or_else(|| {
                ThrowawayError::config(format!("Unbalanced quoting in {:?}", line))
            }),
            Words::List(words) => Ok(words.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Words::Line(line) => line.trim().is_empty(),
            Words::List(words) => words.is_empty(),
        }
    }
}

impl From<&str> for Words {
    fn from(line: &str) -> Self {
        Words::Line(line.to_string())
    }
}

impl From<String> for Words {
    fn from(line: String) -> Self {
        Words::Line(line)
    }
}

impl From<Vec<String>> for Words {
    fn from(words: Vec<String>) -> Self {
        Words::List(words)
    }
}

impl<const N: usize> From<[&str; N]> for Words {
    fn from(words: [&str; N]) -> Self {
        Words::List(words.iter().map(|w| w.to_string()).collect())
    }
}

/// The one place an image comes from, after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Dockerfile text built in a temporary context directory
    Dockerfile(String),
    /// Directory holding a Dockerfile and whatever it copies
    Home(PathBuf),
    /// Existing image, used as is and never removed
    Image(String),
}

impl ImageSource {
    pub fn needs_build(&self) -> bool {
        !matches!(self, ImageSource::Image(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunRequest {
    pub dockerfile: Option<Dockerfile>,
    pub home: Option<PathBuf>,
    pub image: Option<String>,
    /// Extra arguments for the engine's `run` command
    pub args: Words,
    pub env: BTreeMap<String, String>,
    /// Host path to container path
    pub volumes: BTreeMap<PathBuf, String>,
    /// Host port to container port
    pub ports: BTreeMap<u16, u16>,
    pub build_args: BTreeMap<String, String>,
    /// Keep the container's default user instead of the caller's uid:gid
    pub root: bool,
    pub command: Words,
    pub timeout_secs: u64,
    pub build_timeout_secs: u64,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            dockerfile: None,
            home: None,
            image: None,
            args: Words::default(),
            env: BTreeMap::new(),
            volumes: BTreeMap::new(),
            ports: BTreeMap::new(),
            build_args: BTreeMap::new(),
            root: false,
            command: Words::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            build_timeout_secs: DEFAULT_BUILD_TIMEOUT_SECS,
        }
    }
}

impl RunRequest {
    pub fn from_dockerfile(dockerfile: impl Into<Dockerfile>) -> Self {
        Self {
            dockerfile: Some(dockerfile.into()),
            ..Default::default()
        }
    }

    pub fn from_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: Some(home.into()),
            ..Default::default()
        }
    }

    pub fn from_image(image: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            ..Default::default()
        }
    }

    pub fn with_args(mut self, args: impl Into<Words>) -> Self {
        self.args = args.into();
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn with_volume(mut self, host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        self.volumes.insert(host.into(), container.into());
        self
    }

    pub fn with_port(mut self, host: u16, container: u16) -> Self {
        self.ports.insert(host, container);
        self
    }

    pub fn with_build_arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.build_args.insert(name.into(), value.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<Words>) -> Self {
        self.command = command.into();
        self
    }

    pub fn as_root(mut self) -> Self {
        self.root = true;
        self
    }

    /// Deadline for the run command, rounded down to whole seconds
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_build_timeout(mut self, timeout: Duration) -> Self {
        self.build_timeout_secs = timeout.as_secs();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ThrowawayError::config(format!("Malformed request: {}", e)))
    }

    /// Check everything that can be checked without touching the engine
    pub fn validate(&self) -> Result<ImageSource> {
        let source = match (&self.dockerfile, &self.home, &self.image) {
            (Some(dockerfile), None, None) => ImageSource::Dockerfile(dockerfile.render()),
            (None, Some(home), None) => ImageSource::Home(home.clone()),
            (None, None, Some(image)) => ImageSource::Image(image.clone()),
            (None, None, None) => {
                return Err(ThrowawayError::config(
                    "Either \"dockerfile\", or \"home\", or \"image\" must be provided",
                ))
            }
            _ => {
                let given: Vec<&str> = [
                    ("dockerfile", self.dockerfile.is_some()),
                    ("home", self.home.is_some()),
                    ("image", self.image.is_some()),
                ]
                .iter()
                .filter(|(_, set)| *set)
                .map(|(name, _)| *name)
                .collect();
                return Err(ThrowawayError::config(format!(
                    "Only one of \"dockerfile\", \"home\", \"image\" may be provided, got {}",
                    given.join(" and ")
                )));
            }
        };

        match &source {
            ImageSource::Dockerfile(text) if text.trim().is_empty() => {
                return Err(ThrowawayError::config("Dockerfile is empty"));
            }
            ImageSource::Image(image) if image.trim().is_empty() => {
                return Err(ThrowawayError::config("Image name is empty"));
            }
            ImageSource::Home(home) if home.as_os_str().is_empty() => {
                return Err(ThrowawayError::config("Home directory is empty"));
            }
            _ => {}
        }

        if self.timeout_secs == 0 {
            return Err(ThrowawayError::config("Timeout must be at least one second"));
        }
        if self.build_timeout_secs == 0 {
            return Err(ThrowawayError::config(
                "Build timeout must be at least one second",
            ));
        }

        for name in self.env.keys().chain(self.build_args.keys()) {
            if name.is_empty() || name.contains('=') {
                return Err(ThrowawayError::config(format!(
                    "Invalid variable name {:?}",
                    name
                )));
            }
        }

        for (host, container) in &self.volumes {
            if host.as_os_str().is_empty() || container.is_empty() {
                return Err(ThrowawayError::config("Volume paths must not be empty"));
            }
        }

        // Everything that ends up on a command line must be quotable
        let mut words = self.args.to_argv()?;
        words.extend(self.command.to_argv()?);
        words.extend(self.env.iter().map(|(k, v)| format!("{}={}", k, v)));
        words.extend(self.build_args.iter().map(|(k, v)| format!("{}={}", k, v)));
        words.extend(self.volumes.iter().map(|(h, c)| format!("{}:{}", h.display(), c)));
        if let ImageSource::Image(image) = &source {
            words.push(image.clone());
        }
        quote::join(&words)?;

        Ok(source)
    }
}
