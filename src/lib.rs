pub mod config;
pub mod container;
pub mod engine;
pub mod errors;
pub mod request;
pub mod sink;

pub use config::EngineConfig;
pub use container::{host_gateway, run, run_with, Host, Mode, RunningContainer};
pub use engine::{CommandOutput, Engine, ShellEngine};
pub use errors::{Result, ThrowawayError};
pub use request::{Dockerfile, ImageSource, RunRequest, Words};
pub use sink::{LogCrate, LogSink, MemorySink, NullSink};
