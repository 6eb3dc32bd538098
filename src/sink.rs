//! Destinations for the leveled messages produced while a container runs
//!
//! Every engine command is echoed to the sink, followed by its output lines.
//! Callers pick where that goes: the `log` facade, nowhere, or memory.

use log::Level;
use std::sync::{Arc, Mutex};

/// Target used when forwarding to the `log` facade
pub const LOG_TARGET: &str = "throwaway";

pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

impl<T: LogSink + ?Sized> LogSink for &T {
    fn log(&self, level: Level, message: &str) {
        (**self).log(level, message)
    }
}

impl<T: LogSink + ?Sized> LogSink for Arc<T> {
    fn log(&self, level: Level, message: &str) {
        (**self).log(level, message)
    }
}

/// Forwards every message to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCrate;

impl LogSink for LogCrate {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: LOG_TARGET, level, "{}", message);
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _level: Level, _message: &str) {}
}

/// Keeps every message in memory, mostly for assertions in tests
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Level, String)> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Messages logged at exactly `level`
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.messages_at(level).iter().any(|m| m.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: Level, message: &str) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push((level, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_filters_by_level() {
        let sink = MemorySink::new();
        sink.log(Level::Debug, "+ docker logs throwaway-0a1b2c3d4e5f");
        sink.log(Level::Error, "boom");
        sink.log(Level::Error, "second boom");

        assert_eq!(sink.entries().len(), 3);
        assert_eq!(sink.messages_at(Level::Error), vec!["boom", "second boom"]);
        assert!(sink.contains(Level::Debug, "docker logs"));
        assert!(!sink.contains(Level::Warn, "boom"));
    }

    #[test]
    fn test_shared_sink_reaches_same_storage() {
        let sink = Arc::new(MemorySink::new());
        let shared: Arc<dyn LogSink> = sink.clone();
        shared.log(Level::Info, "hello");
        (&*sink).log(Level::Info, "again");

        assert_eq!(sink.messages_at(Level::Info), vec!["hello", "again"]);
    }

    #[test]
    fn test_null_sink_accepts_anything() {
        NullSink.log(Level::Error, "ignored");
        LogCrate.log(Level::Trace, "forwarded to the facade");
    }
}
