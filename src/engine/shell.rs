use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::Level;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use super::{CommandOutput, Engine};
use crate::errors::{Result, ThrowawayError};
use crate::sink::LogSink;

/// Runs engine command lines through a POSIX shell with stderr folded into stdout
#[derive(Debug, Clone)]
pub struct ShellEngine {
    shell: String,
}

impl Default for ShellEngine {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl ShellEngine {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

/// Time between SIGTERM and SIGKILL for a command that was cut off
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Process group of a running engine command.
///
/// Dropping it before [`ProcessGroup::finished`] signals every process in the
/// group, not just the wrapping shell. SIGTERM goes first because `sudo`
/// relays it to the command it started, while SIGKILL would stop `sudo` alone.
struct ProcessGroup {
    #[cfg_attr(not(unix), allow(dead_code))]
    pgid: Option<i32>,
}

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self {
            pgid: child.id().and_then(|id| i32::try_from(id).ok()),
        }
    }

    fn finished(mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    #[cfg(unix)]
    fn drop(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        log::debug!("Terminating process group {}", pgid);
        // SAFETY: killpg only sends a signal, the group was created for this command
        unsafe {
            libc::killpg(pgid, libc::SIGTERM);
        }
        std::thread::spawn(move || {
            std::thread::sleep(KILL_GRACE);
            // SAFETY: as above
            unsafe {
                libc::killpg(pgid, libc::SIGKILL);
            }
        });
    }

    #[cfg(not(unix))]
    fn drop(&mut self) {}
}

#[async_trait]
impl Engine for ShellEngine {
    async fn execute(
        &self,
        command: &str,
        level: Level,
        sink: &dyn LogSink,
    ) -> Result<CommandOutput> {
        sink.log(Level::Debug, &format!("+ {}", command));

        let mut shell = Command::new(&self.shell);
        shell
            .arg("-c")
            .arg(format!("exec 2>&1\n{}", command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        shell.process_group(0);

        let mut child = shell.spawn().map_err(|source| ThrowawayError::Spawn {
            command: command.to_string(),
            source,
        })?;
        // Declared after `child` so the group is signalled before the shell is killed
        let group = ProcessGroup::of(&child);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout of the shell was not captured"))?;

        // Read raw lines so the captured bytes stay exactly as printed
        let mut reader = BufReader::new(stdout);
        let mut captured = Vec::new();
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            let text = String::from_utf8_lossy(&line);
            sink.log(level, text.trim_end_matches(['\n', '\r']));
            captured.extend_from_slice(&line);
        }

        let status = child.wait().await?;
        group.finished();
        let code = status.code().unwrap_or(-1);
        log::debug!("Command finished with exit code {}: {}", code, command);

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&captured).into_owned(),
            code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use rstest::rstest;

    #[tokio::test]
    async fn test_output_is_byte_exact() {
        let sink = MemorySink::new();
        let output = ShellEngine::default()
            .execute("printf 'hello\\n\\nworld'", Level::Debug, &sink)
            .await
            .expect("sh should run");

        assert_eq!(output.stdout, "hello\n\nworld");
        assert_eq!(output.code, 0);
        assert!(sink.contains(Level::Debug, "+ printf"));
        assert!(sink.contains(Level::Debug, "world"));
    }

    #[tokio::test]
    async fn test_stderr_is_merged_and_exit_code_kept() {
        let sink = MemorySink::new();
        let output = ShellEngine::default()
            .execute("echo out; echo err >&2; exit 3", Level::Error, &sink)
            .await
            .expect("sh should run");

        assert_eq!(output.stdout, "out\nerr\n");
        assert_eq!(output.code, 3);
        assert_eq!(sink.messages_at(Level::Error), vec!["out", "err"]);
    }

    /// Live processes whose command line mentions `marker`
    #[cfg(target_os = "linux")]
    fn processes_mentioning(marker: &str) -> Vec<u32> {
        let Ok(entries) = std::fs::read_dir("/proc") else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|entry| {
                let pid: u32 = entry.file_name().to_str()?.parse().ok()?;
                let cmdline = std::fs::read(entry.path().join("cmdline")).ok()?;
                String::from_utf8_lossy(&cmdline)
                    .contains(marker)
                    .then_some(pid)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_dropping_the_future_stops_waiting() {
        let engine = ShellEngine::default();
        let sink = MemorySink::new();
        let result = tokio::time::timeout(
            Duration::from_millis(200),
            engine.execute("sleep 30", Level::Debug, &sink),
        )
        .await;

        assert!(result.is_err(), "sleep should have been cut off");
    }

    #[cfg(target_os = "linux")]
    #[rstest]
    #[case::direct("sleep {marker}")]
    #[case::behind_a_wrapper("sh -c 'sleep {marker}; true'")]
    #[case::ignoring_sigterm("sh -c 'trap \"\" TERM; sleep {marker}; true'")]
    #[tokio::test]
    async fn test_cut_off_command_does_not_survive(#[case] template: &str) {
        let marker = format!("31.{:06}", rand::random::<u32>() % 1_000_000);
        let command = template.replace("{marker}", &marker);
        let engine = ShellEngine::default();
        let sink = MemorySink::new();

        let result = tokio::time::timeout(
            Duration::from_millis(500),
            engine.execute(&command, Level::Debug, &sink),
        )
        .await;
        assert!(result.is_err(), "{} should have been cut off", command);

        let deadline = tokio::time::Instant::now() + KILL_GRACE + Duration::from_secs(3);
        while tokio::time::Instant::now() < deadline {
            if processes_mentioning(&marker).is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!(
            "{} survived being cut off: {:?}",
            command,
            processes_mentioning(&marker)
        );
    }

    #[tokio::test]
    async fn test_missing_shell_is_a_spawn_error() {
        let sink = MemorySink::new();
        let error = ShellEngine::new("/definitely/not/a/shell")
            .execute("true", Level::Debug, &sink)
            .await
            .unwrap_err();

        assert!(matches!(error, ThrowawayError::Spawn { .. }));
    }
}
