use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use throwaway::{LogCrate, Mode, RunRequest, Words};

/// Build an image (or reuse one), run a container once, print what it
/// printed, and remove everything that was created
#[derive(Parser, Debug)]
#[command(name = "throwaway", version, about)]
struct Cli {
    /// File whose content is used as an inline Dockerfile
    #[arg(long, value_name = "FILE")]
    dockerfile: Option<PathBuf>,

    /// Directory with a Dockerfile and everything it needs
    #[arg(long, value_name = "DIR")]
    home: Option<PathBuf>,

    /// Existing image to run, e.g. ubuntu:24.04
    #[arg(long, value_name = "TAG")]
    image: Option<String>,

    /// JSON file with a full request; other flags are applied on top
    #[arg(long, value_name = "FILE")]
    request: Option<PathBuf>,

    /// Environment variable for the container
    #[arg(short, long = "env", value_name = "NAME=VALUE", value_parser = parse_pair)]
    env: Vec<(String, String)>,

    /// Volume mapping
    #[arg(short, long = "volume", value_name = "HOST:CONTAINER", value_parser = parse_volume)]
    volume: Vec<(PathBuf, String)>,

    /// Port mapping
    #[arg(short, long = "publish", value_name = "HOST:CONTAINER", value_parser = parse_port)]
    publish: Vec<(u16, u16)>,

    /// Build-time argument
    #[arg(long = "build-arg", value_name = "NAME=VALUE", value_parser = parse_pair)]
    build_arg: Vec<(String, String)>,

    /// Extra argument for the engine's run command (repeatable)
    #[arg(long = "arg", value_name = "WORD", allow_hyphen_values = true)]
    arg: Vec<String>,

    /// Keep the image's default user instead of the current uid:gid
    #[arg(long)]
    root: bool,

    /// Seconds the container may run
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Seconds the image build may take
    #[arg(long, value_name = "SECS")]
    build_timeout: Option<u64>,

    /// Command to run inside the container
    #[arg(trailing_var_arg = true, value_name = "COMMAND")]
    command: Vec<String>,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got {:?}", raw))
}

fn parse_volume(raw: &str) -> Result<(PathBuf, String), String> {
    raw.rsplit_once(':')
        .filter(|(host, container)| !host.is_empty() && !container.is_empty())
        .map(|(host, container)| (PathBuf::from(host), container.to_string()))
        .ok_or_else(|| format!("expected HOST:CONTAINER, got {:?}", raw))
}

fn parse_port(raw: &str) -> Result<(u16, u16), String> {
    let (host, container) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected HOST:CONTAINER, got {:?}", raw))?;
    let host = host.parse().map_err(|e| format!("bad host port {:?}: {}", host, e))?;
    let container = container
        .parse()
        .map_err(|e| format!("bad container port {:?}: {}", container, e))?;
    Ok((host, container))
}

impl Cli {
    fn into_request(self) -> anyhow::Result<RunRequest> {
        let mut request = match &self.request {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                RunRequest::from_json(&json)?
            }
            None => RunRequest::default(),
        };

        if let Some(path) = &self.dockerfile {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            request.dockerfile = Some(text.into());
        }
        if let Some(home) = self.home {
            request.home = Some(home);
        }
        if let Some(image) = self.image {
            request.image = Some(image);
        }
        request.env.extend(self.env);
        request.volumes.extend(self.volume);
        request.ports.extend(self.publish);
        request.build_args.extend(self.build_arg);
        if !self.arg.is_empty() {
            request.args = Words::List(self.arg);
        }
        if self.root {
            request.root = true;
        }
        if let Some(secs) = self.timeout {
            request = request.with_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.build_timeout {
            request = request.with_build_timeout(Duration::from_secs(secs));
        }
        if !self.command.is_empty() {
            request.command = Words::List(self.command);
        }

        if request.dockerfile.is_none() && request.home.is_none() && request.image.is_none() {
            bail!("one of --dockerfile, --home, --image or --request is required");
        }
        Ok(request)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let request = Cli::parse().into_request()?;
    log::debug!("Running request: {:?}", request);

    let output = throwaway::run(&request, Mode::Foreground, &LogCrate)
        .await
        .context("Container run failed")?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_helpers() {
        assert_eq!(
            parse_pair("A=b=c").unwrap(),
            ("A".to_string(), "b=c".to_string())
        );
        assert!(parse_pair("novalue").is_err());

        assert_eq!(
            parse_volume("/tmp/x:/data").unwrap(),
            (PathBuf::from("/tmp/x"), "/data".to_string())
        );
        assert!(parse_volume("/tmp/x").is_err());

        assert_eq!(parse_port("8080:80").unwrap(), (8080, 80));
        assert!(parse_port("80").is_err());
        assert!(parse_port("x:80").is_err());
    }

    #[test]
    fn test_flags_become_request() {
        let cli = Cli::parse_from([
            "throwaway",
            "--image",
            "ubuntu:24.04",
            "-e",
            "MODE=test",
            "-p",
            "8080:80",
            "--root",
            "--timeout",
            "30",
            "echo",
            "hello",
        ]);
        let request = cli.into_request().unwrap();

        assert_eq!(request.image.as_deref(), Some("ubuntu:24.04"));
        assert_eq!(request.env.get("MODE").map(String::as_str), Some("test"));
        assert_eq!(request.ports.get(&8080), Some(&80));
        assert!(request.root);
        assert_eq!(request.timeout_secs, 30);
        assert_eq!(
            request.command,
            Words::List(vec!["echo".to_string(), "hello".to_string()])
        );
    }

    #[test]
    fn test_source_is_required() {
        let cli = Cli::parse_from(["throwaway", "echo"]);
        assert!(cli.into_request().is_err());
    }
}
