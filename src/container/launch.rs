use crate::errors::Result;
use crate::request::RunRequest;

/// Address of the host as seen from a container on a Linux bridge network
pub const LINUX_GATEWAY: &str = "172.17.0.1";

/// Name the engine maps to the host on macOS and Windows
pub const DESKTOP_GATEWAY: &str = "host.docker.internal";

/// The name a container uses to reach services on this machine
pub fn host_gateway() -> &'static str {
    gateway_for(cfg!(target_os = "linux"))
}

fn gateway_for(linux: bool) -> &'static str {
    if linux {
        LINUX_GATEWAY
    } else {
        DESKTOP_GATEWAY
    }
}

/// Facts about the machine that shape the run command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub linux: bool,
    /// `uid:gid` of this process, when the platform has them
    pub user: Option<(u32, u32)>,
}

impl Host {
    pub fn current() -> Self {
        Self {
            linux: cfg!(target_os = "linux"),
            user: current_user(),
        }
    }

    pub fn gateway(&self) -> &'static str {
        gateway_for(self.linux)
    }
}

#[cfg(unix)]
fn current_user() -> Option<(u32, u32)> {
    // SAFETY: getuid and getgid have no preconditions and cannot fail
    let ids = unsafe { (libc::getuid(), libc::getgid()) };
    Some(ids)
}

#[cfg(not(unix))]
fn current_user() -> Option<(u32, u32)> {
    None
}

/// Arguments of the engine's `run` command, without the engine prefix
pub fn run_arguments(
    host: &Host,
    request: &RunRequest,
    image: &str,
    container: &str,
    detach: bool,
) -> Result<Vec<String>> {
    let mut args = vec!["run".to_string()];
    if detach {
        args.push("--detach".to_string());
    }
    args.push("--name".to_string());
    args.push(container.to_string());
    if !host.linux {
        args.push("--add-host".to_string());
        args.push(format!("{}:host-gateway", host.gateway()));
    }
    args.extend(request.args.to_argv()?);
    for (name, value) in &request.env {
        args.push("--env".to_string());
        args.push(format!("{}={}", name, value));
    }
    for (host_port, container_port) in &request.ports {
        args.push("--publish".to_string());
        args.push(format!("{}:{}", host_port, container_port));
    }
    for (host_path, container_path) in &request.volumes {
        args.push("--volume".to_string());
        args.push(format!("{}:{}", host_path.display(), container_path));
    }
    if !request.root {
        if let Some((uid, gid)) = host.user {
            args.push("--user".to_string());
            args.push(format!("{}:{}", uid, gid));
        }
    }
    args.push(image.to_string());
    args.extend(request.command.to_argv()?);
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux() -> Host {
        Host {
            linux: true,
            user: Some((1000, 1000)),
        }
    }

    #[test]
    fn test_minimal_foreground_command() {
        let request = RunRequest::from_image("ubuntu");
        let args = run_arguments(&linux(), &request, "ubuntu", "throwaway-1", false).unwrap();

        assert_eq!(
            args,
            vec!["run", "--name", "throwaway-1", "--user", "1000:1000", "ubuntu"]
        );
    }

    #[test]
    fn test_full_command_keeps_flag_order() {
        let request = RunRequest::from_image("ubuntu")
            .with_args("--memory 1g")
            .with_env("B", "2")
            .with_env("A", "1 2")
            .with_port(8080, 80)
            .with_volume("/tmp/data", "/data")
            .with_command("sh -c 'echo $A'");
        let host = Host {
            linux: false,
            user: Some((501, 20)),
        };
        let args = run_arguments(&host, &request, "ubuntu", "throwaway-2", true).unwrap();

        assert_eq!(
            args,
            vec![
                "run",
                "--detach",
                "--name",
                "throwaway-2",
                "--add-host",
                "host.docker.internal:host-gateway",
                "--memory",
                "1g",
                "--env",
                "A=1 2",
                "--env",
                "B=2",
                "--publish",
                "8080:80",
                "--volume",
                "/tmp/data:/data",
                "--user",
                "501:20",
                "ubuntu",
                "sh",
                "-c",
                "echo $A",
            ]
        );
    }

    #[test]
    fn test_root_skips_user_flag() {
        let request = RunRequest::from_image("ubuntu").as_root();
        let args = run_arguments(&linux(), &request, "ubuntu", "c", false).unwrap();
        assert!(!args.contains(&"--user".to_string()));

        let host = Host {
            linux: true,
            user: None,
        };
        let request = RunRequest::from_image("ubuntu");
        let args = run_arguments(&host, &request, "ubuntu", "c", false).unwrap();
        assert!(!args.contains(&"--user".to_string()));
    }

    #[test]
    fn test_gateway_depends_on_platform() {
        assert_eq!(gateway_for(true), "172.17.0.1");
        assert_eq!(gateway_for(false), "host.docker.internal");
        assert_eq!(host_gateway(), Host::current().gateway());
    }
}
