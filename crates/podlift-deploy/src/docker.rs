use std::io::ErrorKind;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use podlift_common::{CommandError, Secret};

use crate::host::{HostCommand, HostPlatform};
use crate::runtime::{BuildRequest, CommandOutput, ContainerRuntime};

/// Drives the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> CommandError {
        CommandError::new(&self.program, e)
    }

    async fn run_captured(&self, args: &[String]) -> Result<CommandOutput, CommandError> {
        let output = self
            .command()
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        Ok(CommandOutput::from_output(&output))
    }
}

async fn run_host(cmd: &HostCommand, interactive: bool) -> Result<CommandOutput, CommandError> {
    tracing::info!(command = %cmd, "running host command");
    let mut command = Command::new(cmd.program);
    command.args(&cmd.args).kill_on_drop(true);

    if interactive {
        let status = command
            .status()
            .await
            .map_err(|e| CommandError::new(cmd.program, e))?;
        return Ok(CommandOutput {
            code: status.code(),
            ..Default::default()
        });
    }

    let output = command
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| CommandError::new(cmd.program, e))?;
    Ok(CommandOutput::from_output(&output))
}

fn unsupported(host: HostPlatform, action: &str) -> CommandOutput {
    CommandOutput::failed(
        1,
        format!(
            "no automatic {action} available on {}; see {}",
            host.name(),
            host.install_docs()
        ),
    )
}

pub(crate) fn login_args(registry: Option<&str>, username: &str, password_stdin: bool) -> Vec<String> {
    let mut args = vec!["login".to_string(), "-u".to_string(), username.to_string()];
    if password_stdin {
        args.push("--password-stdin".to_string());
    }
    if let Some(registry) = registry {
        args.push(registry.to_string());
    }
    args
}

pub(crate) fn build_args(request: &BuildRequest) -> Vec<String> {
    let mut args = vec![
        "build".to_string(),
        "-t".to_string(),
        request.reference.clone(),
    ];
    if let Some(file) = &request.dockerfile {
        args.push("-f".to_string());
        args.push(file.display().to_string());
    }
    if let Some(platform) = &request.platform {
        args.push("--platform".to_string());
        args.push(platform.clone());
    }
    args.push(request.context.display().to_string());
    args
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn version(&self) -> Result<Option<String>, CommandError> {
        let output = match self
            .command()
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(o) => o,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.spawn_error(e)),
        };
        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
        } else {
            Ok(Some("unknown version".to_string()))
        }
    }

    async fn daemon_running(&self) -> Result<bool, CommandError> {
        let status = self
            .command()
            .arg("info")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match status {
            Ok(s) => Ok(s.success()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.spawn_error(e)),
        }
    }

    async fn install(&self, host: HostPlatform) -> Result<CommandOutput, CommandError> {
        match host.install_command() {
            // Installers may ask for a sudo password, so they get the terminal.
            Some(cmd) => run_host(&cmd, true).await,
            None => Ok(unsupported(host, "installation")),
        }
    }

    async fn start(&self, host: HostPlatform) -> Result<CommandOutput, CommandError> {
        match host.start_command() {
            Some(cmd) => run_host(&cmd, false).await,
            None => Ok(unsupported(host, "start")),
        }
    }

    async fn login(
        &self,
        registry: Option<&str>,
        username: &str,
        secret: Option<&Secret>,
    ) -> Result<CommandOutput, CommandError> {
        let Some(secret) = secret else {
            tracing::info!(%username, "delegating to interactive docker login");
            let status = self
                .command()
                .args(login_args(registry, username, false))
                .status()
                .await
                .map_err(|e| self.spawn_error(e))?;
            return Ok(CommandOutput {
                code: status.code(),
                ..Default::default()
            });
        };

        tracing::info!(%username, "logging in with --password-stdin");
        let mut child = self
            .command()
            .args(login_args(registry, username, true))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(secret.expose().as_bytes())
                .await
                .map_err(|e| self.spawn_error(e))?;
            // Dropping stdin closes the pipe so docker sees EOF.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        Ok(CommandOutput::from_output(&output))
    }

    async fn build(&self, request: &BuildRequest) -> Result<CommandOutput, CommandError> {
        tracing::info!(image = %request.reference, context = %request.context.display(), "docker build");
        self.run_captured(&build_args(request)).await
    }

    async fn push(&self, reference: &str) -> Result<CommandOutput, CommandError> {
        tracing::info!(image = %reference, "docker push");
        self.run_captured(&["push".to_string(), reference.to_string()])
            .await
    }
}
