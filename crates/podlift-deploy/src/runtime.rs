use std::path::PathBuf;

use async_trait::async_trait;

use podlift_common::{CommandError, Secret};

use crate::host::HostPlatform;

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            ..Default::default()
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn from_output(output: &std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Text to show an operator when the command failed: stderr, falling back
    /// to stdout, falling back to the exit code.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Arguments for an image build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub reference: String,
    pub context: PathBuf,
    pub dockerfile: Option<PathBuf>,
    pub platform: Option<String>,
}

/// The local container engine. `DockerCli` is the production implementation.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Client version, or `None` when the runtime is not installed.
    async fn version(&self) -> Result<Option<String>, CommandError>;

    /// Whether the daemon answers.
    async fn daemon_running(&self) -> Result<bool, CommandError>;

    async fn install(&self, host: HostPlatform) -> Result<CommandOutput, CommandError>;

    async fn start(&self, host: HostPlatform) -> Result<CommandOutput, CommandError>;

    /// Log in to a registry (`None` is the runtime's default registry).
    ///
    /// With a secret the login is non-interactive and the secret goes through
    /// stdin. Without one the runtime's own prompt takes over the terminal.
    async fn login(
        &self,
        registry: Option<&str>,
        username: &str,
        secret: Option<&Secret>,
    ) -> Result<CommandOutput, CommandError>;

    async fn build(&self, request: &BuildRequest) -> Result<CommandOutput, CommandError>;

    async fn push(&self, reference: &str) -> Result<CommandOutput, CommandError>;
}
