use std::fmt;

/// Operating system the pipeline runs on. Decides how the runtime is
/// installed and started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    MacOs,
    Linux,
    Windows,
    Other(&'static str),
}

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommand {
    pub program: &'static str,
    pub args: Vec<&'static str>,
}

impl HostCommand {
    fn new(program: &'static str, args: &[&'static str]) -> Self {
        Self {
            program,
            args: args.to_vec(),
        }
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl HostPlatform {
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &'static str) -> Self {
        match os {
            "macos" => Self::MacOs,
            "linux" => Self::Linux,
            "windows" => Self::Windows,
            other => Self::Other(other),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::MacOs => "macOS",
            Self::Linux => "Linux",
            Self::Windows => "Windows",
            Self::Other(os) => os,
        }
    }

    pub fn install_command(self) -> Option<HostCommand> {
        match self {
            Self::MacOs => Some(HostCommand::new("brew", &["install", "--cask", "docker"])),
            Self::Linux => Some(HostCommand::new(
                "sh",
                &["-c", "curl -fsSL https://get.docker.com | sh"],
            )),
            Self::Windows => Some(HostCommand::new(
                "winget",
                &[
                    "install",
                    "-e",
                    "--id",
                    "Docker.DockerDesktop",
                    "--accept-package-agreements",
                    "--accept-source-agreements",
                ],
            )),
            Self::Other(_) => None,
        }
    }

    pub fn start_command(self) -> Option<HostCommand> {
        match self {
            Self::MacOs => Some(HostCommand::new("open", &["-a", "Docker"])),
            Self::Linux => Some(HostCommand::new("systemctl", &["start", "docker"])),
            Self::Windows => Some(HostCommand::new(
                "cmd",
                &[
                    "/C",
                    "start",
                    "",
                    r"C:\Program Files\Docker\Docker\Docker Desktop.exe",
                ],
            )),
            Self::Other(_) => None,
        }
    }

    /// Where to send an operator when automatic installation is not possible.
    pub fn install_docs(self) -> &'static str {
        match self {
            Self::MacOs => "https://docs.docker.com/desktop/install/mac-install/",
            Self::Windows => "https://docs.docker.com/desktop/install/windows-install/",
            Self::Linux | Self::Other(_) => "https://docs.docker.com/engine/install/",
        }
    }
}
