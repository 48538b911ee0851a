use podlift_common::{AuthError, BuildError, ConfigError, EnvironmentError, PublishError};
use thiserror::Error;

use crate::events::Stage;

/// A fatal pipeline failure. Provisioning problems are never fatal and do
/// not appear here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("cancelled during {0}")]
    Cancelled(Stage),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Config(_) => Stage::Credentials,
            Self::Environment(_) => Stage::Runtime,
            Self::Auth(_) => Stage::Credentials,
            Self::Build(_) => Stage::Build,
            Self::Publish(_) => Stage::Publish,
            Self::Cancelled(stage) => *stage,
        }
    }

    pub fn remediation(&self) -> &'static str {
        match self {
            Self::Config(ConfigError::Missing { .. }) => {
                "Pass the registry username as an argument or set DOCKERHUB_USERNAME."
            }
            Self::Config(_) => "Check the deployment settings and their environment variables.",
            Self::Environment(EnvironmentError::InstallDeclined) => {
                "Install Docker (https://docs.docker.com/get-docker/) and re-run."
            }
            Self::Environment(_) => "Start Docker manually, wait until `docker info` succeeds, then re-run.",
            Self::Auth(_) => {
                "Check the username and re-authenticate with a valid access token (DOCKERHUB_TOKEN)."
            }
            Self::Build(_) => "Check the Dockerfile, the build context and free disk space, then re-run.",
            Self::Publish(_) => {
                "Check network connectivity and that the account may push to this repository, then re-run."
            }
            Self::Cancelled(_) => "Re-run the deployment; every step is safe to repeat.",
        }
    }

    /// Ctrl-C at a blocking prompt arrives as a stage error, not through the
    /// cancellation token.
    pub(crate) fn interrupted_at(self, stage: Stage) -> Self {
        match self {
            Self::Config(ConfigError::Interrupted)
            | Self::Environment(EnvironmentError::Interrupted) => Self::Cancelled(stage),
            other => other,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Cancelled(_) => 130,
            _ => 1,
        }
    }
}
