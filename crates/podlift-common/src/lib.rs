pub mod config;
pub mod error;
pub mod image;
pub mod types;

pub use config::{
    BuildOptions, DeploymentConfig, DeploymentSettings, EnvSource, MapEnv, PlatformSettings,
    ProcessEnv,
};
pub use error::{
    AuthError, BuildError, CommandError, ConfigError, EnvironmentError, ProvisionError,
    PublishError,
};
pub use image::{ImageRef, DEFAULT_TAG};
pub use types::{
    ArtifactState, BuildArtifact, Credentials, DeploymentResult, DeploymentStatus, RuntimeStatus,
    Secret,
};

pub mod telemetry;
