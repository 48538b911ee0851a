use thiserror::Error;

/// A child process could not be spawned or driven to completion.
#[derive(Debug, Error)]
#[error("failed to run `{program}`: {source}")]
pub struct CommandError {
    pub program: String,
    #[source]
    pub source: std::io::Error,
}

impl CommandError {
    pub fn new(program: impl Into<String>, source: std::io::Error) -> Self {
        Self {
            program: program.into(),
            source,
        }
    }
}

/// Required configuration is missing or malformed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required value: {field}")]
    Missing { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("interrupted while waiting for input")]
    Interrupted,
}

/// The local container runtime cannot be installed or started.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("container runtime is not installed and installation was declined")]
    InstallDeclined,

    #[error("container runtime installation failed:\n{output}")]
    InstallFailed { output: String },

    #[error("container runtime unavailable after {attempts} status checks")]
    Unavailable { attempts: u32 },

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("interrupted while waiting for input")]
    Interrupted,

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// The registry rejected the login.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("registry login rejected for '{username}':\n{output}")]
    Rejected { username: String, output: String },

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// The image build process exited unsuccessfully.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("image build failed for {reference}:\n{output}")]
    Failed { reference: String, output: String },

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// The image could not be pushed to the registry.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("refusing to push {reference}: artifact was not built successfully")]
    NotBuilt { reference: String },

    #[error("refusing to push {reference}: logged into {session} instead")]
    WrongRegistry { reference: String, session: String },

    #[error("image push failed for {reference}:\n{output}")]
    Failed { reference: String, output: String },

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Remote provisioning was skipped or did not succeed. Never fatal.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("automatic provisioning not attempted")]
    Unavailable,

    #[error("endpoint provisioning failed: {reason}")]
    Failed { reason: String },
}

impl ProvisionError {
    pub fn failed(reason: impl ToString) -> Self {
        Self::Failed {
            reason: reason.to_string(),
        }
    }
}
