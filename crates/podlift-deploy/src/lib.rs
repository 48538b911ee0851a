pub mod builder;
pub mod credentials;
pub mod docker;
pub mod error;
pub mod events;
pub mod host;
pub mod instructions;
pub mod platform;
pub mod probe;
pub mod prompt;
pub mod provision;
pub mod publish;
pub mod retry;
pub mod runtime;

mod pipeline;

pub use builder::ImageBuilder;
pub use credentials::{CredentialBroker, ExplicitCredentials, Session};
pub use docker::DockerCli;
pub use error::PipelineError;
pub use events::{Event, EventSink, RecordingSink, Reporter, Severity, Stage, TracingSink};
pub use host::HostPlatform;
pub use instructions::{ChecklistPresenter, InstructionPresenter, InstructionText};
pub use pipeline::{Pipeline, PipelineDeps, PipelineOptions, PipelineReport, ProvisionOutcome};
pub use platform::{PlatformApi, PlatformConnector, PlatformError, RunpodClient, RunpodConnector};
pub use probe::RuntimeProbe;
pub use prompt::{ConfirmationProvider, CredentialProvider, HeadlessPrompt, InteractivePrompt};
pub use provision::EndpointProvisioner;
pub use publish::ImagePublisher;
pub use retry::{PollPolicy, Sleeper, TokioSleeper};
pub use runtime::{BuildRequest, CommandOutput, ContainerRuntime};
