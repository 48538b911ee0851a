use std::future::Future;

use podlift_common::{
    BuildArtifact, DeploymentConfig, DeploymentResult, DeploymentSettings, EnvSource,
    ProvisionError, RuntimeStatus, Secret,
};
use tokio_util::sync::CancellationToken;

use crate::builder::ImageBuilder;
use crate::credentials::{CredentialBroker, ExplicitCredentials};
use crate::error::PipelineError;
use crate::events::{EventSink, Reporter, Stage};
use crate::host::HostPlatform;
use crate::instructions::{InstructionPresenter, InstructionText};
use crate::platform::PlatformConnector;
use crate::probe::RuntimeProbe;
use crate::prompt::{ConfirmationProvider, CredentialProvider};
use crate::provision::EndpointProvisioner;
use crate::publish::ImagePublisher;
use crate::retry::{PollPolicy, Sleeper};
use crate::runtime::ContainerRuntime;

/// Collaborators the pipeline drives. All are borrowed so tests can keep
/// their fakes and inspect them afterwards.
#[derive(Clone, Copy)]
pub struct PipelineDeps<'a> {
    pub runtime: &'a dyn ContainerRuntime,
    pub connector: &'a dyn PlatformConnector,
    pub presenter: &'a dyn InstructionPresenter,
    pub credentials: &'a dyn CredentialProvider,
    pub confirm: &'a dyn ConfirmationProvider,
    pub env: &'a dyn EnvSource,
    pub sleeper: &'a dyn Sleeper,
    pub events: &'a dyn EventSink,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub explicit: ExplicitCredentials,
    pub settings: DeploymentSettings,
    pub api_key: Option<Secret>,
    pub host: HostPlatform,
    pub runtime_start: PollPolicy,
    pub runtime_install: PollPolicy,
    pub endpoint_ready: PollPolicy,
    /// Go straight to manual instructions after publishing.
    pub skip_provision: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            explicit: ExplicitCredentials::default(),
            settings: DeploymentSettings::default(),
            api_key: None,
            host: HostPlatform::detect(),
            runtime_start: PollPolicy::runtime_start(),
            runtime_install: PollPolicy::runtime_install(),
            endpoint_ready: PollPolicy::endpoint_ready(),
            skip_provision: false,
        }
    }
}

#[derive(Debug)]
pub enum ProvisionOutcome {
    Deployed(DeploymentResult),
    Manual {
        reason: ProvisionError,
        instructions: InstructionText,
    },
}

/// Everything a successful run produced.
#[derive(Debug)]
pub struct PipelineReport {
    pub runtime: RuntimeStatus,
    pub config: DeploymentConfig,
    pub artifact: BuildArtifact,
    pub outcome: ProvisionOutcome,
}

pub struct Pipeline<'a> {
    deps: PipelineDeps<'a>,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(deps: PipelineDeps<'a>, options: PipelineOptions) -> Self {
        Self { deps, options }
    }

    /// Run every stage in order. Fatal failures stop the run; provisioning
    /// failures fall back to manual instructions. Cancelling `cancel` drops
    /// the in-flight stage, including any poll loop it is in.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<PipelineReport, PipelineError> {
        let deps = self.deps;
        let opts = &self.options;

        let checker = RuntimeProbe::new(deps.runtime, deps.confirm, deps.sleeper, deps.events)
            .with_host(opts.host)
            .with_policies(opts.runtime_start, opts.runtime_install);
        let runtime = until_cancelled(cancel, Stage::Runtime, checker.ensure_running())
            .await?
            .map_err(|e| PipelineError::from(e).interrupted_at(Stage::Runtime))?;

        let broker = CredentialBroker::new(deps.runtime, deps.env, deps.credentials, deps.events)
            .with_explicit(opts.explicit.clone());
        let (config, session) = until_cancelled(cancel, Stage::Credentials, async {
            let credentials = broker.resolve()?;
            let config = opts.settings.resolve(&credentials.username)?;
            let session = broker
                .authenticate(credentials, config.image.registry())
                .await?;
            Ok::<_, PipelineError>((config, session))
        })
        .await?
        .map_err(|e| e.interrupted_at(Stage::Credentials))?;
        tracing::info!(image = %config.image, endpoint = %config.endpoint_name, "deployment resolved");

        let builder = ImageBuilder::new(deps.runtime, deps.events);
        let artifact = until_cancelled(cancel, Stage::Build, builder.build(&config)).await??;

        let publisher = ImagePublisher::new(deps.runtime, deps.events);
        until_cancelled(cancel, Stage::Publish, publisher.publish(&session, &artifact)).await??;

        let provisioned = if opts.skip_provision {
            Reporter::new(deps.events, Stage::Provision).info("Automatic provisioning disabled");
            Err(ProvisionError::Unavailable)
        } else {
            let provisioner = EndpointProvisioner::new(deps.connector, deps.sleeper, deps.events)
                .with_policy(opts.endpoint_ready);
            until_cancelled(
                cancel,
                Stage::Provision,
                provisioner.provision(&artifact, &config, opts.api_key.as_ref()),
            )
            .await?
        };

        let outcome = match provisioned {
            Ok(result) => ProvisionOutcome::Deployed(result),
            Err(reason) => {
                let report = Reporter::new(deps.events, Stage::Instructions);
                report.warn(format!("Automatic provisioning not completed: {reason}"));
                let instructions = deps.presenter.render(&artifact, &config);
                report.info("Create the endpoint manually with the settings below");
                ProvisionOutcome::Manual {
                    reason,
                    instructions,
                }
            }
        };

        tracing::info!(image = %artifact.reference(), "pipeline finished");
        Ok(PipelineReport {
            runtime,
            config,
            artifact,
            outcome,
        })
    }
}

async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    stage: Stage,
    fut: F,
) -> Result<F::Output, PipelineError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!(%stage, "pipeline cancelled");
            Err(PipelineError::Cancelled(stage))
        }
        out = fut => Ok(out),
    }
}
