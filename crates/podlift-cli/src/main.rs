mod args;
mod config;
mod output;

use std::io::IsTerminal;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use podlift_common::telemetry::{init_tracing, LogFormat, TelemetryConfig};
use podlift_common::{BuildArtifact, ProcessEnv};
use podlift_deploy::credentials::resolve_credentials;
use podlift_deploy::retry::{RUNTIME_INSTALL_ATTEMPTS, RUNTIME_START_ATTEMPTS};
use podlift_deploy::{
    ChecklistPresenter, ConfirmationProvider, CredentialProvider, DockerCli, ExplicitCredentials,
    HeadlessPrompt, HostPlatform, InstructionPresenter, InteractivePrompt, Pipeline, PipelineDeps,
    PipelineOptions, PollPolicy, RunpodConnector, TokioSleeper,
};

use crate::args::{Args, Command, DeployArgs, LogFormatArg, TargetArgs};
use crate::config::{build_platform, build_settings};
use crate::output::ConsoleSink;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let otlp_endpoint = args.otlp_endpoint.as_deref().filter(|v| !v.trim().is_empty());
    let provider = init_tracing(TelemetryConfig {
        service_name: "podlift",
        default_filter: "warn",
        format: match args.log_format {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        },
        otlp_endpoint,
        otlp_token: args.otlp_token.as_deref(),
    });

    let code = match args.command {
        Command::Deploy(deploy_args) => deploy(deploy_args).await,
        Command::Instructions(target) => instructions(&target),
    }
    .unwrap_or_else(|e| {
        eprintln!("✗ {e:#}");
        ExitCode::FAILURE
    });

    if let Some(provider) = provider {
        if let Err(e) = provider.shutdown() {
            eprintln!("failed to flush traces: {e}");
        }
    }
    code
}

async fn deploy(args: DeployArgs) -> Result<ExitCode> {
    let env = ProcessEnv;
    let settings = build_settings(&args.target, Some(&args));
    let platform = build_platform(&args);

    let runtime = DockerCli::new(&args.docker);
    let connector = RunpodConnector::from_settings(&platform);
    let presenter = ChecklistPresenter::new(&platform.console_url);
    let sink = ConsoleSink::default();

    let interactive = !args.non_interactive && std::io::stdin().is_terminal();
    let terminal = InteractivePrompt {
        assume_yes: args.yes,
    };
    let headless = HeadlessPrompt {
        assume_yes: args.yes,
    };
    let (credentials, confirm): (&dyn CredentialProvider, &dyn ConfirmationProvider) =
        if interactive {
            (&terminal, &terminal)
        } else {
            (&headless, &headless)
        };

    let interval = Duration::from_secs(args.poll_interval_secs);
    let options = PipelineOptions {
        explicit: ExplicitCredentials {
            username: args.target.username.clone(),
            secret: None,
        },
        settings,
        api_key: platform.api_key.clone(),
        host: HostPlatform::detect(),
        runtime_start: PollPolicy::new(interval, RUNTIME_START_ATTEMPTS),
        runtime_install: PollPolicy::new(interval, RUNTIME_INSTALL_ATTEMPTS),
        endpoint_ready: PollPolicy::new(interval, args.poll_attempts),
        skip_provision: args.skip_provision,
    };
    let deps = PipelineDeps {
        runtime: &runtime,
        connector: &connector,
        presenter: &presenter,
        credentials,
        confirm,
        env: &env,
        sleeper: &TokioSleeper,
        events: &sink,
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, stopping");
            on_signal.cancel();
        }
    });

    match Pipeline::new(deps, options).run(&cancel).await {
        Ok(report) => {
            output::print_report(&report);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::error!(stage = %err.stage(), error = %err, "deployment failed");
            output::print_failure(&err);
            Ok(ExitCode::from(err.exit_code()))
        }
    }
}

fn instructions(target: &TargetArgs) -> Result<ExitCode> {
    let env = ProcessEnv;
    let explicit = ExplicitCredentials {
        username: target.username.clone(),
        secret: None,
    };
    let credentials = resolve_credentials(&explicit, &env, &HeadlessPrompt::default())
        .context("pass the Docker Hub username or set DOCKERHUB_USERNAME")?;
    let config = build_settings(target, None)
        .resolve(&credentials.username)
        .context("invalid deployment settings")?;

    let artifact = BuildArtifact::built(config.image.clone());
    output::print_instructions(&ChecklistPresenter::default().render(&artifact, &config));
    Ok(ExitCode::SUCCESS)
}
