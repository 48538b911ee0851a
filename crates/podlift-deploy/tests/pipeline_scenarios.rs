mod common;

use std::time::Duration;

use async_trait::async_trait;
use common::{fast_options, FakeConnector, FakeRuntime, Harness};
use podlift_common::{
    ConfigError, DeploymentStatus, EnvironmentError, MapEnv, ProvisionError, Secret,
};
use podlift_deploy::prompt::PromptError;
use podlift_deploy::{
    CredentialProvider, Pipeline, PipelineDeps, PipelineError, PipelineOptions, ProvisionOutcome,
    Sleeper, Stage,
};
use tokio_util::sync::CancellationToken;

async fn run(h: &Harness, options: PipelineOptions) -> Result<podlift_deploy::PipelineReport, PipelineError> {
    Pipeline::new(h.deps(), options)
        .run(&CancellationToken::new())
        .await
}

#[tokio::test]
async fn test_without_api_key_falls_back_to_instructions() {
    let h = Harness::new(FakeRuntime::healthy());

    let report = run(&h, fast_options()).await.unwrap();

    assert_eq!(report.artifact.reference(), "alice/sesame-csm-1b-api:latest");
    let ProvisionOutcome::Manual {
        reason,
        instructions,
    } = report.outcome
    else {
        panic!("expected manual instructions");
    };
    assert!(matches!(reason, ProvisionError::Unavailable));
    let text = instructions.as_str();
    assert!(text.contains("sesame-csm-1b-tts"));
    assert!(text.contains("RTX 3090"));
    assert!(text.contains("25"));
    assert_eq!(h.presenter.renders(), 1);
    assert_eq!(h.connector.connects(), 0);
    assert_eq!(
        h.runtime.calls(),
        vec!["version", "daemon_running", "login", "build", "push"]
    );
}

#[tokio::test]
async fn test_declined_install_stops_before_build() {
    let mut runtime = FakeRuntime::healthy();
    runtime.installed = false;
    runtime.running = false;
    let h = Harness::new(runtime);

    let err = run(&h, fast_options()).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Environment(EnvironmentError::InstallDeclined)
    ));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(err.stage(), Stage::Runtime);
    assert_eq!(h.runtime.calls(), vec!["version"]);
    assert_eq!(h.presenter.renders(), 0);
}

#[tokio::test]
async fn test_push_failure_skips_provisioning() {
    let mut runtime = FakeRuntime::healthy();
    runtime.push_ok = false;
    let h = Harness::new(runtime);
    let mut options = fast_options();
    options.api_key = Some(Secret::new("rp_key"));

    let err = run(&h, options).await.unwrap_err();

    assert!(matches!(err, PipelineError::Publish(_)));
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("requested access to the resource is denied"));
    assert_eq!(h.connector.connects(), 0);
    assert_eq!(h.presenter.renders(), 0);
}

#[tokio::test]
async fn test_full_success_with_api_key() {
    let h = Harness::new(FakeRuntime::healthy());
    let mut options = fast_options();
    options.api_key = Some(Secret::new("rp_key"));

    let report = run(&h, options).await.unwrap();

    let ProvisionOutcome::Deployed(result) = report.outcome else {
        panic!("expected a deployed endpoint");
    };
    assert_eq!(result.status, DeploymentStatus::Ready);
    assert_eq!(result.endpoint_id, "ep-1");
    assert_eq!(result.endpoint_url, "https://api.runpod.ai/v2/ep-1");
    assert_eq!(h.connector.connects(), 1);
    assert_eq!(h.presenter.renders(), 0);
    assert_eq!(h.runtime.logins(), vec![None::<String>]);
    assert_eq!(h.runtime.pushed(), vec!["alice/sesame-csm-1b-api:latest"]);
}

#[tokio::test]
async fn test_registry_host_reaches_login_build_and_push() {
    let h = Harness::new(FakeRuntime::healthy());
    let mut options = fast_options();
    options.settings.registry = Some("ghcr.io".into());

    let report = run(&h, options).await.unwrap();

    assert_eq!(h.runtime.logins(), vec![Some("ghcr.io".to_string())]);
    assert_eq!(h.runtime.built(), vec!["ghcr.io/alice/sesame-csm-1b-api:latest"]);
    let pushed = h.runtime.pushed();
    assert_eq!(pushed.len(), 1);
    assert!(pushed[0].starts_with("ghcr.io/"), "pushed {}", pushed[0]);
    assert_eq!(report.artifact.reference(), pushed[0]);

    let ProvisionOutcome::Manual { instructions, .. } = report.outcome else {
        panic!("expected manual instructions");
    };
    assert!(instructions.as_str().contains("ghcr.io/alice/sesame-csm-1b-api:latest"));
}

#[tokio::test]
async fn test_rerun_updates_the_existing_endpoint() {
    let h = Harness::new(FakeRuntime::healthy());
    let with_key = || {
        let mut options = fast_options();
        options.api_key = Some(Secret::new("rp_key"));
        options
    };

    let first = run(&h, with_key()).await.unwrap();
    let second = run(&h, with_key()).await.unwrap();

    let (ProvisionOutcome::Deployed(a), ProvisionOutcome::Deployed(b)) =
        (first.outcome, second.outcome)
    else {
        panic!("expected both runs to deploy");
    };
    assert_eq!(a.endpoint_id, b.endpoint_id);
    assert_eq!(h.connector.calls.templates_created(), 1);
    assert_eq!(h.connector.calls.endpoints_created(), 1);
    assert_eq!(h.connector.calls.updates(), 2);
}

#[tokio::test]
async fn test_build_failure_short_circuits() {
    let mut runtime = FakeRuntime::healthy();
    runtime.build_ok = false;
    let h = Harness::new(runtime);
    let mut options = fast_options();
    options.api_key = Some(Secret::new("rp_key"));

    let err = run(&h, options).await.unwrap_err();

    assert!(matches!(err, PipelineError::Build(_)));
    assert_eq!(h.runtime.count("build"), 1);
    assert_eq!(h.runtime.count("push"), 0);
    assert_eq!(h.connector.connects(), 0);
    assert_eq!(h.presenter.renders(), 0);
}

#[tokio::test]
async fn test_rejected_login_is_fatal() {
    let mut runtime = FakeRuntime::healthy();
    runtime.login_ok = false;
    let h = Harness::new(runtime);

    let err = run(&h, fast_options()).await.unwrap_err();

    assert!(matches!(err, PipelineError::Auth(_)));
    assert_eq!(err.stage(), Stage::Credentials);
    assert_eq!(h.runtime.count("build"), 0);
}

#[tokio::test]
async fn test_missing_username_is_config_error() {
    let mut h = Harness::new(FakeRuntime::healthy());
    h.env = MapEnv::new();

    let err = run(&h, fast_options()).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Config(ConfigError::Missing { .. })
    ));
    assert_eq!(h.runtime.count("login"), 0);
    assert_eq!(h.runtime.count("build"), 0);
}

#[tokio::test]
async fn test_rejected_template_falls_back() {
    let mut h = Harness::new(FakeRuntime::healthy());
    h.connector = FakeConnector {
        reject_template: true,
        ..FakeConnector::ready_on(1)
    };
    let mut options = fast_options();
    options.api_key = Some(Secret::new("rp_key"));

    let report = run(&h, options).await.unwrap();

    assert!(matches!(
        report.outcome,
        ProvisionOutcome::Manual {
            reason: ProvisionError::Failed { .. },
            ..
        }
    ));
    assert_eq!(h.presenter.renders(), 1);
}

#[tokio::test]
async fn test_skip_provision_never_connects() {
    let h = Harness::new(FakeRuntime::healthy());
    let mut options = fast_options();
    options.api_key = Some(Secret::new("rp_key"));
    options.skip_provision = true;

    let report = run(&h, options).await.unwrap();

    assert!(matches!(report.outcome, ProvisionOutcome::Manual { .. }));
    assert_eq!(h.connector.connects(), 0);
    assert_eq!(h.presenter.renders(), 1);
}

#[tokio::test]
async fn test_repeated_runs_build_identical_artifacts() {
    let h = Harness::new(FakeRuntime::healthy());

    let first = run(&h, fast_options()).await.unwrap();
    let second = run(&h, fast_options()).await.unwrap();

    assert_eq!(first.artifact, second.artifact);
    assert_eq!(h.runtime.count("push"), 2);
}

#[tokio::test]
async fn test_stages_run_in_order() {
    let h = Harness::new(FakeRuntime::healthy());

    run(&h, fast_options()).await.unwrap();

    assert_eq!(
        h.events.stages(),
        vec![
            Stage::Runtime,
            Stage::Credentials,
            Stage::Build,
            Stage::Publish,
            Stage::Provision,
            Stage::Instructions,
        ]
    );
}

/// Cancels the run the first time the poll loop waits.
struct CancelOnSleep(CancellationToken);

#[async_trait]
impl Sleeper for CancelOnSleep {
    async fn sleep(&self, _duration: Duration) {
        self.0.cancel();
        std::future::pending::<()>().await;
    }
}

#[tokio::test]
async fn test_cancel_during_endpoint_wait() {
    let h = Harness::new(FakeRuntime::healthy());
    let cancel = CancellationToken::new();
    let sleeper = CancelOnSleep(cancel.clone());
    let deps = PipelineDeps {
        sleeper: &sleeper,
        ..h.deps()
    };
    let mut options = fast_options();
    options.api_key = Some(Secret::new("rp_key"));

    let err = Pipeline::new(deps, options)
        .run(&cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled(Stage::Provision)));
    assert_eq!(err.exit_code(), 130);
    assert_eq!(h.connector.calls.endpoints_created(), 1);
    assert_eq!(h.connector.calls.health.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(h.presenter.renders(), 0);
}

/// Behaves like a terminal prompt the operator pressed Ctrl-C at.
struct InterruptedPrompt;

impl CredentialProvider for InterruptedPrompt {
    fn username(&self) -> Result<Option<String>, PromptError> {
        Err(PromptError::Interrupted)
    }
}

#[tokio::test]
async fn test_ctrl_c_at_username_prompt_cancels() {
    let mut h = Harness::new(FakeRuntime::healthy());
    h.env = MapEnv::new();
    let deps = PipelineDeps {
        credentials: &InterruptedPrompt,
        ..h.deps()
    };

    let err = Pipeline::new(deps, fast_options())
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled(Stage::Credentials)));
    assert_eq!(err.exit_code(), 130);
    assert_eq!(h.runtime.count("login"), 0);
}

#[tokio::test]
async fn test_cancel_during_runtime_wait() {
    let mut runtime = FakeRuntime::healthy();
    runtime.running = false;
    let h = Harness::new(runtime);
    let cancel = CancellationToken::new();
    let sleeper = CancelOnSleep(cancel.clone());
    let deps = PipelineDeps {
        sleeper: &sleeper,
        ..h.deps()
    };

    let err = Pipeline::new(deps, fast_options())
        .run(&cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled(Stage::Runtime)));
    assert_eq!(err.exit_code(), 130);
    assert_eq!(h.runtime.count("build"), 0);
    // Initial check plus the first poll before the wait.
    assert_eq!(h.runtime.count("daemon_running"), 2);
}
