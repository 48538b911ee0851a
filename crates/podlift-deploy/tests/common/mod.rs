#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use podlift_common::{BuildArtifact, CommandError, DeploymentConfig, MapEnv, Secret};
use podlift_deploy::platform::{EndpointHealth, EndpointRequest, TemplateRequest, WorkerCounts};
use podlift_deploy::{
    BuildRequest, ChecklistPresenter, CommandOutput, ContainerRuntime, HeadlessPrompt,
    HostPlatform, InstructionPresenter, InstructionText, PipelineDeps, PipelineOptions,
    PlatformApi, PlatformConnector, PlatformError, PollPolicy, RecordingSink, Sleeper,
};

/// Scripted container runtime that records every call by name, plus the
/// registries logged into and the references built and pushed.
pub struct FakeRuntime {
    pub installed: bool,
    pub running: bool,
    pub login_ok: bool,
    pub build_ok: bool,
    pub push_ok: bool,
    calls: Mutex<Vec<&'static str>>,
    logins: Mutex<Vec<Option<String>>>,
    built: Mutex<Vec<String>>,
    pushed: Mutex<Vec<String>>,
}

impl FakeRuntime {
    pub fn healthy() -> Self {
        Self {
            installed: true,
            running: true,
            login_ok: true,
            build_ok: true,
            push_ok: true,
            calls: Mutex::new(Vec::new()),
            logins: Mutex::new(Vec::new()),
            built: Mutex::new(Vec::new()),
            pushed: Mutex::new(Vec::new()),
        }
    }

    pub fn logins(&self) -> Vec<Option<String>> {
        self.logins.lock().unwrap().clone()
    }

    pub fn built(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }

    pub fn pushed(&self) -> Vec<String> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| **c == name).count()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }

    fn outcome(ok: bool, stderr: &str) -> CommandOutput {
        if ok {
            CommandOutput::ok()
        } else {
            CommandOutput::failed(1, stderr)
        }
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn version(&self) -> Result<Option<String>, CommandError> {
        self.record("version");
        Ok(self.installed.then(|| "Docker version 27.3.1".to_string()))
    }

    async fn daemon_running(&self) -> Result<bool, CommandError> {
        self.record("daemon_running");
        Ok(self.running)
    }

    async fn install(&self, _host: HostPlatform) -> Result<CommandOutput, CommandError> {
        self.record("install");
        Ok(CommandOutput::ok())
    }

    async fn start(&self, _host: HostPlatform) -> Result<CommandOutput, CommandError> {
        self.record("start");
        Ok(CommandOutput::ok())
    }

    async fn login(
        &self,
        registry: Option<&str>,
        _username: &str,
        _secret: Option<&Secret>,
    ) -> Result<CommandOutput, CommandError> {
        self.record("login");
        self.logins.lock().unwrap().push(registry.map(str::to_string));
        Ok(Self::outcome(self.login_ok, "unauthorized: incorrect username or password"))
    }

    async fn build(&self, request: &BuildRequest) -> Result<CommandOutput, CommandError> {
        self.record("build");
        self.built.lock().unwrap().push(request.reference.clone());
        Ok(Self::outcome(self.build_ok, "failed to solve: no space left on device"))
    }

    async fn push(&self, reference: &str) -> Result<CommandOutput, CommandError> {
        self.record("push");
        self.pushed.lock().unwrap().push(reference.to_string());
        Ok(Self::outcome(self.push_ok, "denied: requested access to the resource is denied"))
    }
}

/// Platform state shared by every client a connector hands out, so it
/// survives across pipeline runs.
#[derive(Default)]
pub struct PlatformCalls {
    pub connect: AtomicU32,
    pub templates: AtomicU32,
    pub endpoints: AtomicU32,
    pub updates: AtomicU32,
    pub health: AtomicU32,
    template_names: Mutex<Vec<String>>,
    endpoint_names: Mutex<Vec<String>>,
}

impl PlatformCalls {
    pub fn templates_created(&self) -> u32 {
        self.templates.load(Ordering::SeqCst)
    }

    pub fn endpoints_created(&self) -> u32 {
        self.endpoints.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> u32 {
        self.updates.load(Ordering::SeqCst)
    }
}

fn find(names: &Mutex<Vec<String>>, prefix: &str, name: &str) -> Option<String> {
    let names = names.lock().unwrap();
    names
        .iter()
        .position(|n| n == name)
        .map(|i| format!("{prefix}-{}", i + 1))
}

fn insert(names: &Mutex<Vec<String>>, prefix: &str, name: &str) -> String {
    let mut names = names.lock().unwrap();
    names.push(name.to_string());
    format!("{prefix}-{}", names.len())
}

/// Platform whose endpoint has one idle worker from the `ready_on`-th
/// health check onwards.
pub struct FakeConnector {
    pub calls: Arc<PlatformCalls>,
    pub ready_on: u32,
    pub reject_template: bool,
}

impl FakeConnector {
    pub fn ready_on(ready_on: u32) -> Self {
        Self {
            calls: Arc::default(),
            ready_on,
            reject_template: false,
        }
    }

    pub fn connects(&self) -> u32 {
        self.calls.connect.load(Ordering::SeqCst)
    }
}

impl PlatformConnector for FakeConnector {
    fn connect(&self, _api_key: &Secret) -> Result<Box<dyn PlatformApi>, PlatformError> {
        self.calls.connect.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePlatform {
            calls: self.calls.clone(),
            ready_on: self.ready_on,
            reject_template: self.reject_template,
        }))
    }
}

struct FakePlatform {
    calls: Arc<PlatformCalls>,
    ready_on: u32,
    reject_template: bool,
}

#[async_trait]
impl PlatformApi for FakePlatform {
    async fn find_template(&self, name: &str) -> Result<Option<String>, PlatformError> {
        Ok(find(&self.calls.template_names, "tpl", name))
    }

    async fn create_template(&self, request: &TemplateRequest) -> Result<String, PlatformError> {
        self.calls.templates.fetch_add(1, Ordering::SeqCst);
        if self.reject_template {
            return Err(PlatformError::Api {
                status: 400,
                body: "invalid image".into(),
            });
        }
        Ok(insert(&self.calls.template_names, "tpl", &request.name))
    }

    async fn update_template(
        &self,
        _template_id: &str,
        _request: &TemplateRequest,
    ) -> Result<(), PlatformError> {
        self.calls.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_endpoint(&self, name: &str) -> Result<Option<String>, PlatformError> {
        Ok(find(&self.calls.endpoint_names, "ep", name))
    }

    async fn create_endpoint(&self, request: &EndpointRequest) -> Result<String, PlatformError> {
        self.calls.endpoints.fetch_add(1, Ordering::SeqCst);
        Ok(insert(&self.calls.endpoint_names, "ep", &request.name))
    }

    async fn update_endpoint(
        &self,
        _endpoint_id: &str,
        _request: &EndpointRequest,
    ) -> Result<(), PlatformError> {
        self.calls.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn endpoint_health(&self, _endpoint_id: &str) -> Result<EndpointHealth, PlatformError> {
        let n = self.calls.health.fetch_add(1, Ordering::SeqCst) + 1;
        let ready = n >= self.ready_on;
        Ok(EndpointHealth {
            workers: WorkerCounts {
                idle: u32::from(ready),
                initializing: u32::from(!ready),
                ..Default::default()
            },
        })
    }

    fn endpoint_url(&self, endpoint_id: &str) -> String {
        format!("https://api.runpod.ai/v2/{endpoint_id}")
    }
}

/// Checklist presenter that counts renders.
#[derive(Default)]
pub struct CountingPresenter {
    inner: ChecklistPresenter,
    renders: AtomicU32,
}

impl CountingPresenter {
    pub fn renders(&self) -> u32 {
        self.renders.load(Ordering::SeqCst)
    }
}

impl InstructionPresenter for CountingPresenter {
    fn render(&self, artifact: &BuildArtifact, config: &DeploymentConfig) -> InstructionText {
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.inner.render(artifact, config)
    }
}

pub struct NoSleep;

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, _duration: Duration) {}
}

/// Owns every fake so tests can inspect them after a run.
pub struct Harness {
    pub runtime: FakeRuntime,
    pub connector: FakeConnector,
    pub presenter: CountingPresenter,
    pub prompt: HeadlessPrompt,
    pub env: MapEnv,
    pub events: RecordingSink,
}

impl Harness {
    pub fn new(runtime: FakeRuntime) -> Self {
        Self {
            runtime,
            connector: FakeConnector::ready_on(2),
            presenter: CountingPresenter::default(),
            prompt: HeadlessPrompt { assume_yes: false },
            env: MapEnv::new()
                .with("DOCKERHUB_USERNAME", "alice")
                .with("DOCKERHUB_TOKEN", "dckr_pat_test"),
            events: RecordingSink::new(),
        }
    }

    pub fn deps(&self) -> PipelineDeps<'_> {
        PipelineDeps {
            runtime: &self.runtime,
            connector: &self.connector,
            presenter: &self.presenter,
            credentials: &self.prompt,
            confirm: &self.prompt,
            env: &self.env,
            sleeper: &NoSleep,
            events: &self.events,
        }
    }
}

pub fn fast_options() -> PipelineOptions {
    let fast = |n| PollPolicy::new(Duration::from_millis(1), n);
    PipelineOptions {
        host: HostPlatform::Linux,
        runtime_start: fast(30),
        runtime_install: fast(60),
        endpoint_ready: fast(30),
        ..Default::default()
    }
}
