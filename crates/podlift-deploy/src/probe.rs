use podlift_common::{CommandError, EnvironmentError, RuntimeStatus};

use crate::events::{EventSink, Reporter, Stage};
use crate::host::HostPlatform;
use crate::prompt::ConfirmationProvider;
use crate::retry::{poll_until, PollOutcome, PollPolicy, Sleeper};
use crate::runtime::ContainerRuntime;

/// Makes sure the container runtime is installed and its daemon answers,
/// installing or starting it when needed.
pub struct RuntimeProbe<'a> {
    runtime: &'a dyn ContainerRuntime,
    confirm: &'a dyn ConfirmationProvider,
    sleeper: &'a dyn Sleeper,
    report: Reporter<'a>,
    host: HostPlatform,
    start_policy: PollPolicy,
    install_policy: PollPolicy,
}

impl<'a> RuntimeProbe<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        confirm: &'a dyn ConfirmationProvider,
        sleeper: &'a dyn Sleeper,
        events: &'a dyn EventSink,
    ) -> Self {
        Self {
            runtime,
            confirm,
            sleeper,
            report: Reporter::new(events, Stage::Runtime),
            host: HostPlatform::detect(),
            start_policy: PollPolicy::runtime_start(),
            install_policy: PollPolicy::runtime_install(),
        }
    }

    pub fn with_host(mut self, host: HostPlatform) -> Self {
        self.host = host;
        self
    }

    pub fn with_policies(mut self, start: PollPolicy, install: PollPolicy) -> Self {
        self.start_policy = start;
        self.install_policy = install;
        self
    }

    /// One-shot status query without remediation.
    pub async fn probe(&self) -> Result<RuntimeStatus, CommandError> {
        let Some(version) = self.runtime.version().await? else {
            return Ok(RuntimeStatus::default());
        };
        tracing::debug!(%version, "container runtime found");
        let running = self.runtime.daemon_running().await?;
        Ok(RuntimeStatus {
            installed: true,
            running,
        })
    }

    /// Query, remediate, and wait until the daemon answers.
    pub async fn ensure_running(&self) -> Result<RuntimeStatus, EnvironmentError> {
        let status = self.probe().await?;
        if status.running {
            self.report.success("Docker is installed and running");
            return Ok(status);
        }

        let policy = if status.installed {
            self.report.warn("Docker daemon is not running");
            self.start_policy
        } else {
            self.confirm_install()?;
            self.run_install().await?;
            self.install_policy
        };

        self.start().await?;
        self.report.info(format!(
            "Waiting for Docker to start (up to {} checks, {}s apart)",
            policy.max_attempts,
            policy.interval.as_secs()
        ));

        let runtime = self.runtime;
        let outcome = poll_until(policy, self.sleeper, |attempt| async move {
            let running = runtime.daemon_running().await?;
            tracing::debug!(attempt, running, "runtime status check");
            Ok::<_, CommandError>(running.then_some(()))
        })
        .await?;

        match outcome {
            PollOutcome::Ready { attempts, .. } => {
                self.report
                    .success(format!("Docker is running (after {attempts} checks)"));
                Ok(RuntimeStatus {
                    installed: true,
                    running: true,
                })
            }
            PollOutcome::Exhausted { attempts } => {
                self.report
                    .error(format!("Docker did not start after {attempts} checks"));
                Err(EnvironmentError::Unavailable { attempts })
            }
        }
    }

    /// Ask before installing anything.
    fn confirm_install(&self) -> Result<(), EnvironmentError> {
        self.report.warn("Docker is not installed");
        let question = match self.host.install_command() {
            Some(cmd) => format!("Install Docker now with `{cmd}`?"),
            None => format!("Attempt to install Docker on {}?", self.host.name()),
        };
        let accepted = self
            .confirm
            .confirm(&question, false)?;
        if !accepted {
            self.report.error(format!(
                "Installation declined; install Docker manually: {}",
                self.host.install_docs()
            ));
            return Err(EnvironmentError::InstallDeclined);
        }
        Ok(())
    }

    async fn run_install(&self) -> Result<(), EnvironmentError> {
        self.report.info(format!("Installing Docker on {}", self.host.name()));
        let output = self.runtime.install(self.host).await?;
        if !output.success() {
            return Err(EnvironmentError::InstallFailed {
                output: output.diagnostic(),
            });
        }
        self.report.success("Docker installed");
        Ok(())
    }

    async fn start(&self) -> Result<(), EnvironmentError> {
        self.report.info("Starting Docker");
        let output = self.runtime.start(self.host).await?;
        if !output.success() {
            // The daemon may still come up on its own (e.g. socket activation).
            self.report
                .warn(format!("Start command failed: {}", output.diagnostic()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use podlift_common::Secret;

    use super::*;
    use crate::events::RecordingSink;
    use crate::prompt::{HeadlessPrompt, PromptError};
    use crate::runtime::{BuildRequest, CommandOutput};

    /// Daemon answers on the `ready_on`-th status query.
    struct FakeRuntime {
        installed: bool,
        ready_on: Option<u32>,
        status_calls: AtomicU32,
        actions: Mutex<Vec<&'static str>>,
    }

    impl FakeRuntime {
        fn new(installed: bool, ready_on: Option<u32>) -> Self {
            Self {
                installed,
                ready_on,
                status_calls: AtomicU32::new(0),
                actions: Mutex::new(Vec::new()),
            }
        }

        fn actions(&self) -> Vec<&'static str> {
            self.actions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn version(&self) -> Result<Option<String>, CommandError> {
            Ok(self.installed.then(|| "Docker version 27.0.1".to_string()))
        }

        async fn daemon_running(&self) -> Result<bool, CommandError> {
            let n = self.status_calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(self.ready_on.is_some_and(|k| n >= k))
        }

        async fn install(&self, _host: HostPlatform) -> Result<CommandOutput, CommandError> {
            self.actions.lock().unwrap().push("install");
            Ok(CommandOutput::ok())
        }

        async fn start(&self, _host: HostPlatform) -> Result<CommandOutput, CommandError> {
            self.actions.lock().unwrap().push("start");
            Ok(CommandOutput::ok())
        }

        async fn login(
            &self,
            _registry: Option<&str>,
            _username: &str,
            _secret: Option<&Secret>,
        ) -> Result<CommandOutput, CommandError> {
            unreachable!("probe never logs in")
        }

        async fn build(&self, _request: &BuildRequest) -> Result<CommandOutput, CommandError> {
            unreachable!("probe never builds")
        }

        async fn push(&self, _reference: &str) -> Result<CommandOutput, CommandError> {
            unreachable!("probe never pushes")
        }
    }

    struct NoSleep;

    #[async_trait]
    impl Sleeper for NoSleep {
        async fn sleep(&self, _duration: Duration) {}
    }

    struct Refuse;

    impl ConfirmationProvider for Refuse {
        fn confirm(&self, _prompt: &str, _default: bool) -> Result<bool, PromptError> {
            Ok(false)
        }
    }

    fn fast(max: u32) -> PollPolicy {
        PollPolicy::new(Duration::from_millis(1), max)
    }

    #[tokio::test]
    async fn test_already_running() {
        let runtime = FakeRuntime::new(true, Some(1));
        let events = RecordingSink::new();
        let yes = HeadlessPrompt { assume_yes: true };
        let probe = RuntimeProbe::new(&runtime, &yes, &NoSleep, &events);

        let status = probe.ensure_running().await.unwrap();
        assert!(status.installed && status.running);
        assert!(runtime.actions().is_empty());
        assert_eq!(runtime.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_then_ready_after_k_polls() {
        // First query is the initial probe; the loop then needs exactly k polls.
        let k = 4;
        let runtime = FakeRuntime::new(true, Some(1 + k));
        let events = RecordingSink::new();
        let yes = HeadlessPrompt { assume_yes: true };
        let probe = RuntimeProbe::new(&runtime, &yes, &NoSleep, &events)
            .with_host(HostPlatform::Linux)
            .with_policies(fast(30), fast(60));

        probe.ensure_running().await.unwrap();
        assert_eq!(runtime.actions(), vec!["start"]);
        assert_eq!(runtime.status_calls.load(Ordering::SeqCst), 1 + k);
    }

    #[tokio::test]
    async fn test_start_budget_exhausted() {
        let runtime = FakeRuntime::new(true, None);
        let events = RecordingSink::new();
        let yes = HeadlessPrompt { assume_yes: true };
        let probe = RuntimeProbe::new(&runtime, &yes, &NoSleep, &events)
            .with_host(HostPlatform::MacOs)
            .with_policies(fast(30), fast(60));

        let err = probe.ensure_running().await.unwrap_err();
        assert!(matches!(err, EnvironmentError::Unavailable { attempts: 30 }));
        assert_eq!(runtime.status_calls.load(Ordering::SeqCst), 1 + 30);
    }

    #[tokio::test]
    async fn test_install_uses_longer_budget() {
        let runtime = FakeRuntime::new(false, None);
        let events = RecordingSink::new();
        let yes = HeadlessPrompt { assume_yes: true };
        let probe = RuntimeProbe::new(&runtime, &yes, &NoSleep, &events)
            .with_host(HostPlatform::Linux)
            .with_policies(fast(30), fast(60));

        let err = probe.ensure_running().await.unwrap_err();
        assert!(matches!(err, EnvironmentError::Unavailable { attempts: 60 }));
        assert_eq!(runtime.actions(), vec!["install", "start"]);
        // Not installed: the initial probe skips the daemon query.
        assert_eq!(runtime.status_calls.load(Ordering::SeqCst), 60);
    }

    #[tokio::test]
    async fn test_install_declined() {
        let runtime = FakeRuntime::new(false, Some(1));
        let events = RecordingSink::new();
        let probe = RuntimeProbe::new(&runtime, &Refuse, &NoSleep, &events);

        let err = probe.ensure_running().await.unwrap_err();
        assert!(matches!(err, EnvironmentError::InstallDeclined));
        assert!(runtime.actions().is_empty());
        assert_eq!(runtime.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_probe_reports_status_only() {
        let runtime = FakeRuntime::new(true, None);
        let events = RecordingSink::new();
        let yes = HeadlessPrompt { assume_yes: true };
        let probe = RuntimeProbe::new(&runtime, &yes, &NoSleep, &events);

        let status = probe.probe().await.unwrap();
        assert_eq!(
            status,
            RuntimeStatus {
                installed: true,
                running: false
            }
        );
        assert!(runtime.actions().is_empty());
    }
}
