use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

/// Seconds between status checks when waiting on the runtime or an endpoint.
pub const POLL_INTERVAL_SECS: u64 = 2;
/// Status checks after asking the runtime to start.
pub const RUNTIME_START_ATTEMPTS: u32 = 30;
/// Status checks after a first install, which takes longer to come up.
pub const RUNTIME_INSTALL_ATTEMPTS: u32 = 60;
/// Status checks while waiting for a new endpoint to become ready.
pub const ENDPOINT_READY_ATTEMPTS: u32 = 30;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fixed-interval polling with a hard attempt limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn runtime_start() -> Self {
        Self::new(Duration::from_secs(POLL_INTERVAL_SECS), RUNTIME_START_ATTEMPTS)
    }

    pub fn runtime_install() -> Self {
        Self::new(
            Duration::from_secs(POLL_INTERVAL_SECS),
            RUNTIME_INSTALL_ATTEMPTS,
        )
    }

    pub fn endpoint_ready() -> Self {
        Self::new(Duration::from_secs(POLL_INTERVAL_SECS), ENDPOINT_READY_ATTEMPTS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready { value: T, attempts: u32 },
    Exhausted { attempts: u32 },
}

/// Call `check` until it yields a value, fails, or the attempt budget runs out.
///
/// `check` receives the 1-based attempt number. `Ok(None)` means "not yet".
/// The sleeper runs between attempts only, so success on attempt `k` costs
/// `k - 1` sleeps. A zero budget still checks once.
pub async fn poll_until<T, E, F, Fut>(
    policy: PollPolicy,
    sleeper: &dyn Sleeper,
    mut check: F,
) -> Result<PollOutcome<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        if let Some(value) = check(attempt).await? {
            return Ok(PollOutcome::Ready {
                value,
                attempts: attempt,
            });
        }
        tracing::debug!(attempt, max_attempts, "condition not met yet");
        if attempt < max_attempts {
            sleeper.sleep(policy.interval).await;
        }
    }
    Ok(PollOutcome::Exhausted {
        attempts: max_attempts,
    })
}
