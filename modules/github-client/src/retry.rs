use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::{GithubError, Result};

/// Delay policy for retrying transient failures. `delay(attempt)` is pure;
/// jitter is added at the sleep site.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    factor: u32,
    cap: Option<Duration>,
}

impl Backoff {
    /// Constant delay between attempts.
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            base: delay,
            factor: 1,
            cap: None,
        }
    }

    /// `base * factor^attempt`, clamped to `cap`.
    pub const fn exponential(base: Duration, factor: u32, cap: Duration) -> Self {
        Self {
            base,
            factor,
            cap: Some(cap),
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let delay = match self.factor.checked_pow(attempt) {
            Some(multiplier) => self.base.saturating_mul(multiplier),
            None => Duration::MAX,
        };
        match self.cap {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

impl Default for Backoff {
    /// 3s, 9s, 27s, ... capped at 10 minutes — the coarse-grained cadence
    /// of a background batch pipeline.
    fn default() -> Self {
        Self::exponential(Duration::from_secs(3), 3, Duration::from_secs(600))
    }
}

/// Run `op`, retrying rate-limit and network failures indefinitely with
/// backoff. A server-provided `retry-after` hint overrides the policy
/// delay for that attempt. Terminal errors propagate immediately.
pub async fn with_retries<T, F, Fut>(policy: Backoff, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                let delay = match &err {
                    GithubError::RateLimited {
                        retry_after: Some(hint),
                    } => *hint,
                    _ => policy.delay(attempt),
                };
                let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
                warn!(
                    attempt,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay + jitter).await;
                attempt = attempt.saturating_add(1);
            }
            Err(err) => return Err(err),
        }
    }
}
