use std::fmt::Display;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Backoff schedule for a failing request.
///
/// One attempt is made per entry of `base_delays` (sleeping that long after a
/// failure), followed by `final_retries` attempts spaced by `final_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delays: Vec<Duration>,
    pub final_retries: usize,
    pub final_delay: Duration,
}

impl Default for RetryPolicy {
    /// 2s, 4s, 6s, 8s, then 10s x 3
    fn default() -> Self {
        Self {
            base_delays: [2, 4, 6, 8].into_iter().map(Duration::from_secs).collect(),
            final_retries: 3,
            final_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            base_delays: Vec::new(),
            final_retries: 1,
            final_delay: Duration::ZERO,
        }
    }

    /// Always at least one.
    #[must_use]
    pub fn total_attempts(&self) -> usize {
        (self.base_delays.len() + self.final_retries).max(1)
    }

    fn delay_after(&self, attempt: usize) -> Duration {
        self.base_delays
            .get(attempt.saturating_sub(1))
            .copied()
            .unwrap_or(self.final_delay)
    }
}

/// Retry an async operation following `policy`.
///
/// Only errors for which `should_retry` holds are retried. Returns the first
/// success, the first permanent error, or the error of the last attempt.
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    mut operation: F,
    policy: &RetryPolicy,
    should_retry: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
    R: Fn(&E) -> bool,
{
    let total = policy.total_attempts();
    let mut attempt = 0_usize;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt >= total || !should_retry(&e) => return Err(e),
            Err(e) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "Request failed (attempt {attempt}/{total}): {e}. Retrying after {}ms...",
                    delay.as_millis()
                );
                sleep(delay).await;
            }
        }
    }
}
