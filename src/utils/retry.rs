use std::time::Duration;
use rand::Rng;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Backoff Retry Strategy
// ============================================================================
//
// Bounded retry loop with exponential (or fixed, multiplier = 1.0) backoff
// plus random jitter. Every sleep races the cancellation token so a shutdown
// never waits out a full backoff.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for the base delay
    pub max_delay: Duration,
    /// Multiplier applied to the base delay after each failure
    pub multiplier: f64,
    /// Upper bound of the random delay added on top of the base delay
    pub jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 1.0,
            jitter: Duration::from_millis(500),
        }
    }
}

impl RetryConfig {
    /// Base delay that follows `delay` once it has been slept.
    fn next_delay(&self, delay: Duration) -> Duration {
        let next = Duration::from_millis(((delay.as_millis() as f64) * self.multiplier) as u64);
        next.min(self.max_delay)
    }
}

/// Adds a uniformly random `[0, jitter]` component to `base`.
pub fn jittered(base: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return base;
    }
    let extra = rand::thread_rng().gen_range(0..=jitter.as_millis() as u64);
    base + Duration::from_millis(extra)
}

/// Sleeps for `delay` unless `cancel` fires first. Returns `false` when cancelled.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(delay) => true,
    }
}

/// Result of a retry operation
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded
    Success(T),
    /// Operation failed after all retries
    Failed(E),
    /// Operation permanently failed (should not retry)
    PermanentFailure(E),
    /// The cancellation token fired before a terminal outcome
    Cancelled,
}

/// Check if an error is transient (should retry) or permanent (should not retry)
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

/// Retry with transient error checking
pub async fn retry_on_transient<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        if cancel.is_cancelled() {
            return RetryResult::Cancelled;
        }
        attempt += 1;

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt = attempt, "Operation succeeded after retry");
                }
                return RetryResult::Success(result);
            }
            Err(error) => {
                if !error.is_transient() {
                    tracing::debug!(error = %error, "Permanent outcome, not retrying");
                    return RetryResult::PermanentFailure(error);
                }

                if attempt >= config.max_attempts {
                    tracing::error!(
                        attempt = attempt,
                        error = %error,
                        "Operation failed after all retries"
                    );
                    return RetryResult::Failed(error);
                }

                let wait = jittered(delay, config.jitter);
                tracing::warn!(
                    attempt = attempt,
                    error = %error,
                    delay_ms = wait.as_millis(),
                    "Transient failure, retrying after delay"
                );

                if !sleep_or_cancel(wait, cancel).await {
                    return RetryResult::Cancelled;
                }
                delay = config.next_delay(delay);
            }
        }
    }
}
