//! Deadline and retry wrapper for arbitrary async operations

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// How often to re-run an operation that missed its deadline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one times out
    pub retries: u32,
    /// Pause between a timed-out attempt and the next one
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// A single attempt, no retries
    pub fn once() -> Self {
        Self::default()
    }
}

enum Attempt<T> {
    Settled(T),
    TimedOut,
}

async fn race<Fut: Future>(fut: Fut, limit: Duration) -> Attempt<Fut::Output> {
    match timeout(limit, fut).await {
        Ok(output) => Attempt::Settled(output),
        Err(_) => Attempt::TimedOut,
    }
}

/// Race `op()` against `limit`, retrying on timeout.
///
/// A value or an error from `op` is returned as soon as it arrives; errors
/// are never retried. When every attempt times out, `fallback` is returned.
/// A timed-out attempt's future is dropped before the next call to `op`.
pub async fn with_timeout<T, E, F, Fut>(
    mut op: F,
    limit: Duration,
    fallback: T,
    policy: RetryPolicy,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.retries.saturating_add(1);

    for attempt in 1..=attempts {
        match race(op(), limit).await {
            Attempt::Settled(result) => return result,
            Attempt::TimedOut => {
                debug!(attempt, attempts, timeout_ms = limit.as_millis() as u64, "Operation timed out");
                if attempt < attempts && !policy.delay.is_zero() {
                    sleep(policy.delay).await;
                }
            }
        }
    }

    Ok(fallback)
}
