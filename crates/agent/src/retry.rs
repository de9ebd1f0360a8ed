use std::future::Future;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base`, then `2 × base`, `4 × base`, ...
    Exponential { base: Duration },
}

impl Backoff {
    /// Delay before retry number `retry` (1 for the first retry).
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential { base } => {
                let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
                base.saturating_mul(factor)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, backoff: Backoff::Fixed(delay) }
    }

    pub fn exponential(max_attempts: u32, base: Duration) -> Self {
        Self { max_attempts, backoff: Backoff::Exponential { base } }
    }
}

#[derive(Debug)]
pub struct Retried<T> {
    /// The accepted value, or the last one produced when none was accepted.
    pub value: T,
    pub attempts: u32,
    pub accepted: bool,
}

impl<T> Retried<T> {
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Run `operation` until `accept` approves its output or the attempts run out.
///
/// `operation` receives the 1-based attempt number. Delays use
/// `tokio::time::sleep`, so other tasks keep running meanwhile.
pub async fn retry_with_backoff<T, F, Fut, A>(
    policy: &RetryPolicy,
    mut operation: F,
    accept: A,
) -> Retried<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = T>,
    A: Fn(&T) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let value = operation(attempt).await;
        if accept(&value) {
            return Retried { value, attempts: attempt, accepted: true };
        }
        if attempt >= max_attempts {
            return Retried { value, attempts: attempt, accepted: false };
        }

        let delay = policy.backoff.delay(attempt);
        tracing::debug!(
            event_name = "retry.scheduled",
            attempt,
            max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "attempt not accepted, retrying"
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        attempt += 1;
    }
}
