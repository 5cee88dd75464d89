//! Pacing between targets and retry of transient per-target failures.
//!
//! Pacing is a courtesy to the remote site, not a correctness mechanism:
//! tests run with [`NoPacing`]. Retries are off unless configured, so each
//! target is attempted exactly once by default.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use nichefinder_core::AppConfig;
use tokio::time::Instant;

use crate::types::ExtractionFailure;

/// Gate called before each target starts.
#[async_trait]
pub trait Pacer: Send {
    async fn wait_turn(&mut self);
}

/// Never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

#[async_trait]
impl Pacer for NoPacing {
    async fn wait_turn(&mut self) {}
}

/// Enforces a minimum interval between consecutive target starts. The first
/// target never waits.
#[derive(Debug, Clone)]
pub struct IntervalPacer {
    interval: Duration,
    last_start: Option<Instant>,
}

impl IntervalPacer {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_start: None,
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl Pacer for IntervalPacer {
    async fn wait_turn(&mut self) {
        if let Some(last) = self.last_start {
            let next = last + self.interval;
            if next > Instant::now() {
                tokio::time::sleep_until(next).await;
            }
        }
        self.last_start = Some(Instant::now());
    }
}

/// Extra attempts for transient per-target failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first; `0` disables retries.
    pub max_retries: u32,
    /// Delay before retry `n` (0-based) is `backoff_base * 2^n`.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_base: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.retry_backoff_base_ms),
        }
    }

    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Runs `operation` until it succeeds, fails with a non-transient kind, or
/// the retry budget is spent. The closure receives the 0-based attempt.
///
/// # Backoff schedule (example with `backoff_base = 1s`)
///
/// | Attempt | Sleep before it |
/// |---------|-----------------|
/// | 0 (initial) | none |
/// | 1 | 1 s |
/// | 2 | 2 s |
/// | 3 | 4 s |
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, ExtractionFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ExtractionFailure>>,
{
    let mut attempt = 0u32;

    loop {
        let failure = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };
        if !failure.kind.is_transient() || attempt >= policy.max_retries {
            return Err(failure);
        }

        let delay = policy.delay_for(attempt);
        tracing::warn!(
            attempt,
            max_retries = policy.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            kind = %failure.kind,
            "transient target failure, retrying after backoff"
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailureKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_base: Duration::ZERO,
        }
    }

    fn failure(kind: FailureKind) -> ExtractionFailure {
        ExtractionFailure::new(kind, "test")
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(policy(3), |_| {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, ExtractionFailure>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_timeout_then_succeeds() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(policy(3), |_| {
            let cc = Arc::clone(&cc);
            async move {
                let n = cc.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(failure(FailureKind::NavigationTimeout))
                } else {
                    Ok::<u32, ExtractionFailure>(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn passes_attempt_number_to_operation() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _ = retry_with_backoff(policy(2), |attempt| {
            let s = Arc::clone(&s);
            async move {
                s.lock().unwrap().push(attempt);
                Err::<(), _>(failure(FailureKind::BackendError))
            }
        })
        .await;
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn zero_retries_attempts_exactly_once() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(RetryPolicy::none(), |_| {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(failure(FailureKind::NavigationTimeout))
            }
        })
        .await;
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().kind, FailureKind::NavigationTimeout);
    }

    #[tokio::test]
    async fn does_not_retry_captcha() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(policy(3), |_| {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(failure(FailureKind::CaptchaSuspected))
            }
        })
        .await;
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().kind, FailureKind::CaptchaSuspected);
    }

    #[tokio::test]
    async fn does_not_retry_missing_title() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let _ = retry_with_backoff(policy(3), |_| {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(failure(FailureKind::MissingRequiredField))
            }
        })
        .await;
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let p = RetryPolicy {
            max_retries: 3,
            backoff_base: Duration::from_millis(100),
        };
        assert_eq!(p.delay_for(0), Duration::from_millis(100));
        assert_eq!(p.delay_for(1), Duration::from_millis(200));
        assert_eq!(p.delay_for(2), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn interval_pacer_first_turn_is_immediate() {
        let mut pacer = IntervalPacer::new(Duration::from_secs(30));
        let start = Instant::now();
        pacer.wait_turn().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn interval_pacer_spaces_consecutive_turns() {
        let mut pacer = IntervalPacer::new(Duration::from_millis(50));
        pacer.wait_turn().await;
        let start = Instant::now();
        pacer.wait_turn().await;
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn no_pacing_never_waits() {
        let mut pacer = NoPacing;
        let start = Instant::now();
        for _ in 0..100 {
            pacer.wait_turn().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
