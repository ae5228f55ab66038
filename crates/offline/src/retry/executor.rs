//! Retry executor with exponential backoff, cancellation, and an optional
//! connectivity gate.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::backoff::delay_for_attempt;
use super::constants::{
    DEFAULT_BASE_DELAY, DEFAULT_JITTER_FACTOR, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY,
    MAX_MAX_ATTEMPTS, MIN_MAX_ATTEMPTS,
};
use crate::failure::SyncFailure;
use crate::probe::ConnectivityProbe;

/// The executor was built with inconsistent settings.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid retry configuration: {0}")]
pub struct InvalidRetryConfig(String);

/// Runs operations with classified retry and exponential backoff.
///
/// Guarantees:
/// - the operation is invoked at most `max_attempts` times;
/// - a non-retryable failure propagates on its first occurrence;
/// - the error surfaced to the caller is exactly the last failure
///   observed, never a synthesized "gave up" error.
///
/// Cancellation is cooperative: the token is checked before every
/// invocation and interrupts any backoff wait. An abandoned executor
/// therefore never fires a stray extra attempt the way a bare timer would.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
    cancel: CancellationToken,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_factor: DEFAULT_JITTER_FACTOR,
            cancel: CancellationToken::new(),
        }
    }
}

impl RetryExecutor {
    /// Executor with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a custom executor with validation.
    pub fn custom(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
    ) -> Result<Self, InvalidRetryConfig> {
        if !(MIN_MAX_ATTEMPTS..=MAX_MAX_ATTEMPTS).contains(&max_attempts) {
            return Err(InvalidRetryConfig(format!(
                "max_attempts must be between {MIN_MAX_ATTEMPTS} and {MAX_MAX_ATTEMPTS}, \
                 got {max_attempts}"
            )));
        }

        if base_delay > max_delay {
            return Err(InvalidRetryConfig(format!(
                "base_delay ({base_delay:?}) cannot be greater than max_delay ({max_delay:?})"
            )));
        }

        Ok(Self { max_attempts, base_delay, max_delay, ..Self::default() })
    }

    /// Set the attempt ceiling with validation.
    pub fn with_max_attempts(mut self, attempts: u32) -> Result<Self, InvalidRetryConfig> {
        if !(MIN_MAX_ATTEMPTS..=MAX_MAX_ATTEMPTS).contains(&attempts) {
            return Err(InvalidRetryConfig(format!(
                "max_attempts must be between {MIN_MAX_ATTEMPTS} and {MAX_MAX_ATTEMPTS}, \
                 got {attempts}"
            )));
        }
        self.max_attempts = attempts;
        Ok(self)
    }

    /// Set the base delay for exponential backoff.
    pub fn with_base_delay(mut self, delay: Duration) -> Result<Self, InvalidRetryConfig> {
        if delay > self.max_delay {
            return Err(InvalidRetryConfig(format!(
                "base_delay ({delay:?}) cannot be greater than max_delay ({:?})",
                self.max_delay
            )));
        }
        self.base_delay = delay;
        Ok(self)
    }

    /// Set the maximum delay cap.
    pub fn with_max_delay(mut self, delay: Duration) -> Result<Self, InvalidRetryConfig> {
        if delay < self.base_delay {
            return Err(InvalidRetryConfig(format!(
                "max_delay ({delay:?}) cannot be less than base_delay ({:?})",
                self.base_delay
            )));
        }
        self.max_delay = delay;
        Ok(self)
    }

    /// Set the additive jitter factor, clamped to `0.0..=1.0`.
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Disable jitter; the schedule becomes the pure exponential floor.
    pub fn no_jitter(self) -> Self {
        self.with_jitter_factor(0.0)
    }

    /// Attach a cancellation token, checked before every invocation and
    /// during backoff waits.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The configured attempt ceiling.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Execute an operation with retry.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, SyncFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncFailure>>,
    {
        self.execute_with_hook(operation, |_, _| {}).await
    }

    /// Execute an operation with retry, invoking `on_retry(attempt,
    /// failure)` before each backoff wait.
    pub async fn execute_with_hook<F, Fut, T, H>(
        &self,
        operation: F,
        on_retry: H,
    ) -> Result<T, SyncFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncFailure>>,
        H: FnMut(u32, &SyncFailure),
    {
        self.retry_loop(None, operation, on_retry).await
    }

    /// Connectivity-aware execution: before each attempt the probe is
    /// queried, and when the device is offline the attempt is charged as an
    /// immediate `NetworkUnreachable` failure without invoking the
    /// operation (saving a wasted call).
    pub async fn execute_online<F, Fut, T>(
        &self,
        probe: &dyn ConnectivityProbe,
        operation: F,
    ) -> Result<T, SyncFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncFailure>>,
    {
        self.retry_loop(Some(probe), operation, |_, _| {}).await
    }

    /// The one retry loop behind both public execution paths. With a probe
    /// present, offline attempts are charged without invoking the
    /// operation.
    async fn retry_loop<F, Fut, T, H>(
        &self,
        probe: Option<&dyn ConnectivityProbe>,
        mut operation: F,
        mut on_retry: H,
    ) -> Result<T, SyncFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncFailure>>,
        H: FnMut(u32, &SyncFailure),
    {
        let mut last_failure: Option<SyncFailure> = None;

        for attempt in 1..=self.max_attempts {
            if self.cancel.is_cancelled() {
                debug!(attempt, "Retry cancelled before invocation");
                return Err(cancelled_failure(last_failure));
            }

            let online = match probe {
                Some(probe) => probe.is_connected().await,
                None => true,
            };

            let result = if online {
                operation().await
            } else {
                debug!(attempt, "Device offline, skipping operation call");
                Err(SyncFailure::offline())
            };

            match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(failure) => {
                    if !failure.is_retryable() {
                        debug!(error = %failure, "Failure is not retryable");
                        return Err(failure);
                    }

                    if attempt == self.max_attempts {
                        error!(
                            attempts = attempt,
                            error = %failure,
                            "All retry attempts failed"
                        );
                        return Err(failure);
                    }

                    on_retry(attempt, &failure);

                    let delay = delay_for_attempt(
                        self.base_delay,
                        self.max_delay,
                        attempt,
                        self.jitter_factor,
                    );

                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay = ?delay,
                        error = %failure,
                        "Attempt failed, backing off"
                    );

                    last_failure = Some(failure);

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            debug!(attempt, "Retry cancelled during backoff");
                            return Err(cancelled_failure(last_failure));
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        // max_attempts >= 1, so the loop always returns; this satisfies the
        // compiler without synthesizing a new error kind.
        Err(last_failure.unwrap_or_else(|| SyncFailure::transport("no attempts were made")))
    }
}

/// Cancellation surfaces the last observed failure unchanged; the taxonomy
/// has no cancellation tag, and a caller that cancels already knows why.
fn cancelled_failure(last: Option<SyncFailure>) -> SyncFailure {
    last.unwrap_or_else(|| SyncFailure::transport("operation cancelled before execution"))
}

#[cfg(test)]
mod tests {
    //! Unit tests for the retry executor.
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;
    use crate::failure::FailureKind;
    use crate::probe::FlagProbe;

    fn counting_op(
        counter: &Arc<AtomicU32>,
        failures_before_success: u32,
        failure: SyncFailure,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<&'static str, SyncFailure>> + Send>>
    {
        let counter = Arc::clone(counter);
        move || {
            let counter = Arc::clone(&counter);
            let failure = failure.clone();
            Box::pin(async move {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count < failures_before_success {
                    Err(failure)
                } else {
                    Ok("success")
                }
            })
        }
    }

    #[test]
    fn test_custom_validation() {
        assert!(RetryExecutor::custom(0, Duration::from_millis(1), Duration::from_secs(1))
            .is_err());
        assert!(RetryExecutor::custom(3, Duration::from_secs(10), Duration::from_secs(1))
            .is_err());
        assert!(RetryExecutor::custom(3, Duration::from_millis(100), Duration::from_secs(5))
            .is_ok());
    }

    #[test]
    fn test_with_max_delay_below_base_rejected() {
        let result = RetryExecutor::new()
            .with_base_delay(Duration::from_secs(2))
            .unwrap()
            .with_max_delay(Duration::from_secs(1));

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new();

        let result = executor
            .execute(counting_op(&counter, 0, SyncFailure::transport("network error")))
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    /// Fails twice with a retryable failure, then succeeds: three calls,
    /// and the elapsed time covers the nominal 100ms + 200ms schedule.
    #[tokio::test]
    async fn test_retries_until_success_with_backoff_floor() {
        let counter = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::custom(
            3,
            Duration::from_millis(100),
            Duration::from_secs(5),
        )
        .unwrap()
        .no_jitter();

        let start = Instant::now();
        let result = executor
            .execute(counting_op(&counter, 2, SyncFailure::transport("Network request failed")))
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    /// A non-retryable 404 propagates after exactly one call.
    #[tokio::test]
    async fn test_non_retryable_propagates_immediately() {
        let counter = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::custom(
            3,
            Duration::from_millis(100),
            Duration::from_secs(5),
        )
        .unwrap();

        let result = executor
            .execute(counting_op(&counter, u32::MAX, SyncFailure::http(404, "not found")))
            .await;

        assert_eq!(result.unwrap_err(), SyncFailure::http(404, "not found"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    /// Always-failing retryable operation: invoked exactly max_attempts
    /// times, and the surfaced error is the last failure, not a wrapper.
    #[tokio::test]
    async fn test_exhaustion_surfaces_last_failure() {
        let counter = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::custom(
            4,
            Duration::from_millis(1),
            Duration::from_secs(1),
        )
        .unwrap();

        let result = executor
            .execute(counting_op(&counter, u32::MAX, SyncFailure::http(503, "unavailable")))
            .await;

        assert_eq!(result.unwrap_err(), SyncFailure::http(503, "unavailable"));
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_on_retry_hook_sees_each_failed_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::custom(
            3,
            Duration::from_millis(1),
            Duration::from_secs(1),
        )
        .unwrap();

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let result = executor
            .execute_with_hook(
                counting_op(&counter, u32::MAX, SyncFailure::transport("connection reset")),
                move |attempt, failure| {
                    seen_clone.lock().unwrap().push((attempt, failure.classify()));
                },
            )
            .await;

        assert!(result.is_err());
        // The final attempt exhausts; the hook only fires when a retry follows.
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(1, FailureKind::NetworkUnreachable), (2, FailureKind::NetworkUnreachable)]
        );
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_prevents_invocation() {
        let counter = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();
        token.cancel();

        let executor = RetryExecutor::new().with_cancellation(token);
        let result = executor
            .execute(counting_op(&counter, u32::MAX, SyncFailure::transport("network error")))
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    /// Cancelling during backoff stops the loop and surfaces the failure
    /// that was last observed.
    #[tokio::test]
    async fn test_cancellation_during_backoff() {
        let counter = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();

        let executor = RetryExecutor::custom(
            5,
            Duration::from_secs(10),
            Duration::from_secs(60),
        )
        .unwrap()
        .with_cancellation(token.clone());

        let handle = tokio::spawn({
            let counter = Arc::clone(&counter);
            async move {
                executor
                    .execute(counting_op(
                        &counter,
                        u32::MAX,
                        SyncFailure::transport("connection refused"),
                    ))
                    .await
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        let result = handle.await.unwrap();
        assert_eq!(result.unwrap_err(), SyncFailure::transport("connection refused"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    /// Offline probe: the operation is never invoked and the surfaced
    /// failure classifies as connectivity trouble.
    #[tokio::test]
    async fn test_execute_online_skips_operation_while_offline() {
        let counter = Arc::new(AtomicU32::new(0));
        let probe = FlagProbe::new(false);
        let executor = RetryExecutor::custom(
            3,
            Duration::from_millis(1),
            Duration::from_secs(1),
        )
        .unwrap();

        let result = executor
            .execute_online(&probe, counting_op(&counter, 0, SyncFailure::transport("unused")))
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.classify(), FailureKind::NetworkUnreachable);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    /// The connectivity-gated path shares the classified-retry rules: a
    /// non-retryable failure still propagates after one call.
    #[tokio::test]
    async fn test_execute_online_stops_on_non_retryable_failure() {
        let counter = Arc::new(AtomicU32::new(0));
        let probe = FlagProbe::new(true);
        let executor = RetryExecutor::custom(
            3,
            Duration::from_millis(1),
            Duration::from_secs(1),
        )
        .unwrap();

        let result = executor
            .execute_online(
                &probe,
                counting_op(&counter, u32::MAX, SyncFailure::http(403, "forbidden")),
            )
            .await;

        assert_eq!(result.unwrap_err(), SyncFailure::http(403, "forbidden"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_online_recovers_when_connectivity_returns() {
        let counter = Arc::new(AtomicU32::new(0));
        let probe = Arc::new(FlagProbe::new(false));
        let executor = RetryExecutor::custom(
            5,
            Duration::from_millis(20),
            Duration::from_secs(1),
        )
        .unwrap();

        let flipper = tokio::spawn({
            let probe = Arc::clone(&probe);
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                probe.set_connected(true);
            }
        });

        let result = executor
            .execute_online(
                probe.as_ref(),
                counting_op(&counter, 0, SyncFailure::transport("unused")),
            )
            .await;

        flipper.await.unwrap();
        assert_eq!(result.unwrap(), "success");
        // Invoked exactly once: every offline attempt was skipped.
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
