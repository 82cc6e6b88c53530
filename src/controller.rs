//! Bounded-retry execution of one logical HTTP operation.
//!
//! [`RequestController`] owns a [`Transport`] and runs a request under a
//! [`RetryPolicy`]:
//!
//! - every attempt is raced against the policy timeout and the caller's
//!   [`CancellationToken`];
//! - each failure is classified once by [`RetryDecision::classify`];
//! - retryable failures sleep through an exponential backoff that reports a
//!   countdown to the [`RequestObserver`];
//! - a held lock returns immediately so the caller can offer an unlock.
//!
//! Attempts of one operation are strictly sequential. Dropping the returned
//! future drops the in-flight attempt and any pending timer with it.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::RequestError;
use crate::retry::{RetryDecision, RetryEvent, RetryPolicy};
use crate::wire::{self, HttpRequest, Transport};

/// Granularity of the backoff countdown reported to observers.
pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Receives status updates from the retry loop.
///
/// All methods have empty defaults. Calls are synchronous and happen on the
/// task running the request, so implementations should not block.
pub trait RequestObserver {
    /// An attempt is about to be dispatched (1-indexed).
    fn on_attempt(&self, _attempt: u32, _max_attempts: u32) {}

    /// An attempt failed and will be retried after `event.next_delay`.
    fn on_retry(&self, _event: &RetryEvent<'_>) {}

    /// Backoff in progress; `remaining` is the time left before the next attempt.
    fn on_backoff_tick(&self, _remaining: Duration) {}
}

/// An observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RequestObserver for NoopObserver {}

/// Executes requests with timeout, backoff and typed failure classification.
///
/// # Examples
///
/// ```rust
/// use sentiview::testing::ScriptedTransport;
/// use sentiview::wire::HttpRequest;
/// use sentiview::{RequestController, RetryPolicy};
/// use serde_json::json;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let transport = ScriptedTransport::new().then_ok(json!({"total_tweets": 3}));
/// let controller = RequestController::new(transport.clone());
///
/// let payload = controller
///     .execute(
///         &HttpRequest::get("http://localhost/api/analysis-data"),
///         &RetryPolicy::exponential(Duration::from_millis(10)),
///     )
///     .await
///     .unwrap();
///
/// assert_eq!(payload["total_tweets"], 3);
/// assert_eq!(transport.request_count(), 1);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct RequestController<T> {
    transport: T,
}

impl<T: Transport> RequestController<T> {
    /// Create a controller around a transport.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run `request` under `policy` without cancellation or observer.
    pub async fn execute(
        &self,
        request: &HttpRequest,
        policy: &RetryPolicy,
    ) -> Result<Value, RequestError> {
        self.execute_with(request, policy, &CancellationToken::new(), &NoopObserver)
            .await
    }

    /// Run `request` and decode the JSON payload into `D`.
    pub async fn execute_json<D, O>(
        &self,
        request: &HttpRequest,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
        observer: &O,
    ) -> Result<D, RequestError>
    where
        D: DeserializeOwned,
        O: RequestObserver + ?Sized,
    {
        let value = self.execute_with(request, policy, cancel, observer).await?;
        serde_json::from_value(value).map_err(|e| RequestError::InvalidPayload {
            message: e.to_string(),
        })
    }

    /// Run `request` under `policy`.
    ///
    /// Returns the decoded JSON body of the first successful attempt, or the
    /// terminal error:
    ///
    /// - [`RequestError::ResourceLocked`] after the attempt that saw the lock;
    /// - [`RequestError::ExhaustedRetries`] once `max_attempts` retryable
    ///   failures happened in a row;
    /// - [`RequestError::Cancelled`] as soon as `cancel` fires, whether during
    ///   an attempt or a backoff;
    /// - any other error unchanged after a single attempt.
    pub async fn execute_with<O>(
        &self,
        request: &HttpRequest,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
        observer: &O,
    ) -> Result<Value, RequestError>
    where
        O: RequestObserver + ?Sized,
    {
        let span = tracing::info_span!(
            "request",
            method = %request.method,
            url = %request.url,
            max_attempts = policy.max_attempts()
        );

        async move {
            let start = Instant::now();
            let mut attempt = 1u32;

            loop {
                if cancel.is_cancelled() {
                    tracing::info!(attempt, "request cancelled before dispatch");
                    return Err(RequestError::Cancelled);
                }

                observer.on_attempt(attempt, policy.max_attempts());
                tracing::debug!(attempt, "dispatching attempt");

                let error = match self.attempt(request, policy, cancel).await {
                    Ok(value) => {
                        tracing::info!(
                            attempt,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "request succeeded"
                        );
                        return Ok(value);
                    }
                    Err(RequestError::Cancelled) => {
                        tracing::info!(attempt, "request cancelled in flight");
                        return Err(RequestError::Cancelled);
                    }
                    Err(error) => error,
                };

                match RetryDecision::classify(&error, attempt, policy) {
                    RetryDecision::Retry(delay) => {
                        tracing::warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "attempt failed, retrying after backoff"
                        );
                        observer.on_retry(&RetryEvent {
                            attempt,
                            max_attempts: policy.max_attempts(),
                            error: &error,
                            next_delay: delay,
                            elapsed: start.elapsed(),
                        });
                        if let Err(cancelled) = backoff(delay, cancel, observer).await {
                            tracing::info!(attempt, "request cancelled during backoff");
                            return Err(cancelled);
                        }
                        attempt += 1;
                    }
                    RetryDecision::RequireUserAction(owner) => {
                        tracing::warn!(
                            attempt,
                            owner = owner.as_deref().unwrap_or("unknown"),
                            "resource locked, unlock required"
                        );
                        return Err(error);
                    }
                    RetryDecision::Fail(terminal) => {
                        tracing::info!(attempt, error = %terminal, "request failed");
                        return Err(terminal);
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// One attempt: dispatch, enforce the timeout, classify the response.
    async fn attempt(
        &self,
        request: &HttpRequest,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<Value, RequestError> {
        let timeout = policy.timeout();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RequestError::Cancelled),
            outcome = tokio::time::timeout(timeout, self.transport.send(request)) => outcome,
        };

        match outcome {
            Ok(Ok(response)) => wire::classify(&response),
            Ok(Err(transport)) => Err(transport.into_request_error(timeout)),
            Err(_) => Err(RequestError::Timeout { duration: timeout }),
        }
    }
}

/// Sleep for `delay`, ticking the observer countdown, unless `cancel` fires.
async fn backoff<O>(
    delay: Duration,
    cancel: &CancellationToken,
    observer: &O,
) -> Result<(), RequestError>
where
    O: RequestObserver + ?Sized,
{
    let deadline = Instant::now() + delay;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        let remaining = deadline - now;
        observer.on_backoff_tick(remaining);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RequestError::Cancelled),
            _ = tokio::time::sleep_until(now + remaining.min(COUNTDOWN_TICK)) => {}
        }
    }
}

#[cfg(test)]
mod controller_tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use serde_json::json;
    use std::sync::Mutex;

    fn request() -> HttpRequest {
        HttpRequest::get("http://localhost/api/analysis-data")
    }

    #[derive(Default)]
    struct Recorder {
        attempts: Mutex<Vec<u32>>,
        delays: Mutex<Vec<Duration>>,
        ticks: Mutex<Vec<Duration>>,
    }

    impl RequestObserver for Recorder {
        fn on_attempt(&self, attempt: u32, _max_attempts: u32) {
            self.attempts.lock().unwrap().push(attempt);
        }

        fn on_retry(&self, event: &RetryEvent<'_>) {
            self.delays.lock().unwrap().push(event.next_delay);
        }

        fn on_backoff_tick(&self, remaining: Duration) {
            self.ticks.lock().unwrap().push(remaining);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_busy_responses_exhaust_with_doubling_delays() {
        let transport = ScriptedTransport::new()
            .then_busy()
            .then_busy()
            .then_busy();
        let controller = RequestController::new(transport.clone());
        let policy = RetryPolicy::exponential(Duration::from_millis(2000)).with_max_attempts(3);
        let recorder = Recorder::default();

        let result = controller
            .execute_with(&request(), &policy, &CancellationToken::new(), &recorder)
            .await;

        assert!(matches!(
            result,
            Err(RequestError::ExhaustedRetries { attempts: 3, .. })
        ));
        assert_eq!(transport.request_count(), 3);
        assert_eq!(
            *recorder.delays.lock().unwrap(),
            vec![Duration::from_millis(2000), Duration::from_millis(4000)]
        );
        assert_eq!(*recorder.attempts.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_counts_down_in_whole_ticks() {
        let transport = ScriptedTransport::new()
            .then_busy()
            .then_ok(json!({"ok": true}));
        let controller = RequestController::new(transport);
        let policy = RetryPolicy::exponential(Duration::from_millis(2500));
        let recorder = Recorder::default();

        controller
            .execute_with(&request(), &policy, &CancellationToken::new(), &recorder)
            .await
            .unwrap();

        let ticks = recorder.ticks.lock().unwrap().clone();
        let expected = [2500u64, 1500, 500];
        assert_eq!(ticks.len(), expected.len());
        for (tick, ms) in ticks.iter().zip(expected) {
            let diff = tick.as_millis().abs_diff(u128::from(ms));
            assert!(diff <= 5, "tick {:?} too far from {}ms", tick, ms);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_returns_after_single_attempt() {
        let transport = ScriptedTransport::new()
            .then_locked(Some("u42"))
            .then_ok(json!({}));
        let controller = RequestController::new(transport.clone());

        let result = controller
            .execute(
                &request(),
                &RetryPolicy::exponential(Duration::from_millis(100)).with_max_attempts(5),
            )
            .await;

        assert_eq!(result.unwrap_err().lock_owner(), Some("u42"));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_attempt_times_out_then_retries() {
        let transport = ScriptedTransport::new()
            .then_hang()
            .then_ok(json!({"title": "ok"}));
        let controller = RequestController::new(transport.clone());
        let policy = RetryPolicy::exponential(Duration::from_millis(100))
            .with_timeout(Duration::from_secs(5));

        let start = Instant::now();
        let value = controller.execute(&request(), &policy).await.unwrap();

        assert_eq!(value["title"], "ok");
        assert_eq!(transport.request_count(), 2);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(5100));
        assert!(elapsed < Duration::from_millis(5200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_distinct_from_network_failure() {
        let transport = ScriptedTransport::new().then_hang();
        let controller = RequestController::new(transport);
        let policy = RetryPolicy::single_attempt(Duration::from_secs(3));

        let result = controller.execute(&request(), &policy).await;
        match result {
            Err(RequestError::ExhaustedRetries { last_error, .. }) => {
                assert_eq!(
                    *last_error,
                    RequestError::Timeout {
                        duration: Duration::from_secs(3)
                    }
                );
            }
            other => panic!("Expected exhausted timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_is_not_retried() {
        let transport = ScriptedTransport::new()
            .then_respond(500, json!({"error": "boom"}))
            .then_ok(json!({}));
        let controller = RequestController::new(transport.clone());

        let result = controller
            .execute(&request(), &RetryPolicy::exponential(Duration::from_millis(10)))
            .await;

        assert_eq!(
            result,
            Err(RequestError::ServerError {
                status: 500,
                message: "boom".into()
            })
        );
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let transport = ScriptedTransport::new().then_busy().then_ok(json!({}));
        let controller = RequestController::new(transport.clone());
        let policy = RetryPolicy::exponential(Duration::from_secs(8));
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(2)).await;
                cancel.cancel();
            }
        };

        let request = request();
        let (result, ()) = tokio::join!(
            controller.execute_with(&request, &policy, &cancel, &NoopObserver),
            canceller
        );

        assert_eq!(result, Err(RequestError::Cancelled));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_in_flight_attempt() {
        let transport = ScriptedTransport::new().then_hang();
        let controller = RequestController::new(transport);
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cancel.cancel();
            }
        };

        let request = request();
        let policy = RetryPolicy::exponential(Duration::from_millis(10));
        let (result, ()) = tokio::join!(
            controller.execute_with(&request, &policy, &cancel, &NoopObserver),
            canceller
        );

        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_already_cancelled_token_sends_nothing() {
        let transport = ScriptedTransport::new().then_ok(json!({}));
        let controller = RequestController::new(transport.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = controller
            .execute_with(
                &request(),
                &RetryPolicy::exponential(Duration::from_millis(10)),
                &cancel,
                &NoopObserver,
            )
            .await;

        assert_eq!(result, Err(RequestError::Cancelled));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_json_reports_decode_failure() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Reply {
            response: String,
        }

        let transport = ScriptedTransport::new().then_ok(json!({"unexpected": 1}));
        let controller = RequestController::new(transport);

        let result: Result<Reply, _> = controller
            .execute_json(
                &HttpRequest::post_json("http://localhost/chatbot", json!({"message": "hi"})),
                &RetryPolicy::single_attempt(Duration::from_secs(5)),
                &CancellationToken::new(),
                &NoopObserver,
            )
            .await;

        assert!(matches!(result, Err(RequestError::InvalidPayload { .. })));
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn test_retries_are_logged() {
        let transport = ScriptedTransport::new().then_busy().then_ok(json!({}));
        let controller = RequestController::new(transport);

        controller
            .execute(&request(), &RetryPolicy::exponential(Duration::from_millis(10)))
            .await
            .unwrap();

        assert!(logs_contain("attempt failed, retrying after backoff"));
        assert!(logs_contain("request succeeded"));
    }
}
