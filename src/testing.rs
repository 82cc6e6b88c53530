//! Testing utilities for code built on sentiview.
//!
//! This module provides scripted fakes for the three seams of the dashboard,
//! an assertion macro for request errors, and property-testing strategies.
//!
//! # Examples
//!
//! ## Scripted transport
//!
//! ```rust
//! use sentiview::testing::ScriptedTransport;
//! use sentiview::wire::HttpRequest;
//! use sentiview::{RequestController, RetryPolicy};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let transport = ScriptedTransport::new()
//!     .then_busy()
//!     .then_ok(json!({"status": "success"}));
//! let controller = RequestController::new(transport.clone());
//!
//! let policy = RetryPolicy::exponential(Duration::from_millis(1));
//! controller
//!     .execute(&HttpRequest::get("http://localhost/clean-lock"), &policy)
//!     .await
//!     .unwrap();
//!
//! assert_eq!(transport.request_count(), 2);
//! # });
//! ```
//!
//! ## Assertion macro
//!
//! ```rust
//! use sentiview::{assert_request_error, RequestError};
//!
//! let result: Result<(), RequestError> = Err(RequestError::ServerBusy { message: None });
//! assert_request_error!(result, RequestError::ServerBusy { .. });
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::{json, Value};

use crate::dashboard::{OverlayOutcome, Renderer};
use crate::error::TransportError;
use crate::payload::AnalysisPayload;
use crate::report::{Alert, StatusReporter};
use crate::wire::{HttpRequest, HttpResponse, Transport, LOCK_SENTINEL};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// One scripted transport reaction.
#[derive(Debug, Clone)]
enum Scripted {
    Respond(HttpResponse),
    RespondAfter(Duration, HttpResponse),
    Fail(TransportError),
    Hang,
}

#[derive(Debug, Default)]
struct Script {
    steps: VecDeque<Scripted>,
    fallback: Option<Scripted>,
    requests: Vec<HttpRequest>,
}

/// A [`Transport`] that replays a fixed script of responses.
///
/// Every call records the request, then consumes the next scripted step.
/// Once the script is exhausted the fallback set with
/// [`ScriptedTransport::otherwise`] is used, or a connection error if there
/// is none. Clones share the script and the request log.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    /// Create a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, step: Scripted) -> Self {
        locked(&self.script).steps.push_back(step);
        self
    }

    /// Respond with any status and JSON body.
    pub fn then_respond(self, status: u16, body: Value) -> Self {
        self.push(Scripted::Respond(HttpResponse::json(status, &body)))
    }

    /// Respond `200` with `body`.
    pub fn then_ok(self, body: Value) -> Self {
        self.then_respond(200, body)
    }

    /// Respond `429` without the lock sentinel.
    pub fn then_busy(self) -> Self {
        self.then_respond(
            429,
            json!({"error": "A previous request is still being processed."}),
        )
    }

    /// Respond `429` with the lock sentinel and an optional owner.
    pub fn then_locked(self, owner: Option<&str>) -> Self {
        let mut body = json!({
            "code": LOCK_SENTINEL,
            "error": "An analysis is already running for this user.",
        });
        if let Some(owner) = owner {
            body["user_id"] = json!(owner);
        }
        self.then_respond(429, body)
    }

    /// Respond after `delay`.
    pub fn then_delayed(self, delay: Duration, status: u16, body: Value) -> Self {
        self.push(Scripted::RespondAfter(
            delay,
            HttpResponse::json(status, &body),
        ))
    }

    /// Fail below the HTTP layer.
    pub fn then_fail(self, error: TransportError) -> Self {
        self.push(Scripted::Fail(error))
    }

    /// Never respond.
    pub fn then_hang(self) -> Self {
        self.push(Scripted::Hang)
    }

    /// Respond `status` with `body` whenever the script is exhausted.
    pub fn otherwise(self, status: u16, body: Value) -> Self {
        locked(&self.script).fallback = Some(Scripted::Respond(HttpResponse::json(status, &body)));
        self
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        locked(&self.script).requests.len()
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        locked(&self.script).requests.clone()
    }

    /// Number of scripted steps not yet consumed.
    pub fn remaining(&self) -> usize {
        locked(&self.script).steps.len()
    }
}

impl Transport for ScriptedTransport {
    fn send(
        &self,
        request: &HttpRequest,
    ) -> impl std::future::Future<Output = Result<HttpResponse, TransportError>> {
        let step = {
            let mut script = locked(&self.script);
            script.requests.push(request.clone());
            let fallback = script.fallback.clone();
            script.steps.pop_front().or(fallback)
        };

        async move {
            match step {
                Some(Scripted::Respond(response)) => Ok(response),
                Some(Scripted::RespondAfter(delay, response)) => {
                    tokio::time::sleep(delay).await;
                    Ok(response)
                }
                Some(Scripted::Fail(error)) => Err(error),
                Some(Scripted::Hang) => futures::future::pending().await,
                None => Err(TransportError::Connection(
                    "scripted transport has no response left".to_string(),
                )),
            }
        }
    }
}

/// A [`StatusReporter`] that records everything it receives.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    progress: Mutex<Vec<(u8, String)>>,
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingReporter {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Progress reports as `(step, message)`.
    pub fn progress(&self) -> Vec<(u8, String)> {
        locked(&self.progress).clone()
    }

    /// Progress messages only.
    pub fn progress_messages(&self) -> Vec<String> {
        locked(&self.progress)
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Alerts in order.
    pub fn alerts(&self) -> Vec<Alert> {
        locked(&self.alerts).clone()
    }

    /// The most recent alert.
    pub fn last_alert(&self) -> Option<Alert> {
        locked(&self.alerts).last().cloned()
    }
}

impl StatusReporter for RecordingReporter {
    fn report_progress(&self, step: u8, message: &str) {
        locked(&self.progress).push((step, message.to_string()));
    }

    fn report_alert(&self, alert: Alert) {
        locked(&self.alerts).push(alert);
    }
}

/// A [`Renderer`] that becomes ready after a fixed number of checks.
#[derive(Debug)]
pub struct FakeRenderer {
    ready_after: Option<u32>,
    checks: Mutex<u32>,
    rendered: Mutex<Vec<String>>,
    dismissals: Mutex<Vec<OverlayOutcome>>,
    redirects: Mutex<Vec<String>>,
}

impl FakeRenderer {
    fn with_threshold(ready_after: Option<u32>) -> Self {
        Self {
            ready_after,
            checks: Mutex::new(0),
            rendered: Mutex::new(Vec::new()),
            dismissals: Mutex::new(Vec::new()),
            redirects: Mutex::new(Vec::new()),
        }
    }

    /// Ready on the `checks`-th readiness check.
    pub fn ready_after(checks: u32) -> Self {
        Self::with_threshold(Some(checks))
    }

    /// Never ready.
    pub fn never_ready() -> Self {
        Self::with_threshold(None)
    }

    /// Readiness checks made so far.
    pub fn checks(&self) -> u32 {
        *locked(&self.checks)
    }

    /// Titles of rendered payloads.
    pub fn rendered_titles(&self) -> Vec<String> {
        locked(&self.rendered).clone()
    }

    /// Overlay dismissals in order.
    pub fn dismissals(&self) -> Vec<OverlayOutcome> {
        locked(&self.dismissals).clone()
    }

    /// Redirect targets in order.
    pub fn redirects(&self) -> Vec<String> {
        locked(&self.redirects).clone()
    }
}

impl Renderer for FakeRenderer {
    fn render_payload(&self, payload: &AnalysisPayload) {
        locked(&self.rendered).push(payload.title.clone());
    }

    fn is_render_complete(&self) -> bool {
        let mut checks = locked(&self.checks);
        *checks += 1;
        self.ready_after.is_some_and(|n| *checks >= n)
    }

    fn dismiss_overlay(&self, outcome: OverlayOutcome) {
        locked(&self.dismissals).push(outcome);
    }

    fn redirect(&self, path: &str) {
        locked(&self.redirects).push(path.to_string());
    }
}

/// Assert that a result is an `Err` matching a [`crate::RequestError`] pattern.
///
/// # Example
///
/// ```rust
/// use sentiview::{assert_request_error, RequestError};
///
/// let result: Result<(), RequestError> = Err(RequestError::ServerError {
///     status: 500,
///     message: "boom".into(),
/// });
/// assert_request_error!(result, RequestError::ServerError { status: 500, .. });
/// ```
#[macro_export]
macro_rules! assert_request_error {
    ($result:expr, $pattern:pat $(if $guard:expr)?) => {
        match $result {
            Err(e) => {
                assert!(
                    matches!(e, $pattern $(if $guard)?),
                    "Expected Err({}), got Err({:?})",
                    stringify!($pattern),
                    e
                );
            }
            Ok(v) => {
                panic!("Expected Err({}), got Ok({:?})", stringify!($pattern), v);
            }
        }
    };
}

#[cfg(feature = "proptest")]
use proptest::prelude::*;

/// Any single-attempt failure the server or network can produce.
#[cfg(feature = "proptest")]
pub fn arb_attempt_error() -> impl Strategy<Value = crate::RequestError> {
    use crate::RequestError;

    prop_oneof![
        (1u64..600).prop_map(|secs| RequestError::Timeout {
            duration: Duration::from_secs(secs)
        }),
        ".{0,20}".prop_map(|message| RequestError::NetworkFailure { message }),
        proptest::option::of(".{0,20}").prop_map(|message| RequestError::ServerBusy { message }),
        proptest::option::of("u[0-9]{1,4}").prop_map(|owner_id| RequestError::ResourceLocked {
            owner_id,
            message: None
        }),
        (400u16..600)
            .prop_filter("429 is busy or locked", |s| *s != 429)
            .prop_map(|status| RequestError::ServerError {
                status,
                message: format!("HTTP status {}", status)
            }),
    ]
}

/// Retry policies with 1 to 8 attempts and delays up to a minute.
#[cfg(feature = "proptest")]
pub fn arb_policy() -> impl Strategy<Value = crate::RetryPolicy> {
    (1u32..=8, 1u64..5_000, 1u64..60_000).prop_map(|(attempts, base_ms, cap_ms)| {
        crate::RetryPolicy::exponential(Duration::from_millis(base_ms))
            .with_max_attempts(attempts)
            .with_max_delay(Duration::from_millis(cap_ms.max(base_ms)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestError;

    #[tokio::test]
    async fn scripted_transport_replays_in_order() {
        let transport = ScriptedTransport::new()
            .then_busy()
            .then_ok(json!({"n": 1}));
        let request = HttpRequest::get("http://localhost/a");

        let first = transport.send(&request).await.unwrap();
        let second = transport.send(&request).await.unwrap();
        let third = transport.send(&request).await;

        assert_eq!(first.status, 429);
        assert_eq!(second.status, 200);
        assert!(matches!(third, Err(TransportError::Connection(_))));
        assert_eq!(transport.request_count(), 3);
        assert_eq!(transport.remaining(), 0);
    }

    #[tokio::test]
    async fn scripted_transport_fallback() {
        let transport = ScriptedTransport::new().otherwise(200, json!({}));
        let request = HttpRequest::get("http://localhost/a");
        for _ in 0..3 {
            assert!(transport.send(&request).await.unwrap().is_success());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scripted_transport_delay() {
        let transport =
            ScriptedTransport::new().then_delayed(Duration::from_secs(2), 200, json!({}));
        let start = tokio::time::Instant::now();
        transport
            .send(&HttpRequest::get("http://localhost/a"))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[test]
    fn scripted_transport_records_before_polling() {
        let transport = ScriptedTransport::new().then_hang();
        let request = HttpRequest::get("http://localhost/a");
        let pending = transport.send(&request);
        assert_eq!(transport.request_count(), 1);
        drop(pending);
    }

    #[test]
    fn fake_renderer_ready_threshold() {
        let renderer = FakeRenderer::ready_after(2);
        assert!(!renderer.is_render_complete());
        assert!(renderer.is_render_complete());
        assert_eq!(renderer.checks(), 2);

        assert!(!FakeRenderer::never_ready().is_render_complete());
    }

    #[test]
    fn recording_reporter() {
        let reporter = RecordingReporter::new();
        reporter.report_progress(1, "a");
        reporter.report_alert(Alert::info("b"));
        assert_eq!(reporter.progress(), vec![(1, "a".to_string())]);
        assert_eq!(reporter.last_alert().map(|a| a.message), Some("b".to_string()));
    }

    #[test]
    fn assert_request_error_macro() {
        let result: Result<(), RequestError> = Err(RequestError::Cancelled);
        assert_request_error!(result, RequestError::Cancelled);
    }

    #[test]
    fn assert_request_error_macro_with_guard() {
        let result: Result<(), RequestError> = Err(RequestError::ServerError {
            status: 503,
            message: "down".into(),
        });
        assert_request_error!(result, RequestError::ServerError { status, .. } if status >= 500);
    }

    #[test]
    #[should_panic(expected = "Expected Err(RequestError::Cancelled), got Ok")]
    fn assert_request_error_panics_on_ok() {
        let result: Result<u8, RequestError> = Ok(1);
        assert_request_error!(result, RequestError::Cancelled);
    }

    #[test]
    #[should_panic(expected = "Expected Err(RequestError::Cancelled), got Err")]
    fn assert_request_error_panics_on_other_error() {
        let result: Result<(), RequestError> = Err(RequestError::ServerBusy { message: None });
        assert_request_error!(result, RequestError::Cancelled);
    }

    #[cfg(feature = "proptest")]
    mod proptest_tests {
        use super::*;
        use crate::retry::RetryDecision;

        proptest! {
            #[test]
            fn lock_is_the_only_user_action(error in arb_attempt_error(), policy in arb_policy()) {
                let decision = RetryDecision::classify(&error, 1, &policy);
                prop_assert_eq!(
                    matches!(decision, RetryDecision::RequireUserAction(_)),
                    error.is_locked()
                );
            }
        }
    }
}
