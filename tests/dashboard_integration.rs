//! Integration tests for the dashboard flows.
//!
//! These drive the public API end to end against a scripted transport on a
//! paused clock, so backoff and polling run in virtual time.

use std::time::Duration;

use serde_json::json;
use sentiview::testing::{FakeRenderer, RecordingReporter, ScriptedTransport};
use sentiview::{
    assert_request_error, AlertAction, ClientConfig, Dashboard, GuardState, LoadOutcome,
    PollOutcome, RequestError, Severity, SubmitOutcome, UploadForm,
};

fn form() -> UploadForm {
    UploadForm::new(
        "Kenaikan harga BBM",
        "bbm.csv",
        b"username,content,date\nandi,harga naik,2024-01-02\n".to_vec(),
    )
    .with_description("Reaksi warganet")
}

fn analysis() -> serde_json::Value {
    json!({
        "title": "Kenaikan harga BBM",
        "total_tweets": 120,
        "positive_count": 20,
        "neutral_count": 40,
        "negative_count": 60,
        "top_hashtags": [{"tag": "bbm", "count": 80}],
        "topics": [{"topic": "harga", "frequency": 50}],
        "tweets": []
    })
}

// ============================================================================
// Submission guard
// ============================================================================

#[tokio::test(start_paused = true)]
async fn two_rapid_submits_send_one_upload() {
    let transport =
        ScriptedTransport::new().then_delayed(Duration::from_secs(30), 200, analysis());
    let renderer = FakeRenderer::never_ready();
    let reporter = RecordingReporter::new();
    let dashboard =
        Dashboard::new(ClientConfig::default(), &transport, &renderer, &reporter).unwrap();

    let form = form();
    let (first, second) = tokio::join!(dashboard.submit(&form), dashboard.submit(&form));

    assert_eq!(first, SubmitOutcome::Completed);
    assert_eq!(second, SubmitOutcome::Rejected);
    assert_eq!(transport.request_count(), 1);
    assert_eq!(dashboard.guard().state(), GuardState::Idle);
    assert_eq!(renderer.redirects().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn guard_returns_to_idle_after_every_outcome() {
    let transport = ScriptedTransport::new()
        .then_respond(500, json!({"error": "model missing"}))
        .then_busy()
        .then_busy()
        .then_busy()
        .then_ok(analysis());
    let dashboard = Dashboard::new(
        ClientConfig::default(),
        &transport,
        FakeRenderer::never_ready(),
        RecordingReporter::new(),
    )
    .unwrap();

    let outcome = dashboard.submit(&form()).await;
    assert!(matches!(
        outcome,
        SubmitOutcome::Failed(RequestError::ServerError { status: 500, .. })
    ));
    assert_eq!(dashboard.guard().state(), GuardState::Idle);

    let outcome = dashboard.submit(&form()).await;
    assert!(matches!(
        outcome,
        SubmitOutcome::Failed(RequestError::ExhaustedRetries { attempts: 3, .. })
    ));
    assert_eq!(dashboard.guard().state(), GuardState::Idle);

    assert_eq!(dashboard.submit(&form()).await, SubmitOutcome::Completed);
    assert_eq!(transport.request_count(), 5);
}

// ============================================================================
// Lock remediation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn locked_fetch_then_unlock_then_submit() {
    let transport = ScriptedTransport::new()
        .then_locked(Some("u42"))
        .then_ok(json!({"status": "success", "message": "Lock checked"}))
        .then_ok(analysis());
    let renderer = FakeRenderer::ready_after(1);
    let reporter = RecordingReporter::new();
    let dashboard =
        Dashboard::new(ClientConfig::default(), &transport, &renderer, &reporter).unwrap();

    let outcome = dashboard.fetch_results().await;
    match outcome {
        LoadOutcome::Failed(error) => assert_eq!(error.lock_owner(), Some("u42")),
        other => panic!("Expected lock failure, got {:?}", other),
    }
    assert_eq!(transport.request_count(), 1);
    let alert = reporter.last_alert().unwrap();
    assert_eq!(alert.action, Some(AlertAction::ForceUnlock));
    assert!(!alert.auto_dismiss);

    dashboard.force_unlock().await.unwrap();
    assert!(transport.requests()[1].url.ends_with("/clean-lock"));
    assert_eq!(
        reporter.last_alert().map(|a| a.severity),
        Some(Severity::Success)
    );

    assert_eq!(dashboard.submit(&form()).await, SubmitOutcome::Completed);
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn unlock_failure_is_reported() {
    let transport = ScriptedTransport::new().then_respond(401, json!({"error": "login required"}));
    let dashboard = Dashboard::new(
        ClientConfig::default(),
        &transport,
        FakeRenderer::never_ready(),
        RecordingReporter::new(),
    )
    .unwrap();

    let result = dashboard.force_unlock().await;

    assert_request_error!(result, RequestError::ServerError { status: 401, .. });
    assert_eq!(
        dashboard.reporter().last_alert().map(|a| a.severity),
        Some(Severity::Danger)
    );
}

// ============================================================================
// Loading
// ============================================================================

#[tokio::test(start_paused = true)]
async fn busy_fetch_recovers_and_renders() {
    let transport = ScriptedTransport::new()
        .then_busy()
        .then_busy()
        .then_ok(analysis());
    let renderer = FakeRenderer::ready_after(2);
    let dashboard = Dashboard::new(
        ClientConfig::default(),
        &transport,
        &renderer,
        RecordingReporter::new(),
    )
    .unwrap();

    let start = tokio::time::Instant::now();
    let outcome = dashboard.fetch_results().await;

    assert!(matches!(
        outcome,
        LoadOutcome::Loaded {
            poll: PollOutcome::Ready { checks: 2 },
            ..
        }
    ));
    // 2 s + 4 s of backoff, 2.5 s settle, 1.5 s grace, one 500 ms interval.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(10_500));
    assert!(elapsed < Duration::from_millis(10_600));
    assert_eq!(renderer.rendered_titles(), vec!["Kenaikan harga BBM".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn second_load_supersedes_first_poll() {
    let transport = ScriptedTransport::new()
        .then_ok(analysis())
        .then_ok(analysis());
    let renderer = FakeRenderer::never_ready();
    let dashboard = Dashboard::new(
        ClientConfig::default(),
        &transport,
        &renderer,
        RecordingReporter::new(),
    )
    .unwrap();

    let second = async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        dashboard.fetch_results().await
    };
    let (first, second) = tokio::join!(dashboard.fetch_results(), second);

    assert!(matches!(
        first,
        LoadOutcome::Loaded {
            poll: PollOutcome::Superseded,
            ..
        }
    ));
    assert!(matches!(
        second,
        LoadOutcome::Loaded {
            poll: PollOutcome::TimedOut { checks: 30 },
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn network_failures_exhaust_into_danger_alert() {
    let transport = ScriptedTransport::new()
        .then_fail(sentiview::TransportError::Connection("refused".into()))
        .then_fail(sentiview::TransportError::Connection("refused".into()))
        .then_fail(sentiview::TransportError::Connection("refused".into()));
    let reporter = RecordingReporter::new();
    let dashboard = Dashboard::new(
        ClientConfig::default(),
        &transport,
        FakeRenderer::never_ready(),
        &reporter,
    )
    .unwrap();

    let outcome = dashboard.fetch_results().await;

    match outcome {
        LoadOutcome::Failed(RequestError::ExhaustedRetries { last_error, attempts }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last_error, RequestError::NetworkFailure { .. }));
        }
        other => panic!("Expected exhausted retries, got {:?}", other),
    }
    let alert = reporter.last_alert().unwrap();
    assert_eq!(alert.severity, Severity::Danger);
    assert!(alert.message.contains("3 attempts"));
    assert!(reporter
        .alerts()
        .iter()
        .any(|a| a.message.starts_with("The connection failed")));
}
