//! Integration tests for loading client configuration from JSON.

use std::time::Duration;

use sentiview::config::{ClientConfig, ConfigError};
use sentiview::testing::{FakeRenderer, RecordingReporter, ScriptedTransport};
use sentiview::{Dashboard, PollOptions};

#[test]
fn full_document_overrides_defaults() {
    let json = r#"{
        "endpoints": {
            "base_url": "https://sentiview.example.org",
            "results_page": "/results"
        },
        "upload": { "max_attempts": 4, "base_delay_ms": 1000, "max_delay_ms": 8000, "timeout_ms": 600000 },
        "fetch": { "jitter": 0.2 },
        "poll": { "initial_delay_ms": 0, "interval_ms": 250, "max_checks": 10 },
        "render_settle_ms": 1000,
        "overlay_deadline_ms": 15000
    }"#;

    let config = ClientConfig::from_json(json).unwrap();

    assert_eq!(config.endpoints.results_page, "/results");
    assert_eq!(config.endpoints.upload_path, "/upload");

    let upload = config.upload.to_policy();
    assert_eq!(upload.max_attempts(), 4);
    assert_eq!(upload.delay_for_attempt(3), Some(Duration::from_secs(4)));
    assert_eq!(upload.timeout(), Duration::from_secs(600));

    assert_eq!(
        config.poll.to_options(),
        PollOptions::new(Duration::from_millis(250), 10)
    );
    assert_eq!(config.overlay_deadline(), Duration::from_secs(15));
}

#[test]
fn config_serializes_back_to_equal_document() {
    let config = ClientConfig::default();
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(ClientConfig::from_json(&json).unwrap(), config);
}

#[test]
fn every_violation_is_reported() {
    let json = r#"{
        "unlock": { "timeout_ms": 0 },
        "chatbot": { "max_attempts": 0 },
        "overlay_deadline_ms": 0
    }"#;

    let errors = ClientConfig::from_json(json).unwrap_err();
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();

    assert_eq!(errors.len(), 3, "{:?}", messages);
    assert!(messages.contains(&"unlock.timeout_ms must be greater than zero".to_string()));
    assert!(messages.contains(&"chatbot.max_attempts must be at least 1".to_string()));
    assert!(messages.contains(&"overlay_deadline_ms must be greater than zero".to_string()));
}

#[test]
fn dashboard_refuses_invalid_config() {
    let mut config = ClientConfig::default();
    config.endpoints.base_url = "  ".to_string();

    let result = Dashboard::new(
        config,
        ScriptedTransport::new(),
        FakeRenderer::never_ready(),
        RecordingReporter::new(),
    );

    assert_eq!(result.unwrap_err(), vec![ConfigError::EmptyBaseUrl]);
}
