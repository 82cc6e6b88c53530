//! Client configuration: endpoints, per-operation retry policies and timing.
//!
//! Loaded from JSON. Every field has a default, so `{}` is a valid config
//! pointing at `http://localhost:5000`. Durations are milliseconds.
//!
//! ```rust
//! use sentiview::config::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::from_json(r#"{
//!     "endpoints": { "base_url": "https://sentiview.example.org/" },
//!     "fetch": { "max_attempts": 5, "base_delay_ms": 1000 }
//! }"#).unwrap();
//!
//! assert_eq!(
//!     config.endpoints.url(&config.endpoints.analysis_data_path),
//!     "https://sentiview.example.org/api/analysis-data"
//! );
//! assert_eq!(config.fetch.to_policy().max_attempts(), 5);
//! assert_eq!(config.upload.to_policy().timeout(), Duration::from_secs(300));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::poller::PollOptions;
use crate::retry::{JitterStrategy, RetryPolicy};

/// Server location and paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Scheme, host and port, with or without a trailing slash.
    pub base_url: String,
    /// CSV upload (multipart POST).
    pub upload_path: String,
    /// Analysis result (GET).
    pub analysis_data_path: String,
    /// Lock cleanup (GET).
    pub clean_lock_path: String,
    /// Chatbot (JSON POST).
    pub chatbot_path: String,
    /// Page the client navigates to after a successful upload.
    pub results_page: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            upload_path: "/upload".to_string(),
            analysis_data_path: "/api/analysis-data".to_string(),
            clean_lock_path: "/clean-lock".to_string(),
            chatbot_path: "/chatbot".to_string(),
            results_page: "/hasil-analisis".to_string(),
        }
    }
}

impl Endpoints {
    /// Join `path` onto the base URL with exactly one slash between them.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Serializable form of a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Total attempts, at least one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay_ms: u64,
    /// Backoff cap.
    pub max_delay_ms: u64,
    /// Per-attempt timeout.
    pub timeout_ms: u64,
    /// Proportional jitter factor in `0.0..=1.0`; none when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter: Option<f64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 10_000,
            timeout_ms: 90_000,
            jitter: None,
        }
    }
}

impl PolicyConfig {
    fn with_timeout_ms(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            ..Self::default()
        }
    }

    fn single_attempt(timeout_ms: u64) -> Self {
        Self {
            max_attempts: 1,
            ..Self::with_timeout_ms(timeout_ms)
        }
    }

    /// Build the runtime policy.
    pub fn to_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::exponential(Duration::from_millis(self.base_delay_ms))
            .with_max_attempts(self.max_attempts)
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_timeout(Duration::from_millis(self.timeout_ms));
        match self.jitter {
            Some(factor) if factor > 0.0 => policy.with_jitter(factor),
            _ => policy,
        }
    }

    fn check(&self, operation: &'static str, errors: &mut Vec<ConfigError>) {
        if self.max_attempts == 0 {
            errors.push(ConfigError::ZeroAttempts { operation });
        }
        if self.base_delay_ms == 0 && self.max_attempts > 1 {
            errors.push(ConfigError::ZeroDuration {
                field: format!("{}.base_delay_ms", operation),
            });
        }
        if self.timeout_ms == 0 {
            errors.push(ConfigError::ZeroDuration {
                field: format!("{}.timeout_ms", operation),
            });
        }
        if self.max_delay_ms < self.base_delay_ms {
            errors.push(ConfigError::CapBelowBase {
                operation,
                base_delay_ms: self.base_delay_ms,
                max_delay_ms: self.max_delay_ms,
            });
        }
        if let Some(factor) = self.jitter {
            if !(0.0..=1.0).contains(&factor) {
                errors.push(ConfigError::JitterOutOfRange { operation, factor });
            }
        }
    }
}

impl From<&RetryPolicy> for PolicyConfig {
    fn from(policy: &RetryPolicy) -> Self {
        let jitter = match policy.jitter() {
            JitterStrategy::Proportional(factor) => Some(*factor),
            JitterStrategy::Full => Some(1.0),
            JitterStrategy::None => None,
        };
        Self {
            max_attempts: policy.max_attempts(),
            base_delay_ms: policy.base_delay().as_millis() as u64,
            max_delay_ms: policy.max_delay().as_millis() as u64,
            timeout_ms: policy.timeout().as_millis() as u64,
            jitter,
        }
    }
}

/// Serializable form of [`PollOptions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Grace period before the first check.
    pub initial_delay_ms: u64,
    /// Pause between checks.
    pub interval_ms: u64,
    /// Check budget.
    pub max_checks: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        let options = PollOptions::default();
        Self {
            initial_delay_ms: options.initial_delay.as_millis() as u64,
            interval_ms: options.interval.as_millis() as u64,
            max_checks: options.max_checks,
        }
    }
}

impl PollConfig {
    /// Build the runtime options.
    pub fn to_options(&self) -> PollOptions {
        PollOptions::new(Duration::from_millis(self.interval_ms), self.max_checks)
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
    }
}

/// Everything the dashboard client needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server endpoints.
    pub endpoints: Endpoints,
    /// CSV upload: analysis runs inside the request, hence the long timeout.
    pub upload: PolicyConfig,
    /// Analysis fetch.
    pub fetch: PolicyConfig,
    /// Lock cleanup.
    pub unlock: PolicyConfig,
    /// Chatbot question.
    pub chatbot: PolicyConfig,
    /// Readiness polling after render.
    pub poll: PollConfig,
    /// Pause between handing the payload to the renderer and the first poll.
    pub render_settle_ms: u64,
    /// Upper bound on how long the loading overlay stays up.
    pub overlay_deadline_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            upload: PolicyConfig::with_timeout_ms(300_000),
            fetch: PolicyConfig::with_timeout_ms(180_000),
            unlock: PolicyConfig::single_attempt(30_000),
            chatbot: PolicyConfig::single_attempt(60_000),
            poll: PollConfig::default(),
            render_settle_ms: 2_500,
            overlay_deadline_ms: 25_000,
        }
    }
}

impl ClientConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, Vec<ConfigError>> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| vec![ConfigError::Parse(e.to_string())])?;
        config.validate()?;
        Ok(config)
    }

    /// Check every bound, reporting all violations at once.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.endpoints.base_url.trim().is_empty() {
            errors.push(ConfigError::EmptyBaseUrl);
        }
        self.upload.check("upload", &mut errors);
        self.fetch.check("fetch", &mut errors);
        self.unlock.check("unlock", &mut errors);
        self.chatbot.check("chatbot", &mut errors);
        if self.poll.max_checks == 0 {
            errors.push(ConfigError::ZeroChecks);
        }
        if self.overlay_deadline_ms == 0 {
            errors.push(ConfigError::ZeroDuration {
                field: "overlay_deadline_ms".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Render settle delay.
    pub fn render_settle(&self) -> Duration {
        Duration::from_millis(self.render_settle_ms)
    }

    /// Overlay deadline.
    pub fn overlay_deadline(&self) -> Duration {
        Duration::from_millis(self.overlay_deadline_ms)
    }
}

/// A configuration problem.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The document is not valid JSON or has the wrong shape.
    Parse(String),
    /// `endpoints.base_url` is empty.
    EmptyBaseUrl,
    /// A policy allows no attempts.
    ZeroAttempts {
        /// Operation name.
        operation: &'static str,
    },
    /// A duration that must be positive is zero.
    ZeroDuration {
        /// Dotted field path.
        field: String,
    },
    /// `max_delay_ms` is smaller than `base_delay_ms`.
    CapBelowBase {
        /// Operation name.
        operation: &'static str,
        /// Configured base delay.
        base_delay_ms: u64,
        /// Configured cap.
        max_delay_ms: u64,
    },
    /// Jitter factor outside `0.0..=1.0`.
    JitterOutOfRange {
        /// Operation name.
        operation: &'static str,
        /// Configured factor.
        factor: f64,
    },
    /// `poll.max_checks` is zero.
    ZeroChecks,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "invalid config: {}", message),
            Self::EmptyBaseUrl => write!(f, "endpoints.base_url must not be empty"),
            Self::ZeroAttempts { operation } => {
                write!(f, "{}.max_attempts must be at least 1", operation)
            }
            Self::ZeroDuration { field } => write!(f, "{} must be greater than zero", field),
            Self::CapBelowBase {
                operation,
                base_delay_ms,
                max_delay_ms,
            } => write!(
                f,
                "{}.max_delay_ms ({}) is below base_delay_ms ({})",
                operation, max_delay_ms, base_delay_ms
            ),
            Self::JitterOutOfRange { operation, factor } => {
                write!(f, "{}.jitter ({}) must be within 0.0..=1.0", operation, factor)
            }
            Self::ZeroChecks => write!(f, "poll.max_checks must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ClientConfig::from_json("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.fetch.to_policy().timeout(), Duration::from_secs(180));
        assert_eq!(config.unlock.to_policy().max_attempts(), 1);
        assert_eq!(config.poll.to_options(), PollOptions::default());
        assert_eq!(config.render_settle(), Duration::from_millis(2500));
        assert_eq!(config.overlay_deadline(), Duration::from_secs(25));
    }

    #[test]
    fn test_url_joining() {
        let endpoints = Endpoints {
            base_url: "http://host:8080/".to_string(),
            ..Endpoints::default()
        };
        assert_eq!(endpoints.url("/upload"), "http://host:8080/upload");
        assert_eq!(endpoints.url("chatbot"), "http://host:8080/chatbot");
    }

    #[test]
    fn test_validation_accumulates_errors() {
        let json = r#"{
            "endpoints": { "base_url": "" },
            "upload": { "max_attempts": 0 },
            "fetch": { "base_delay_ms": 20000, "max_delay_ms": 1000, "jitter": 1.5 },
            "poll": { "max_checks": 0 }
        }"#;

        let errors = ClientConfig::from_json(json).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ConfigError::EmptyBaseUrl));
        assert!(errors.contains(&ConfigError::ZeroAttempts {
            operation: "upload"
        }));
        assert!(errors.contains(&ConfigError::ZeroChecks));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::CapBelowBase { operation: "fetch", .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::JitterOutOfRange { operation: "fetch", .. })));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let errors = ClientConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(errors.as_slice(), [ConfigError::Parse(_)]));
        assert!(errors[0].to_string().starts_with("invalid config"));
    }

    #[test]
    fn test_policy_round_trips_through_config() {
        let policy = RetryPolicy::exponential(Duration::from_millis(500))
            .with_max_attempts(4)
            .with_max_delay(Duration::from_secs(4))
            .with_timeout(Duration::from_secs(20));
        let config = PolicyConfig::from(&policy);
        assert_eq!(config.to_policy(), policy);
    }
}
