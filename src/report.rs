//! The status surface: progress steps and user-facing alerts.
//!
//! The dashboard never touches UI state directly. Everything the user sees
//! about a request goes through a [`StatusReporter`].

/// Severity of an alert, mirroring the usual contextual colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Neutral information.
    Info,
    /// Operation succeeded.
    Success,
    /// Recoverable problem, or a soft caveat.
    Warning,
    /// Operation failed.
    Danger,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Danger => write!(f, "danger"),
        }
    }
}

/// Follow-up the user can take from an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    /// Release the analysis lock (see `Dashboard::force_unlock`).
    ForceUnlock,
    /// Reload the page.
    Reload,
}

/// A user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Text shown to the user.
    pub message: String,
    /// Contextual severity.
    pub severity: Severity,
    /// Whether the alert goes away on its own.
    pub auto_dismiss: bool,
    /// Optional follow-up button.
    pub action: Option<AlertAction>,
}

impl Alert {
    /// An auto-dismissing alert.
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            auto_dismiss: true,
            action: None,
        }
    }

    /// Shorthand for [`Severity::Info`].
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Info)
    }

    /// Shorthand for [`Severity::Success`].
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Success)
    }

    /// Shorthand for [`Severity::Warning`].
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Warning)
    }

    /// Shorthand for [`Severity::Danger`].
    pub fn danger(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Danger)
    }

    /// Keep the alert until the user closes it.
    pub fn sticky(mut self) -> Self {
        self.auto_dismiss = false;
        self
    }

    /// Attach a follow-up action.
    pub fn with_action(mut self, action: AlertAction) -> Self {
        self.action = Some(action);
        self
    }
}

/// Receives progress and alerts from the dashboard.
pub trait StatusReporter {
    /// Loading step `step` (1 to 4) with a short message.
    fn report_progress(&self, step: u8, message: &str);

    /// Show an alert.
    fn report_alert(&self, alert: Alert);
}

impl<R: StatusReporter + ?Sized> StatusReporter for &R {
    fn report_progress(&self, step: u8, message: &str) {
        (**self).report_progress(step, message);
    }

    fn report_alert(&self, alert: Alert) {
        (**self).report_alert(alert);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl StatusReporter for NoopReporter {
    fn report_progress(&self, _step: u8, _message: &str) {}

    fn report_alert(&self, _alert: Alert) {}
}

/// Writes progress and alerts to `tracing`, for headless clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl StatusReporter for TracingReporter {
    fn report_progress(&self, step: u8, message: &str) {
        tracing::info!(step, text = message, "progress");
    }

    fn report_alert(&self, alert: Alert) {
        match alert.severity {
            Severity::Danger => tracing::error!(
                text = %alert.message,
                sticky = !alert.auto_dismiss,
                "alert"
            ),
            Severity::Warning => tracing::warn!(
                text = %alert.message,
                sticky = !alert.auto_dismiss,
                action = ?alert.action,
                "alert"
            ),
            Severity::Info | Severity::Success => tracing::info!(
                text = %alert.message,
                severity = %alert.severity,
                "alert"
            ),
        }
    }
}
