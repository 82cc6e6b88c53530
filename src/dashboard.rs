//! The dashboard client: upload, load, unlock and chat flows.
//!
//! [`Dashboard`] wires a [`RequestController`] to the rendering and status
//! collaborators. It owns the submission guard, the readiness poller and the
//! cancellation token of the current operation; nothing here is global.
//!
//! Loading results runs in three phases:
//!
//! 1. fetch the analysis payload under the fetch policy;
//! 2. hand it to the [`Renderer`] and wait for the render settle delay;
//! 3. poll [`Renderer::is_render_complete`] until ready or out of checks.
//!
//! The loading overlay is dismissed exactly once: when the poll ends, when
//! the fetch fails, or when the overlay deadline passes, whichever is first.
//! Passing the deadline does not stop the load.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{ClientConfig, ConfigError};
use crate::controller::{RequestController, RequestObserver};
use crate::error::RequestError;
use crate::guard::SubmissionGuard;
use crate::payload::AnalysisPayload;
use crate::poller::{PollOptions, PollOutcome, PollProgress, ReadinessPoller};
use crate::report::{Alert, AlertAction, StatusReporter};
use crate::retry::{RetryEvent, RetryPolicy};
use crate::wire::{FormPart, HttpRequest, Transport};

/// Why the loading overlay went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayOutcome {
    /// Everything rendered.
    Ready,
    /// The poll ran out of checks; some visuals may still be missing.
    Partial,
    /// The overlay deadline passed first.
    Deadline,
    /// The fetch failed.
    Failed,
}

/// The rendering side of the dashboard.
///
/// Methods take `&self`; implementations keep their own interior state.
pub trait Renderer {
    /// Draw a freshly fetched payload.
    fn render_payload(&self, payload: &AnalysisPayload);

    /// Readiness check sampled by the poller.
    fn is_render_complete(&self) -> bool;

    /// Remove the loading overlay.
    fn dismiss_overlay(&self, outcome: OverlayOutcome);

    /// Navigate to another page of the app.
    fn redirect(&self, path: &str);
}

impl<R: Renderer + ?Sized> Renderer for &R {
    fn render_payload(&self, payload: &AnalysisPayload) {
        (**self).render_payload(payload);
    }

    fn is_render_complete(&self) -> bool {
        (**self).is_render_complete()
    }

    fn dismiss_overlay(&self, outcome: OverlayOutcome) {
        (**self).dismiss_overlay(outcome);
    }

    fn redirect(&self, path: &str) {
        (**self).redirect(path);
    }
}

/// A CSV file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvFile {
    /// File name as picked by the user.
    pub file_name: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// The upload form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadForm {
    /// Analysis title.
    pub title: String,
    /// Optional description.
    pub description: String,
    /// The tweets export; required.
    pub csv: Option<CsvFile>,
}

impl UploadForm {
    /// A form with a title and a CSV file.
    pub fn new(title: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            csv: Some(CsvFile {
                file_name: file_name.into(),
                bytes,
            }),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn to_parts(&self, csv: &CsvFile) -> Vec<FormPart> {
        vec![
            FormPart::text("title", self.title.clone()),
            FormPart::text("description", self.description.clone()),
            FormPart::file("csv-file", csv.file_name.clone(), "text/csv", csv.bytes.clone()),
        ]
    }
}

/// Result of [`Dashboard::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The server analysed the upload; the client was redirected.
    Completed,
    /// Another submission was in progress. Nothing was sent.
    Rejected,
    /// The form had no CSV file. Nothing was sent.
    MissingFile,
    /// The upload failed; the user has been told why.
    Failed(RequestError),
}

/// Result of [`Dashboard::fetch_results`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The payload was fetched and handed to the renderer.
    Loaded {
        /// What was rendered.
        payload: Box<AnalysisPayload>,
        /// How the readiness poll ended.
        poll: PollOutcome,
    },
    /// The fetch failed; the user has been told why.
    Failed(RequestError),
}

impl LoadOutcome {
    /// The rendered payload, if any.
    pub fn payload(&self) -> Option<&AnalysisPayload> {
        match self {
            Self::Loaded { payload, .. } => Some(payload),
            Self::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Policies {
    upload: RetryPolicy,
    fetch: RetryPolicy,
    unlock: RetryPolicy,
    chatbot: RetryPolicy,
}

/// The dashboard client.
#[derive(Debug)]
pub struct Dashboard<T, R, S> {
    config: ClientConfig,
    policies: Policies,
    poll_options: PollOptions,
    controller: RequestController<T>,
    renderer: R,
    reporter: S,
    guard: SubmissionGuard,
    poller: ReadinessPoller,
    cancel: Mutex<CancellationToken>,
}

impl<T, R, S> Dashboard<T, R, S>
where
    T: Transport,
    R: Renderer,
    S: StatusReporter,
{
    /// Build a dashboard from a validated config.
    pub fn new(
        config: ClientConfig,
        transport: T,
        renderer: R,
        reporter: S,
    ) -> Result<Self, Vec<ConfigError>> {
        config.validate()?;
        let policies = Policies {
            upload: config.upload.to_policy(),
            fetch: config.fetch.to_policy(),
            unlock: config.unlock.to_policy(),
            chatbot: config.chatbot.to_policy(),
        };
        let poll_options = config.poll.to_options();

        Ok(Self {
            config,
            policies,
            poll_options,
            controller: RequestController::new(transport),
            renderer,
            reporter,
            guard: SubmissionGuard::new(),
            poller: ReadinessPoller::new(),
            cancel: Mutex::new(CancellationToken::new()),
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The submission guard, for disabling the submit button.
    pub fn guard(&self) -> &SubmissionGuard {
        &self.guard
    }

    /// The renderer.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// The status reporter.
    pub fn reporter(&self) -> &S {
        &self.reporter
    }

    /// Upload the form and run the analysis.
    ///
    /// At most one submission runs at a time; a call made while another is in
    /// progress returns [`SubmitOutcome::Rejected`] without sending anything.
    pub async fn submit(&self, form: &UploadForm) -> SubmitOutcome {
        let Some(csv) = form.csv.as_ref() else {
            self.reporter
                .report_alert(Alert::warning("Please upload a CSV file first."));
            return SubmitOutcome::MissingFile;
        };

        let Some(_ticket) = self.guard.try_begin() else {
            tracing::debug!("submission already in progress, ignoring submit");
            return SubmitOutcome::Rejected;
        };

        let span = tracing::info_span!("submit", title = %form.title, file = %csv.file_name);
        async move {
            let request = HttpRequest::post_multipart(
                self.config.endpoints.url(&self.config.endpoints.upload_path),
                form.to_parts(csv),
            );
            let observer = ProgressObserver::new(&self.reporter, "upload");
            self.reporter
                .report_progress(1, "Uploading and analysing data...");

            match self
                .controller
                .execute_with(&request, &self.policies.upload, &self.token(), &observer)
                .await
            {
                Ok(_) => {
                    tracing::info!("upload analysed");
                    self.reporter.report_alert(Alert::success(
                        "Analysis complete! Redirecting to the results page...",
                    ));
                    self.renderer.redirect(&self.config.endpoints.results_page);
                    SubmitOutcome::Completed
                }
                Err(error) => {
                    self.report_failure("upload", &error);
                    SubmitOutcome::Failed(error)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Fetch the latest analysis and render it.
    pub async fn fetch_results(&self) -> LoadOutcome {
        self.fetch_analysis(None).await
    }

    /// Fetch a stored analysis by id, or the latest when `id` is None.
    pub async fn fetch_analysis(&self, id: Option<&str>) -> LoadOutcome {
        let span = tracing::info_span!("fetch_results", id = id.unwrap_or("latest"));
        async move {
            let token = self.token();
            let overlay = Overlay::new(&self.renderer);
            let deadline = self.config.overlay_deadline();

            let load = self.load(id, &token, &overlay);
            tokio::pin!(load);

            tokio::select! {
                outcome = &mut load => outcome,
                _ = tokio::time::sleep(deadline) => {
                    tracing::warn!(
                        deadline_ms = deadline.as_millis() as u64,
                        "overlay deadline passed, loading continues in background"
                    );
                    overlay.dismiss(OverlayOutcome::Deadline);
                    load.await
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Release the per-user analysis lock on the server.
    ///
    /// Safe to call when no lock is held.
    pub async fn force_unlock(&self) -> Result<(), RequestError> {
        let request = HttpRequest::get(
            self.config
                .endpoints
                .url(&self.config.endpoints.clean_lock_path),
        );
        let observer = ProgressObserver::new(&self.reporter, "unlock");

        match self
            .controller
            .execute_with(&request, &self.policies.unlock, &self.token(), &observer)
            .await
        {
            Ok(_) => {
                tracing::info!("analysis lock released");
                self.reporter.report_alert(Alert::success(
                    "The previous analysis lock was released. You can submit again.",
                ));
                Ok(())
            }
            Err(error) => {
                self.report_failure("unlock", &error);
                Err(error)
            }
        }
    }

    /// Ask the chatbot about the current analysis.
    pub async fn ask_chatbot(&self, message: &str) -> Result<String, RequestError> {
        #[derive(Deserialize)]
        struct Reply {
            response: String,
        }

        let request = HttpRequest::post_json(
            self.config.endpoints.url(&self.config.endpoints.chatbot_path),
            json!({ "message": message }),
        );
        let observer = ProgressObserver::new(&self.reporter, "chatbot");

        let reply: Reply = self
            .controller
            .execute_json(&request, &self.policies.chatbot, &self.token(), &observer)
            .await
            .inspect_err(|error| self.report_failure("chatbot", error))?;
        Ok(reply.response)
    }

    /// Cancel whatever is in flight: requests, backoff sleeps and the
    /// readiness poll. Later operations run normally.
    pub fn cancel_in_flight(&self) {
        let previous = {
            let mut current = self
                .cancel
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            std::mem::replace(&mut *current, CancellationToken::new())
        };
        previous.cancel();
        self.poller.cancel();
        tracing::info!("in-flight operations cancelled");
    }

    fn token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    async fn load(
        &self,
        id: Option<&str>,
        token: &CancellationToken,
        overlay: &Overlay<'_, R>,
    ) -> LoadOutcome {
        self.reporter
            .report_progress(1, "Connecting to server...");

        let mut url = self
            .config
            .endpoints
            .url(&self.config.endpoints.analysis_data_path);
        if let Some(id) = id {
            url = format!("{}?id={}", url, utf8_percent_encode(id, NON_ALPHANUMERIC));
        }
        let request = HttpRequest::get(url).with_header("Cache-Control", "no-cache");
        let observer = ProgressObserver::new(&self.reporter, "fetch");

        let payload: AnalysisPayload = match self
            .controller
            .execute_json(&request, &self.policies.fetch, token, &observer)
            .await
        {
            Ok(payload) => payload,
            Err(error) => {
                self.report_failure("fetch", &error);
                overlay.dismiss(OverlayOutcome::Failed);
                return LoadOutcome::Failed(error);
            }
        };

        tracing::info!(
            title = %payload.title,
            tweets = payload.tweets.len(),
            hashtags = payload.top_hashtags.len(),
            topics = payload.topics.len(),
            "analysis payload received"
        );
        self.reporter
            .report_progress(2, "Data received, processing results...");
        self.renderer.render_payload(&payload);
        self.reporter
            .report_progress(3, "Rendering analysis results...");

        if !settle(self.config.render_settle(), token).await {
            let error = RequestError::Cancelled;
            self.report_failure("fetch", &error);
            overlay.dismiss(OverlayOutcome::Partial);
            return LoadOutcome::Failed(error);
        }

        let poll = self
            .poller
            .wait_until_ready(
                || self.renderer.is_render_complete(),
                &self.poll_options,
                |progress| {
                    let (step, message) = loading_stage(progress);
                    self.reporter.report_progress(step, message);
                },
            )
            .await;

        match poll {
            PollOutcome::Ready { .. } => {
                self.reporter
                    .report_progress(4, "Analysis loaded successfully!");
                overlay.dismiss(OverlayOutcome::Ready);
            }
            PollOutcome::TimedOut { .. } => {
                self.reporter
                    .report_progress(4, "Some data may still be loading, please wait...");
                overlay.dismiss(OverlayOutcome::Partial);
                self.reporter.report_alert(
                    Alert::warning(
                        "Some data may not have finished loading. \
                         If visualizations do not appear, refresh the page.",
                    )
                    .with_action(AlertAction::Reload),
                );
            }
            PollOutcome::Superseded => {
                tracing::debug!("readiness poll superseded by a newer load");
            }
            PollOutcome::Cancelled => {
                overlay.dismiss(OverlayOutcome::Partial);
            }
        }

        LoadOutcome::Loaded {
            payload: Box::new(payload),
            poll,
        }
    }

    /// Turn a terminal error into exactly one user-facing alert.
    fn report_failure(&self, operation: &'static str, error: &RequestError) {
        tracing::warn!(operation, error = %error, "operation failed");
        self.reporter.report_alert(failure_alert(operation, error));
    }
}

/// Map a terminal error to the alert the user sees.
pub fn failure_alert(operation: &str, error: &RequestError) -> Alert {
    match error {
        RequestError::ResourceLocked { owner_id, .. } => {
            let who = owner_id
                .as_deref()
                .map(|id| format!(" (user {})", id))
                .unwrap_or_default();
            Alert::warning(format!(
                "Another analysis is still running for this account{}. \
                 Release the lock to start a new one.",
                who
            ))
            .sticky()
            .with_action(AlertAction::ForceUnlock)
        }
        RequestError::Cancelled => Alert::info(format!("The {} was cancelled.", operation)),
        RequestError::ExhaustedRetries { last_error, attempts } => Alert::danger(format!(
            "The {} failed after {} attempts: {}. Please try again later.",
            operation, attempts, last_error
        )),
        RequestError::Timeout { duration } => Alert::danger(format!(
            "The {} timed out after {} s. The server may still be processing.",
            operation,
            duration.as_secs()
        )),
        other => Alert::danger(format!("The {} failed: {}", operation, other)),
    }
}

/// Progress step and message for a failed readiness check.
pub fn loading_stage(progress: PollProgress) -> (u8, &'static str) {
    match progress.check_count {
        0..=5 => (1, "Downloading and preparing data..."),
        6..=15 => (2, "Processing sentiment analysis data..."),
        _ => (3, "Preparing visualizations..."),
    }
}

async fn settle(delay: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Dismisses the overlay at most once.
struct Overlay<'a, R: ?Sized> {
    renderer: &'a R,
    dismissed: AtomicBool,
}

impl<'a, R: Renderer + ?Sized> Overlay<'a, R> {
    fn new(renderer: &'a R) -> Self {
        Self {
            renderer,
            dismissed: AtomicBool::new(false),
        }
    }

    fn dismiss(&self, outcome: OverlayOutcome) {
        if !self.dismissed.swap(true, Ordering::AcqRel) {
            tracing::debug!(?outcome, "dismissing loading overlay");
            self.renderer.dismiss_overlay(outcome);
        }
    }
}

/// Forwards retry events to the status reporter as a live countdown.
struct ProgressObserver<'a, S: ?Sized> {
    reporter: &'a S,
    operation: &'static str,
}

impl<'a, S: StatusReporter + ?Sized> ProgressObserver<'a, S> {
    fn new(reporter: &'a S, operation: &'static str) -> Self {
        Self {
            reporter,
            operation,
        }
    }
}

impl<S: StatusReporter + ?Sized> RequestObserver for ProgressObserver<'_, S> {
    fn on_attempt(&self, attempt: u32, max_attempts: u32) {
        if attempt > 1 {
            self.reporter.report_progress(
                1,
                &format!(
                    "Retrying {} (attempt {} of {})...",
                    self.operation, attempt, max_attempts
                ),
            );
        }
    }

    fn on_retry(&self, event: &RetryEvent<'_>) {
        let reason = match event.error {
            RequestError::Timeout { .. } => "The request timed out",
            RequestError::NetworkFailure { .. } => "The connection failed",
            _ => "The server is busy",
        };
        self.reporter.report_alert(Alert::warning(format!(
            "{}. Retrying in {} seconds...",
            reason,
            whole_seconds(event.next_delay)
        )));
    }

    fn on_backoff_tick(&self, remaining: Duration) {
        self.reporter.report_progress(
            1,
            &format!("Retrying {} in {} s...", self.operation, whole_seconds(remaining)),
        );
    }
}

/// Seconds shown in a countdown, rounded up so the last tick reads 1.
fn whole_seconds(duration: Duration) -> u64 {
    duration.as_millis().div_ceil(1000) as u64
}
