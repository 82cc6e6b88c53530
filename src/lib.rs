//! # Sentiview
//!
//! Client-side request plumbing for a sentiment-analysis dashboard.
//!
//! The server analyses uploaded tweet exports inside the upload request, holds
//! a per-user lock while it does, and answers `429` when it is overloaded.
//! This crate keeps the client side of that conversation honest:
//!
//! - [`RequestController`] runs one logical request with a hard per-attempt
//!   timeout, capped exponential backoff on `ServerBusy`/timeouts, and an
//!   immediate [`RequestError::ResourceLocked`] when the lock is held;
//! - [`ReadinessPoller`] waits, with a bounded number of checks, for the
//!   renderer to finish drawing a payload;
//! - [`SubmissionGuard`] rejects a second upload while one is in flight.
//!
//! [`Dashboard`] combines the three behind the rendering and status seams.
//!
//! ## Quick Example
//!
//! ```rust
//! use sentiview::testing::ScriptedTransport;
//! use sentiview::wire::HttpRequest;
//! use sentiview::{RequestController, RequestError, RetryPolicy};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! // The server says the analysis lock is held by user 42.
//! let transport = ScriptedTransport::new().then_locked(Some("42"));
//! let controller = RequestController::new(transport.clone());
//!
//! let result = controller
//!     .execute(
//!         &HttpRequest::get("http://localhost:5000/api/analysis-data"),
//!         &RetryPolicy::exponential(Duration::from_secs(2)),
//!     )
//!     .await;
//!
//! // Locks are never retried automatically.
//! assert_eq!(result.unwrap_err().lock_owner(), Some("42"));
//! assert_eq!(transport.request_count(), 1);
//! # });
//! ```
//!
//! ## Features
//!
//! - `http`: [`transport::ReqwestTransport`], a `reqwest`-backed transport.
//! - `jitter`: randomized backoff via [`JitterStrategy`].
//! - `proptest`: strategies in [`testing`] for property tests.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod controller;
pub mod dashboard;
pub mod error;
pub mod guard;
pub mod payload;
pub mod poller;
pub mod readiness;
pub mod report;
pub mod retry;
pub mod testing;
#[cfg(feature = "http")]
pub mod transport;
pub mod wire;

// Re-exports
pub use config::{ClientConfig, ConfigError};
pub use controller::{NoopObserver, RequestController, RequestObserver};
pub use dashboard::{
    CsvFile, Dashboard, LoadOutcome, OverlayOutcome, Renderer, SubmitOutcome, UploadForm,
};
pub use error::{RequestError, TransportError};
pub use guard::{GuardState, SubmissionGuard, SubmissionTicket};
pub use payload::{AnalysisPayload, Sentiment, Tweet, TweetQuery};
pub use poller::{PollOptions, PollOutcome, PollProgress, PollState, ReadinessPoller};
pub use readiness::RenderSnapshot;
pub use report::{Alert, AlertAction, NoopReporter, Severity, StatusReporter, TracingReporter};
pub use retry::{JitterStrategy, PolicyError, RetryDecision, RetryEvent, RetryPolicy};
#[cfg(feature = "http")]
pub use transport::ReqwestTransport;
pub use wire::Transport;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::controller::{RequestController, RequestObserver};
    pub use crate::dashboard::{Dashboard, LoadOutcome, Renderer, SubmitOutcome, UploadForm};
    pub use crate::error::RequestError;
    pub use crate::guard::SubmissionGuard;
    pub use crate::poller::{PollOptions, PollOutcome, ReadinessPoller};
    pub use crate::report::{Alert, Severity, StatusReporter};
    pub use crate::retry::{RetryDecision, RetryPolicy};
    pub use crate::wire::Transport;
}
