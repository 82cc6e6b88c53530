//! Retry policies and the per-attempt retry decision.
//!
//! The retry layer follows a "pure core" split:
//!
//! - **Policy**: [`RetryPolicy`] is just data (attempt budget, exponential
//!   backoff, cap, per-attempt timeout). It never sleeps.
//! - **Decision**: [`RetryDecision::classify`] turns a failed attempt into
//!   `Retry(delay)`, `Fail(error)` or `RequireUserAction(owner)`.
//! - **Execution**: the loop that sleeps and re-dispatches lives in
//!   [`crate::controller::RequestController`].
//!
//! # Quick Start
//!
//! ```rust
//! use sentiview::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::exponential(Duration::from_millis(2000))
//!     .with_max_attempts(3)
//!     .with_max_delay(Duration::from_secs(10))
//!     .with_timeout(Duration::from_secs(180));
//!
//! assert!(policy.validate().is_ok());
//! ```
//!
//! # Jitter Support
//!
//! Enable the `jitter` feature to randomize delays. Jittered delays are still
//! clamped to the policy cap:
//!
//! ```toml
//! sentiview = { version = "...", features = ["jitter"] }
//! ```

mod decision;
mod policy;

pub use decision::RetryDecision;
pub use policy::{
    JitterStrategy, PolicyError, RetryEvent, RetryPolicy, DEFAULT_MAX_DELAY, DEFAULT_TIMEOUT,
};
