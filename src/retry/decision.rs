//! Classification of a failed attempt into the next step of the retry loop.

use std::time::Duration;

use super::policy::RetryPolicy;
use crate::error::RequestError;

/// What the controller does after an attempt fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the delay, then make the next attempt.
    Retry(Duration),
    /// Stop and return this error to the caller.
    Fail(RequestError),
    /// Stop without retrying; the caller must release the lock held by this owner.
    RequireUserAction(Option<String>),
}

impl RetryDecision {
    /// Decide how to continue after `error` ended attempt `attempt_number`
    /// (1-indexed).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sentiview::{RequestError, RetryDecision, RetryPolicy};
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(Duration::from_millis(2000)).with_max_attempts(3);
    /// let busy = RequestError::ServerBusy { message: None };
    ///
    /// assert_eq!(
    ///     RetryDecision::classify(&busy, 1, &policy),
    ///     RetryDecision::Retry(Duration::from_millis(2000))
    /// );
    /// assert!(matches!(
    ///     RetryDecision::classify(&busy, 3, &policy),
    ///     RetryDecision::Fail(RequestError::ExhaustedRetries { attempts: 3, .. })
    /// ));
    /// ```
    pub fn classify(error: &RequestError, attempt_number: u32, policy: &RetryPolicy) -> Self {
        match error {
            RequestError::ResourceLocked { owner_id, .. } => {
                RetryDecision::RequireUserAction(owner_id.clone())
            }
            e if e.is_retryable() => match policy.delay_with_jitter(attempt_number) {
                Some(delay) => RetryDecision::Retry(delay),
                None => RetryDecision::Fail(RequestError::ExhaustedRetries {
                    last_error: Box::new(e.clone()),
                    attempts: attempt_number,
                }),
            },
            e => RetryDecision::Fail(e.clone()),
        }
    }

    /// Returns true if another attempt will follow.
    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry(_))
    }
}
