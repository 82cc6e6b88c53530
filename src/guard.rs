//! The submission guard: at most one upload in flight.
//!
//! The guard has two states, [`GuardState::Idle`] and
//! [`GuardState::Submitting`]. [`SubmissionGuard::try_begin`] is the only way
//! into `Submitting`, and the returned [`SubmissionTicket`] is the only way
//! out: dropping it resets the guard, so every exit path of a submission
//! (success, error, cancellation, panic unwinding, or the future being dropped)
//! returns the guard to `Idle` exactly once.

use std::sync::atomic::{AtomicBool, Ordering};

/// Observable state of a [`SubmissionGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// No submission in progress.
    Idle,
    /// A submission holds the ticket.
    Submitting,
}

/// Rejects overlapping submissions.
///
/// # Examples
///
/// ```rust
/// use sentiview::{GuardState, SubmissionGuard};
///
/// let guard = SubmissionGuard::new();
/// {
///     let _ticket = guard.try_begin().expect("guard is idle");
///     assert_eq!(guard.state(), GuardState::Submitting);
///     assert!(guard.try_begin().is_none()); // rejected, not queued
/// }
/// assert_eq!(guard.state(), GuardState::Idle);
/// ```
#[derive(Debug, Default)]
pub struct SubmissionGuard {
    submitting: AtomicBool,
}

impl SubmissionGuard {
    /// Create an idle guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> GuardState {
        if self.submitting.load(Ordering::Acquire) {
            GuardState::Submitting
        } else {
            GuardState::Idle
        }
    }

    /// Returns true while a ticket is held.
    pub fn is_submitting(&self) -> bool {
        self.state() == GuardState::Submitting
    }

    /// Move `Idle -> Submitting`, or return None if a submission is already
    /// in progress.
    pub fn try_begin(&self) -> Option<SubmissionTicket<'_>> {
        self.submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| {
                tracing::debug!("submission guard acquired");
                SubmissionTicket { guard: self }
            })
    }
}

/// Proof that the holder owns the current submission. Dropping it returns the
/// guard to [`GuardState::Idle`].
#[must_use = "dropping the ticket immediately releases the guard"]
#[derive(Debug)]
pub struct SubmissionTicket<'a> {
    guard: &'a SubmissionGuard,
}

impl Drop for SubmissionTicket<'_> {
    fn drop(&mut self) {
        self.guard.submitting.store(false, Ordering::Release);
        tracing::debug!("submission guard released");
    }
}
