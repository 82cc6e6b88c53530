//! Readiness polling after a payload has been handed to the renderer.
//!
//! Rendering is asynchronous (charts draw on layout callbacks, the word cloud
//! lays out in the background), so the dashboard cannot know synchronously when
//! the loading overlay may go. [`ReadinessPoller::wait_until_ready`] samples a
//! caller-supplied readiness check on a fixed interval until it passes or a
//! bounded number of checks has been spent.
//!
//! A poller allows one active poll at a time. Starting a new poll cancels the
//! previous one, which then resolves to [`PollOutcome::Superseded`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Timing and budget of a readiness poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    /// Grace period before the first check.
    pub initial_delay: Duration,
    /// Pause between consecutive checks.
    pub interval: Duration,
    /// Maximum number of checks; at least one check is always made.
    pub max_checks: u32,
}

impl PollOptions {
    /// Poll every `interval`, at most `max_checks` times, with no initial delay.
    pub fn new(interval: Duration, max_checks: u32) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            interval,
            max_checks,
        }
    }

    /// Set the grace period before the first check.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Worst-case time from start to `TimedOut`.
    pub fn budget(&self) -> Duration {
        self.initial_delay
            + self
                .interval
                .saturating_mul(self.max_checks.max(1).saturating_sub(1))
    }
}

impl Default for PollOptions {
    /// 1.5 s grace, then every 500 ms for up to 30 checks.
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1500),
            interval: Duration::from_millis(500),
            max_checks: 30,
        }
    }
}

/// Mutable state of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollState {
    /// Checks made so far.
    pub check_count: u32,
    /// Check budget.
    pub max_checks: u32,
    /// Pause between checks.
    pub interval: Duration,
}

impl PollState {
    fn new(options: &PollOptions) -> Self {
        Self {
            check_count: 0,
            max_checks: options.max_checks.max(1),
            interval: options.interval,
        }
    }

    /// Returns true once the check budget is spent.
    pub fn is_exhausted(&self) -> bool {
        self.check_count >= self.max_checks
    }

    /// Snapshot for progress callbacks.
    pub fn progress(&self) -> PollProgress {
        PollProgress {
            check_count: self.check_count,
            max_checks: self.max_checks,
        }
    }
}

/// Progress of a running poll, reported after every failed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollProgress {
    /// Checks made so far (1-indexed).
    pub check_count: u32,
    /// Check budget.
    pub max_checks: u32,
}

impl PollProgress {
    /// Fraction of the budget spent, in `0.0..=1.0`.
    pub fn ratio(&self) -> f64 {
        f64::from(self.check_count) / f64::from(self.max_checks.max(1))
    }
}

/// Terminal state of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The check passed on check number `checks`.
    Ready {
        /// Checks made, including the one that passed.
        checks: u32,
    },
    /// The budget ran out. Proceed with a caveat; this is not an error.
    TimedOut {
        /// Checks made.
        checks: u32,
    },
    /// A newer poll on the same poller replaced this one.
    Superseded,
    /// [`ReadinessPoller::cancel`] was called.
    Cancelled,
}

impl PollOutcome {
    /// Returns true for [`PollOutcome::Ready`].
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Checks made, for outcomes that ran to completion.
    pub fn checks(&self) -> Option<u32> {
        match self {
            Self::Ready { checks } | Self::TimedOut { checks } => Some(*checks),
            Self::Superseded | Self::Cancelled => None,
        }
    }
}

#[derive(Debug)]
struct ActivePoll {
    id: u64,
    token: CancellationToken,
    superseded: Arc<AtomicBool>,
}

/// Polls a readiness check with at most one active poll per instance.
///
/// # Examples
///
/// ```rust
/// use sentiview::{PollOptions, PollOutcome, ReadinessPoller};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let poller = ReadinessPoller::new();
/// let mut checks = 0;
///
/// let outcome = poller
///     .wait_until_ready(
///         || {
///             checks += 1;
///             checks == 3
///         },
///         &PollOptions::new(Duration::from_millis(1), 10),
///         |_progress| {},
///     )
///     .await;
///
/// assert_eq!(outcome, PollOutcome::Ready { checks: 3 });
/// # });
/// ```
#[derive(Debug, Default)]
pub struct ReadinessPoller {
    active: Mutex<Option<ActivePoll>>,
    next_id: AtomicU64,
}

impl ReadinessPoller {
    /// Create a poller with no active poll.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while a poll is running.
    pub fn is_active(&self) -> bool {
        self.slot().is_some()
    }

    /// Cancel the active poll, if any. It resolves to [`PollOutcome::Cancelled`].
    pub fn cancel(&self) {
        if let Some(active) = self.slot().take() {
            tracing::debug!(poll = active.id, "readiness poll cancelled");
            active.token.cancel();
        }
    }

    /// Wait until `check` returns true or `options.max_checks` checks fail.
    ///
    /// After `options.initial_delay`, `check` is called; on failure
    /// `on_progress` receives the updated count and the poll sleeps for
    /// `options.interval` before the next check. `check` is never called again
    /// after it returns true or after the final check.
    ///
    /// Starting this while another poll on the same poller is running cancels
    /// the earlier poll.
    pub async fn wait_until_ready<C, P>(
        &self,
        mut check: C,
        options: &PollOptions,
        mut on_progress: P,
    ) -> PollOutcome
    where
        C: FnMut() -> bool,
        P: FnMut(PollProgress),
    {
        let registration = self.register();
        let token = registration.token.clone();
        let superseded = registration.superseded.clone();
        let id = registration.id;

        let stopped = || {
            if superseded.load(Ordering::Acquire) {
                PollOutcome::Superseded
            } else {
                PollOutcome::Cancelled
            }
        };

        if !sleep_unless_cancelled(options.initial_delay, &token).await {
            return stopped();
        }

        let mut state = PollState::new(options);
        loop {
            state.check_count += 1;
            if check() {
                tracing::info!(poll = id, checks = state.check_count, "render ready");
                return PollOutcome::Ready {
                    checks: state.check_count,
                };
            }

            on_progress(state.progress());

            if state.is_exhausted() {
                tracing::warn!(
                    poll = id,
                    checks = state.check_count,
                    "render not ready before check budget ran out"
                );
                return PollOutcome::TimedOut {
                    checks: state.check_count,
                };
            }

            tracing::debug!(
                poll = id,
                check = state.check_count,
                max_checks = state.max_checks,
                "render not ready yet"
            );

            if !sleep_unless_cancelled(state.interval, &token).await {
                return stopped();
            }
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<ActivePoll>> {
        self.active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn register(&self) -> Registration<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let superseded = Arc::new(AtomicBool::new(false));

        let previous = self.slot().replace(ActivePoll {
            id,
            token: token.clone(),
            superseded: superseded.clone(),
        });
        if let Some(previous) = previous {
            tracing::debug!(poll = previous.id, by = id, "readiness poll superseded");
            previous.superseded.store(true, Ordering::Release);
            previous.token.cancel();
        }

        Registration {
            poller: self,
            id,
            token,
            superseded,
        }
    }
}

/// Clears the poller's active slot when the poll ends, however it ends,
/// unless a newer poll already took the slot.
struct Registration<'a> {
    poller: &'a ReadinessPoller,
    id: u64,
    token: CancellationToken,
    superseded: Arc<AtomicBool>,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut slot = self.poller.slot();
        if slot.as_ref().is_some_and(|active| active.id == self.id) {
            *slot = None;
        }
    }
}

/// Returns false if `token` fired before `duration` elapsed.
async fn sleep_unless_cancelled(duration: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
