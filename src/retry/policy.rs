//! Retry policy types and configuration.

use std::time::Duration;

use crate::error::RequestError;

/// Ceiling applied to backoff delays unless a policy overrides it.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Per-attempt timeout used when a policy does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// How a single logical request is retried.
///
/// Policies are plain data: they describe the backoff schedule and the attempt
/// budget but never sleep or dispatch anything themselves.
///
/// The attempt budget counts *total* attempts, including the first one, so
/// `with_max_attempts(3)` allows one initial attempt and two retries.
///
/// # Examples
///
/// ```rust
/// use sentiview::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::exponential(Duration::from_millis(2000))
///     .with_max_attempts(3);
///
/// // Delay after the first and second failures; the third failure is final.
/// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(2000)));
/// assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(4000)));
/// assert_eq!(policy.delay_for_attempt(3), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    timeout: Duration,
    jitter: JitterStrategy,
}

/// Strategy for adding randomness to delays.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JitterStrategy {
    /// No jitter applied.
    #[default]
    None,
    /// Add ±percentage randomness to delay.
    Proportional(f64),
    /// Random delay between 0 and calculated delay.
    Full,
}

/// Information about a failed attempt that is about to be retried.
#[derive(Debug, Clone)]
pub struct RetryEvent<'a> {
    /// Which attempt just failed (1-indexed).
    pub attempt: u32,
    /// Total attempts the policy allows.
    pub max_attempts: u32,
    /// The error from the failed attempt.
    pub error: &'a RequestError,
    /// Delay before the next attempt.
    pub next_delay: Duration,
    /// Total elapsed time since the first attempt.
    pub elapsed: Duration,
}

/// A policy that violates its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyError {
    /// `max_attempts` was zero.
    ZeroAttempts,
    /// `base_delay` was zero.
    ZeroBaseDelay,
    /// `timeout` was zero.
    ZeroTimeout,
}

impl std::fmt::Display for PolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroAttempts => write!(f, "max_attempts must be at least 1"),
            Self::ZeroBaseDelay => write!(f, "base delay must be greater than zero"),
            Self::ZeroTimeout => write!(f, "timeout must be greater than zero"),
        }
    }
}

impl std::error::Error for PolicyError {}

impl RetryPolicy {
    /// Create a policy whose delay doubles after every failure.
    ///
    /// Delay after failed attempt `n` (1-indexed) = `base * 2^(n-1)`, capped at
    /// [`DEFAULT_MAX_DELAY`]. Defaults to 3 attempts and a 90 second timeout.
    pub fn exponential(base: Duration) -> Self {
        Self {
            max_attempts: 3,
            base_delay: base,
            max_delay: DEFAULT_MAX_DELAY,
            timeout: DEFAULT_TIMEOUT,
            jitter: JitterStrategy::None,
        }
    }

    /// A policy that makes exactly one attempt.
    ///
    /// ```rust
    /// use sentiview::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::single_attempt(Duration::from_secs(30));
    /// assert_eq!(policy.max_attempts(), 1);
    /// assert_eq!(policy.delay_for_attempt(1), None);
    /// ```
    pub fn single_attempt(timeout: Duration) -> Self {
        Self::exponential(Duration::from_secs(1))
            .with_max_attempts(1)
            .with_timeout(timeout)
    }

    /// Set the total number of attempts, including the first.
    ///
    /// Zero is raised to one: an operation always gets its initial attempt.
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Set the maximum delay cap.
    ///
    /// Delays never exceed this value, jitter included.
    ///
    /// ```rust
    /// use sentiview::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(Duration::from_millis(2000))
    ///     .with_max_attempts(6)
    ///     .with_max_delay(Duration::from_secs(10));
    ///
    /// // 2s, 4s, 8s, then capped at 10s.
    /// assert_eq!(policy.delay_for_attempt(3), Some(Duration::from_secs(8)));
    /// assert_eq!(policy.delay_for_attempt(4), Some(Duration::from_secs(10)));
    /// ```
    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = d;
        self
    }

    /// Set the hard timeout applied to every attempt.
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout = d;
        self
    }

    /// Add proportional jitter to delays.
    ///
    /// With `0.25` a 4 s backoff becomes anything in 3 s..=5 s, still clamped
    /// to the cap. The factor is clamped to `0.0..=1.0`.
    ///
    /// Only takes effect with the `jitter` feature.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter = JitterStrategy::Proportional(factor.clamp(0.0, 1.0));
        self
    }

    /// Use full jitter: a random delay between 0 and the calculated delay.
    ///
    /// Only takes effect with the `jitter` feature.
    pub fn with_full_jitter(mut self) -> Self {
        self.jitter = JitterStrategy::Full;
        self
    }

    /// Total attempts allowed.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the first failure.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Get the maximum delay cap.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the jitter strategy.
    pub fn jitter(&self) -> &JitterStrategy {
        &self.jitter
    }

    /// The capped backoff after failed attempt `attempt_number` (1-indexed),
    /// ignoring the attempt budget.
    pub fn backoff(&self, attempt_number: u32) -> Duration {
        let exponent = attempt_number.saturating_sub(1);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay)
    }

    /// The delay to wait after failed attempt `attempt_number` (1-indexed).
    ///
    /// Returns None once the attempt budget is spent.
    pub fn delay_for_attempt(&self, attempt_number: u32) -> Option<Duration> {
        if attempt_number >= self.max_attempts {
            return None;
        }
        Some(self.backoff(attempt_number))
    }

    /// Calculate the delay with jitter applied.
    ///
    /// This is used internally by the retry decision.
    #[doc(hidden)]
    pub fn delay_with_jitter(&self, attempt_number: u32) -> Option<Duration> {
        let base = self.delay_for_attempt(attempt_number)?;
        Some(self.jitter.apply(base, self.max_delay))
    }

    /// Check the policy bounds.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_attempts == 0 {
            Err(PolicyError::ZeroAttempts)
        } else if self.base_delay.is_zero() {
            Err(PolicyError::ZeroBaseDelay)
        } else if self.timeout.is_zero() {
            Err(PolicyError::ZeroTimeout)
        } else {
            Ok(())
        }
    }
}

impl JitterStrategy {
    /// Apply jitter to a base delay, never exceeding `max_delay`.
    pub fn apply(&self, base_delay: Duration, max_delay: Duration) -> Duration {
        let jittered = match self {
            JitterStrategy::None => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Proportional(factor) => {
                use rand::Rng;
                let base_millis = base_delay.as_millis() as f64;
                let range = base_millis * factor;
                let min = (base_millis - range).max(0.0);
                let max = base_millis + range;
                Duration::from_millis(rand::rng().random_range(min..=max) as u64)
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Proportional(_) => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Full => {
                use rand::Rng;
                let max_millis = base_delay.as_millis() as u64;
                if max_millis == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_millis(rand::rng().random_range(0..=max_millis))
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Full => base_delay,
        };

        jittered.min(max_delay)
    }
}
