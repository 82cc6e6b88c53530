//! Error types for dashboard requests.
//!
//! Every outcome of an HTTP attempt is decoded once, at the transport boundary,
//! into a [`RequestError`]. The retry loop and the dashboard only ever match on
//! these variants; nobody inspects raw response bodies after [`crate::wire::classify`].

use std::time::Duration;

/// A terminal or per-attempt failure of a dashboard request.
///
/// # Examples
///
/// ```rust
/// use sentiview::RequestError;
///
/// let busy = RequestError::ServerBusy { message: None };
/// assert!(busy.is_retryable());
///
/// let locked = RequestError::ResourceLocked {
///     owner_id: Some("u42".to_string()),
///     message: None,
/// };
/// assert!(!locked.is_retryable());
/// assert_eq!(locked.lock_owner(), Some("u42"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The attempt did not complete within the policy timeout.
    Timeout {
        /// The per-attempt timeout that was exceeded.
        duration: Duration,
    },
    /// The connection dropped or the body could not be transferred.
    NetworkFailure {
        /// Transport-level description.
        message: String,
    },
    /// HTTP 429 without a lock marker. Retried with backoff.
    ServerBusy {
        /// Message supplied by the server, if any.
        message: Option<String>,
    },
    /// HTTP 429 carrying the lock sentinel. Needs an explicit unlock.
    ResourceLocked {
        /// Identifier of the lock holder, when the server reports it.
        owner_id: Option<String>,
        /// Message supplied by the server, if any.
        message: Option<String>,
    },
    /// Any other non-success status, or a success body that reports an error.
    ServerError {
        /// HTTP status of the response.
        status: u16,
        /// Server-provided error text or the status description.
        message: String,
    },
    /// A success response whose body is not the expected JSON.
    InvalidPayload {
        /// Decoder error text.
        message: String,
    },
    /// Every allowed attempt failed with a retryable error.
    ExhaustedRetries {
        /// The error from the final attempt.
        last_error: Box<RequestError>,
        /// Number of attempts made.
        attempts: u32,
    },
    /// The caller cancelled the operation.
    Cancelled,
}

impl RequestError {
    /// Returns true for failures worth an automatic retry: busy, timeout and
    /// network drops.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ServerBusy { .. } | Self::Timeout { .. } | Self::NetworkFailure { .. }
        )
    }

    /// Returns true if the server reported a held analysis lock.
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::ResourceLocked { .. })
    }

    /// Returns true if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if the caller cancelled the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The lock holder reported with a [`RequestError::ResourceLocked`].
    pub fn lock_owner(&self) -> Option<&str> {
        match self {
            Self::ResourceLocked { owner_id, .. } => owner_id.as_deref(),
            _ => None,
        }
    }

    /// The error behind an [`RequestError::ExhaustedRetries`], or `self`.
    pub fn root(&self) -> &RequestError {
        match self {
            Self::ExhaustedRetries { last_error, .. } => last_error.root(),
            other => other,
        }
    }
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { duration } => write!(f, "request timed out after {:?}", duration),
            Self::NetworkFailure { message } => write!(f, "network failure: {}", message),
            Self::ServerBusy { message: Some(m) } => write!(f, "server busy: {}", m),
            Self::ServerBusy { message: None } => write!(f, "server busy"),
            Self::ResourceLocked { owner_id, message } => {
                write!(f, "resource locked")?;
                if let Some(owner) = owner_id {
                    write!(f, " by {}", owner)?;
                }
                if let Some(m) = message {
                    write!(f, ": {}", m)?;
                }
                Ok(())
            }
            Self::ServerError { status, message } => {
                write!(f, "server error {}: {}", status, message)
            }
            Self::InvalidPayload { message } => write!(f, "invalid payload: {}", message),
            Self::ExhaustedRetries {
                last_error,
                attempts,
            } => write!(
                f,
                "retries exhausted after {} attempts: {}",
                attempts, last_error
            ),
            Self::Cancelled => write!(f, "request cancelled"),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ExhaustedRetries { last_error, .. } => Some(last_error.as_ref()),
            _ => None,
        }
    }
}

/// A failure below the HTTP layer, reported by a [`crate::wire::Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established or was reset.
    Connection(String),
    /// The transport gave up waiting on its own.
    TimedOut,
    /// The request or response body could not be transferred.
    Body(String),
}

impl TransportError {
    /// Map into the request taxonomy. `timeout` is the policy timeout of the
    /// attempt that failed.
    pub fn into_request_error(self, timeout: Duration) -> RequestError {
        match self {
            Self::TimedOut => RequestError::Timeout { duration: timeout },
            Self::Connection(message) | Self::Body(message) => {
                RequestError::NetworkFailure { message }
            }
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(m) => write!(f, "connection failed: {}", m),
            Self::TimedOut => write!(f, "transport timed out"),
            Self::Body(m) => write!(f, "body transfer failed: {}", m),
        }
    }
}

impl std::error::Error for TransportError {}
