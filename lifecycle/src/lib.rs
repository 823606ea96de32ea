//! # Lifecycle
//!
//! Cancellation and timeout primitives for the launcher.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: Cancellation is explicit, not hidden
//! - **Testability first**: Built on tokio time, so paused-clock tests are deterministic
//! - **Mechanism not policy**: Provides primitives, the launcher decides policies
//!
//! ## Core Concepts
//!
//! - `CancellationToken`: Cloneable handle to check or await cancellation
//! - `CancellationSource`: Controller that can trigger cancellation
//! - `CancellationReason`: Why cancellation occurred
//! - `Deadline`: Point in time when operation should timeout
//! - `Timeout`: Duration-based timeout, converted to a deadline when used
//! - [`run_until`] / [`run_cancellable`]: Bound a future by a deadline and a token

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Duration, Instant};

/// Reason for cancellation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancellationReason {
    /// User-initiated cancellation (e.g. Ctrl-C)
    UserCancel,
    /// Operation timed out
    Timeout,
    /// Supervisor/orchestrator cancelled the operation
    SupervisorCancel,
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancellationReason::UserCancel => write!(f, "user cancelled"),
            CancellationReason::Timeout => write!(f, "timeout"),
            CancellationReason::SupervisorCancel => write!(f, "supervisor cancelled"),
        }
    }
}

/// Shared state between CancellationToken and CancellationSource
///
/// `None` while active. The first cancellation reason wins.
#[derive(Debug, Clone)]
struct SharedCancellationState {
    state: Arc<watch::Sender<Option<CancellationReason>>>,
}

impl SharedCancellationState {
    fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            state: Arc::new(sender),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.state.borrow().is_some()
    }

    fn reason(&self) -> Option<CancellationReason> {
        self.state.borrow().clone()
    }

    fn cancel(&self, reason: CancellationReason) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(reason);
            true
        })
    }

    async fn cancelled(&self) -> CancellationReason {
        let mut receiver = self.state.subscribe();
        loop {
            if let Some(reason) = receiver.borrow_and_update().clone() {
                return reason;
            }
            // The sender lives as long as `self`, so this only fails if the
            // state was torn down underneath us; nothing can cancel then.
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// A cloneable token that can be checked for cancellation
///
/// CancellationToken is designed to be passed to operations that should
/// be cancellable. It's cheap to clone and check, and can be awaited.
///
/// ## Example
///
/// ```
/// use lifecycle::{CancellationSource, CancellationReason};
///
/// let source = CancellationSource::new();
/// let token = source.token();
///
/// assert!(!token.is_cancelled());
///
/// source.cancel(CancellationReason::UserCancel);
/// assert!(token.is_cancelled());
/// assert_eq!(token.reason(), Some(CancellationReason::UserCancel));
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    shared: SharedCancellationState,
}

impl CancellationToken {
    /// Checks if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Returns the reason for cancellation, if cancelled
    pub fn reason(&self) -> Option<CancellationReason> {
        self.shared.reason()
    }

    /// Throws an error if cancelled
    pub fn throw_if_cancelled(&self) -> Result<(), LifecycleError> {
        if let Some(reason) = self.reason() {
            Err(LifecycleError::Cancelled { reason })
        } else {
            Ok(())
        }
    }

    /// Completes once cancellation is requested, yielding the reason
    ///
    /// Completes immediately if the token is already cancelled.
    pub async fn cancelled(&self) -> CancellationReason {
        self.shared.cancelled().await
    }
}

/// A controller that can trigger cancellation
///
/// CancellationSource creates tokens and can cancel them all at once.
///
/// ## Example
///
/// ```
/// use lifecycle::{CancellationSource, CancellationReason};
///
/// let source = CancellationSource::new();
/// let token1 = source.token();
/// let token2 = source.token();
///
/// // Both tokens see the same cancellation
/// source.cancel(CancellationReason::Timeout);
/// assert!(token1.is_cancelled());
/// assert!(token2.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationSource {
    shared: SharedCancellationState,
}

impl CancellationSource {
    /// Creates a new cancellation source
    pub fn new() -> Self {
        Self {
            shared: SharedCancellationState::new(),
        }
    }

    /// Creates a token from this source
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            shared: self.shared.clone(),
        }
    }

    /// Cancels all tokens from this source
    ///
    /// Returns `false` if the source was already cancelled; the original
    /// reason is kept in that case.
    pub fn cancel(&self, reason: CancellationReason) -> bool {
        self.shared.cancel(reason)
    }

    /// Checks if this source has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

/// A deadline represents a point in time when an operation should timeout
///
/// Deadlines are absolute times, making them suitable for passing through
/// multiple layers without duration confusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    instant: Instant,
}

impl Deadline {
    /// Creates a deadline at the specified instant
    pub fn at(instant: Instant) -> Self {
        Self { instant }
    }

    /// Returns the instant of this deadline
    pub fn instant(&self) -> Instant {
        self.instant
    }
}

/// Timeout specifies a duration-based timeout
///
/// Unlike Deadline, Timeout is relative and needs to be converted to a
/// Deadline for actual use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    /// Creates a timeout with the specified duration
    pub fn after(duration: Duration) -> Self {
        Self { duration }
    }

    /// Returns the duration in whole milliseconds, saturating
    pub fn as_millis(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// Converts this timeout to a deadline starting from now
    pub fn to_deadline(&self, now: Instant) -> Deadline {
        Deadline::at(now + self.duration)
    }
}

/// Errors related to lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Operation was cancelled: {reason}")]
    Cancelled { reason: CancellationReason },

    #[error("Operation timed out")]
    Timeout,
}

/// Drives `future` until it completes, the deadline passes, or the token is
/// cancelled.
///
/// Cancellation is checked before the future is polled, so an already
/// cancelled token never lets the future run.
pub async fn run_until<F>(
    future: F,
    deadline: Deadline,
    token: &CancellationToken,
) -> Result<F::Output, LifecycleError>
where
    F: Future,
{
    tokio::select! {
        biased;
        reason = token.cancelled() => Err(LifecycleError::Cancelled { reason }),
        output = tokio::time::timeout_at(deadline.instant(), future) => {
            output.map_err(|_| LifecycleError::Timeout)
        }
    }
}

/// Drives `future` until it completes or the token is cancelled.
pub async fn run_cancellable<F>(
    future: F,
    token: &CancellationToken,
) -> Result<F::Output, LifecycleError>
where
    F: Future,
{
    tokio::select! {
        biased;
        reason = token.cancelled() => Err(LifecycleError::Cancelled { reason }),
        output = future => Ok(output),
    }
}
