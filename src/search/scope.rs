//! Cancellable scope shared by every task of one session.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Why a session ended. Exactly one is recorded per scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// A result reached the acceptance threshold.
    Accepted,
    /// The deadline elapsed first.
    Deadline,
    /// Every dispatched task reported and none qualified.
    Exhausted,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::Deadline => write!(f, "deadline"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Cancellation token plus deadline for one identification session.
///
/// Cancellation is idempotent. The first [`Scope::conclude`] call records
/// the termination reason; later calls only re-cancel, which is a no-op.
#[derive(Debug)]
pub struct Scope {
    token: CancellationToken,
    deadline: Instant,
    budget: Duration,
    termination: OnceLock<Termination>,
}

impl Scope {
    /// Creates a scope whose deadline is `budget` from now.
    pub fn new(budget: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Instant::now() + budget,
            budget,
            termination: OnceLock::new(),
        }
    }

    /// Returns the token handed to scorers.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns `true` once the scope has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels the scope. Safe to call any number of times.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Records `reason` if no termination was recorded yet, then cancels.
    ///
    /// Returns `true` only for the call that recorded the reason.
    pub fn conclude(&self, reason: Termination) -> bool {
        let first = self.termination.set(reason).is_ok();
        self.token.cancel();
        first
    }

    /// Returns the recorded termination, if any.
    pub fn termination(&self) -> Option<Termination> {
        self.termination.get().copied()
    }

    /// Returns the instant at which the scope expires.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns the total time budget of the scope.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Returns the time left before the deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Resolves when the deadline elapses or the scope is cancelled.
    pub async fn ended(&self) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = sleep_until(self.deadline) => {}
        }
    }
}
