//! A single probe-versus-candidate comparison.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::collab::{CollaboratorError, Scorer};
use crate::population::CandidateId;
use crate::search::scope::Scope;
use crate::search::MatchResult;
use crate::store::CandidateTemplate;

/// What a match task produced.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskReport {
    /// The scorer returned a finite score.
    Scored(MatchResult),
    /// The scope was cancelled before or during scoring.
    Cancelled,
    /// The scorer failed; treated as a non-match.
    Failed(CollaboratorError),
}

/// Whether a scored result reached the aggregator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Publication {
    /// The result is in the channel.
    Delivered,
    /// The session had already concluded; the result was dropped.
    Discarded,
}

/// Compares the probe against one candidate template.
pub struct MatchTask<'a, T> {
    candidate: &'a CandidateId,
    template: &'a T,
}

impl<'a, T> MatchTask<'a, T> {
    /// Creates a task for one stored candidate.
    pub fn new(entry: &'a CandidateTemplate<T>) -> Self {
        Self {
            candidate: entry.id(),
            template: entry.template(),
        }
    }

    /// Returns the candidate this task compares.
    pub fn candidate(&self) -> &CandidateId {
        self.candidate
    }

    /// Scores the candidate, honoring cancellation before the call.
    ///
    /// Scorers that cannot be interrupted still run to completion; the
    /// stale score is then rejected by [`publish`].
    pub fn run<S>(&self, scope: &Scope, probe: &T, scorer: &S) -> TaskReport
    where
        S: Scorer<T> + ?Sized,
    {
        if scope.is_cancelled() {
            return TaskReport::Cancelled;
        }
        match scorer.score(scope.token(), probe, self.template) {
            Ok(score) if score.is_finite() => TaskReport::Scored(MatchResult {
                candidate: self.candidate.clone(),
                score,
            }),
            Ok(score) => TaskReport::Failed(CollaboratorError::Score(format!(
                "non-finite score {score}"
            ))),
            Err(CollaboratorError::Cancelled) => TaskReport::Cancelled,
            Err(err) => TaskReport::Failed(err),
        }
    }
}

/// Publishes `result` unless the session has concluded or its deadline
/// has passed.
///
/// The channel is sized to the dispatched count, so a send never waits
/// for capacity. The aggregator closes its receiver when it concludes,
/// which makes a send racing with conclusion fail instead of landing
/// after the outcome was returned.
pub fn publish(
    tx: &mpsc::Sender<MatchResult>,
    scope: &Scope,
    result: MatchResult,
) -> Publication {
    if scope.is_cancelled() || scope.remaining().is_zero() {
        return Publication::Discarded;
    }
    match tx.try_send(result) {
        Ok(()) => Publication::Delivered,
        Err(TrySendError::Closed(_)) | Err(TrySendError::Full(_)) => Publication::Discarded,
    }
}
