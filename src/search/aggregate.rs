//! Early-exit consumer of match results.
//!
//! The aggregator is the only component that concludes a session. It uses a
//! first-qualifying-result-wins policy: the first result it observes whose
//! score reaches the threshold ends the search, even if a better candidate
//! is still being scored. This trades completeness for time-to-answer and
//! must not be turned into best-of-N without changing the contract.

use tokio::sync::mpsc;

use crate::search::scope::{Scope, Termination};
use crate::search::stats::SessionCounters;
use crate::search::{MatchResult, Outcome};

/// Applies the acceptance threshold to results as they arrive.
#[derive(Clone, Copy, Debug)]
pub struct Aggregator {
    threshold: f64,
}

impl Aggregator {
    /// Creates an aggregator accepting scores `>= threshold`.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Returns the acceptance threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Drains `rx` until a result is accepted, the channel is exhausted or
    /// the scope's deadline elapses.
    ///
    /// A result observed at or after the deadline is never accepted; the
    /// session times out instead. On return the scope is concluded and `rx`
    /// is closed, so no worker can publish afterwards. Results already
    /// buffered are left unread.
    pub async fn run(
        &self,
        scope: &Scope,
        rx: &mut mpsc::Receiver<MatchResult>,
        counters: &SessionCounters,
    ) -> Outcome {
        let outcome = loop {
            tokio::select! {
                biased;
                next = rx.recv() => match next {
                    _ if scope.remaining().is_zero() => {
                        scope.conclude(Termination::Deadline);
                        break Outcome::TimedOut;
                    }
                    Some(result) => {
                        counters.record_received();
                        if result.score >= self.threshold {
                            scope.conclude(Termination::Accepted);
                            break Outcome::Identified(result);
                        }
                    }
                    None => {
                        scope.conclude(Termination::Exhausted);
                        break Outcome::NotIdentified;
                    }
                },
                _ = scope.ended() => {
                    scope.conclude(Termination::Deadline);
                    break Outcome::TimedOut;
                }
            }
        };
        rx.close();
        outcome
    }
}
