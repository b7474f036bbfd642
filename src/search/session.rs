//! One identification request from dispatch to outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::collab::Scorer;
use crate::population::CandidateId;
use crate::search::aggregate::Aggregator;
use crate::search::dispatch::{Dispatcher, SessionContext, WorkQueue};
use crate::search::scope::{Scope, Termination};
use crate::search::stats::{SessionCounters, SessionStats};
use crate::search::{IdentifyConfig, Outcome};
use crate::store::TemplateStore;
use crate::trace::trace_event;
use crate::util::{IdentifyError, IdentifyResult};

/// Result of a finished session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionReport {
    /// The identification outcome.
    pub outcome: Outcome,
    /// Which terminal condition ended the session.
    pub termination: Termination,
    /// Task accounting, read after every worker has exited.
    pub stats: SessionStats,
    /// Deadline budget granted to the session.
    pub budget: Duration,
    /// Wall-clock time from dispatch until the outcome was decided.
    pub elapsed: Duration,
}

/// Composes scope, dispatcher and aggregator for one probe.
///
/// A session never leaves workers behind: `run` cancels the scope and
/// joins every worker before it returns, and dropping the `run` future
/// cancels the scope as well.
#[derive(Clone, Debug)]
pub struct Session {
    config: IdentifyConfig,
}

impl Session {
    /// Creates a session after validating `config`.
    pub fn new(config: IdentifyConfig) -> IdentifyResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &IdentifyConfig {
        &self.config
    }

    /// Searches `store` for a match of `probe`.
    ///
    /// `exclude` names the probe's own candidate, if it is part of the store.
    pub async fn run<T, S>(
        &self,
        store: Arc<TemplateStore<T>>,
        probe: Arc<T>,
        exclude: Option<&CandidateId>,
        scorer: Arc<S>,
    ) -> IdentifyResult<SessionReport>
    where
        T: Send + Sync + 'static,
        S: Scorer<T> + ?Sized + 'static,
    {
        let queue = WorkQueue::new(&store, exclude);
        let dispatched = queue.len();
        let dispatcher = Dispatcher::new(self.config.parallelism);
        trace_event!(
            "session_started",
            candidates = dispatched,
            parallelism = dispatcher.parallelism(),
            threshold = self.config.threshold
        );

        let budget = self.config.deadline.budget(dispatched);
        let started = Instant::now();
        let scope = Arc::new(Scope::new(budget));
        let _cancel_on_drop = scope.token().clone().drop_guard();
        let counters = Arc::new(SessionCounters::default());
        let (tx, mut rx) = mpsc::channel(dispatched.max(1));

        let context = SessionContext {
            scope: Arc::clone(&scope),
            store,
            probe,
            scorer,
            counters: Arc::clone(&counters),
        };
        let mut workers = dispatcher.dispatch(queue, &context, tx);
        let outcome = Aggregator::new(self.config.threshold)
            .run(&scope, &mut rx, &counters)
            .await;
        let elapsed = started.elapsed();

        scope.cancel();
        let joined = join_all(&mut workers).await;
        let termination = scope.termination().unwrap_or(Termination::Deadline);
        let stats = counters.snapshot();
        trace_event!(
            "session_concluded",
            termination = termination.to_string().as_str(),
            received = stats.received,
            elapsed_ms = elapsed.as_millis() as u64
        );
        joined?;

        Ok(SessionReport {
            outcome,
            termination,
            stats,
            budget,
            elapsed,
        })
    }
}

async fn join_all(workers: &mut JoinSet<()>) -> IdentifyResult<()> {
    let mut failure = None;
    while let Some(joined) = workers.join_next().await {
        if let Err(err) = joined {
            failure.get_or_insert(IdentifyError::Worker {
                reason: err.to_string(),
            });
        }
    }
    failure.map_or(Ok(()), Err)
}
