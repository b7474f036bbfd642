//! Bounded worker pool that fans match tasks out over the template store.
//!
//! The pool never runs more than `parallelism` comparisons at once no matter
//! how large the population is. Workers pull candidate slots from a shared
//! cursor, so a fast worker simply takes more candidates. Each worker owns a
//! clone of the result sender; when the last worker exits the channel closes
//! and the aggregator observes exhaustion.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::collab::Scorer;
use crate::population::CandidateId;
use crate::search::scope::Scope;
use crate::search::stats::SessionCounters;
use crate::search::task::{publish, MatchTask, Publication, TaskReport};
use crate::search::MatchResult;
use crate::store::TemplateStore;
use crate::trace::{trace_event, trace_warn};

/// Store slots to compare in one session.
#[derive(Clone, Debug)]
pub struct WorkQueue {
    slots: Arc<[usize]>,
}

impl WorkQueue {
    /// Queues every stored candidate except `exclude`.
    ///
    /// `exclude` names the probe's own sample when the probe was drawn
    /// from the population; it is never compared against itself.
    pub fn new<T>(store: &TemplateStore<T>, exclude: Option<&CandidateId>) -> Self {
        let skip = exclude.and_then(|id| store.slot_of(id.as_str()));
        let slots = (0..store.len()).filter(|&slot| Some(slot) != skip).collect();
        Self { slots }
    }

    /// Returns the number of queued candidates.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Shared state every worker of one session reads.
///
/// Cloning only bumps reference counts.
pub struct SessionContext<T, S: ?Sized> {
    /// Cancellation and deadline of the session.
    pub scope: Arc<Scope>,
    pub store: Arc<TemplateStore<T>>,
    pub probe: Arc<T>,
    pub scorer: Arc<S>,
    pub counters: Arc<SessionCounters>,
}

impl<T, S: ?Sized> Clone for SessionContext<T, S> {
    fn clone(&self) -> Self {
        Self {
            scope: Arc::clone(&self.scope),
            store: Arc::clone(&self.store),
            probe: Arc::clone(&self.probe),
            scorer: Arc::clone(&self.scorer),
            counters: Arc::clone(&self.counters),
        }
    }
}

/// Launches match tasks on a fixed number of blocking workers.
#[derive(Clone, Copy, Debug)]
pub struct Dispatcher {
    parallelism: usize,
}

impl Dispatcher {
    /// Creates a dispatcher running at most `parallelism` tasks at once.
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: parallelism.max(1),
        }
    }

    /// Returns the concurrency ceiling.
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Starts the workers and returns their join set.
    ///
    /// Must be called from within a Tokio runtime. `tx` is consumed; the
    /// channel closes once every worker has exited.
    pub fn dispatch<T, S>(
        &self,
        queue: WorkQueue,
        context: &SessionContext<T, S>,
        tx: mpsc::Sender<MatchResult>,
    ) -> JoinSet<()>
    where
        T: Send + Sync + 'static,
        S: Scorer<T> + ?Sized + 'static,
    {
        let workers = self.parallelism.min(queue.len());
        context.counters.record_dispatched(queue.len());
        trace_event!("dispatch_started", dispatched = queue.len(), workers = workers);

        let cursor = Arc::new(AtomicUsize::new(0));
        let mut set = JoinSet::new();
        for _ in 0..workers {
            let worker = Worker {
                queue: queue.clone(),
                cursor: Arc::clone(&cursor),
                context: context.clone(),
                tx: tx.clone(),
            };
            set.spawn_blocking(move || worker.run());
        }
        set
    }
}

struct Worker<T, S: ?Sized> {
    queue: WorkQueue,
    cursor: Arc<AtomicUsize>,
    context: SessionContext<T, S>,
    tx: mpsc::Sender<MatchResult>,
}

impl<T, S> Worker<T, S>
where
    S: Scorer<T> + ?Sized,
{
    fn run(self) {
        let SessionContext {
            scope,
            store,
            probe,
            scorer,
            counters,
        } = &self.context;
        while !scope.is_cancelled() {
            let next = self.cursor.fetch_add(1, Ordering::Relaxed);
            let Some(&slot) = self.queue.slots.get(next) else {
                break;
            };
            let Some(entry) = store.entry(slot) else {
                continue;
            };

            let task = MatchTask::new(entry);
            match task.run(scope, probe, &**scorer) {
                TaskReport::Scored(result) => {
                    counters.record_scored();
                    match publish(&self.tx, scope, result) {
                        Publication::Delivered => counters.record_published(),
                        Publication::Discarded => counters.record_discarded(),
                    }
                }
                TaskReport::Cancelled => counters.record_cancelled(),
                TaskReport::Failed(err) => {
                    counters.record_failed();
                    trace_warn!(
                        "score_failed",
                        candidate = task.candidate().as_str(),
                        reason = err.to_string().as_str()
                    );
                }
            }
        }
    }
}
