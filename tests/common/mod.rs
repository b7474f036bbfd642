#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use idsearch::{CancellationToken, CandidateId, CollaboratorError, Scorer, TemplateStore};

/// Scorer driven by a lookup table keyed by candidate template.
///
/// Templates are plain strings naming the candidate. Each comparison sleeps
/// `delay` in 1 ms slices, polling the scope between slices.
pub struct TableScorer {
    scores: HashMap<String, Result<f64, CollaboratorError>>,
    delay: Duration,
    pub started: AtomicUsize,
    pub completed: AtomicUsize,
    pub cancelled: AtomicUsize,
    active: AtomicUsize,
    pub peak: AtomicUsize,
}

impl TableScorer {
    pub fn new<I, K>(scores: I, delay: Duration) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            scores: scores
                .into_iter()
                .map(|(id, score)| (id.into(), Ok(score)))
                .collect(),
            delay,
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_failure(mut self, id: &str, reason: &str) -> Self {
        self.scores
            .insert(id.to_string(), Err(CollaboratorError::Score(reason.into())));
        self
    }

    fn wait(&self, scope: &CancellationToken) -> bool {
        let until = Instant::now() + self.delay;
        while Instant::now() < until {
            if scope.is_cancelled() {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1).min(self.delay));
        }
        true
    }
}

impl Scorer<String> for TableScorer {
    fn score(
        &self,
        scope: &CancellationToken,
        _probe: &String,
        candidate: &String,
    ) -> Result<f64, CollaboratorError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let finished = self.wait(scope);
        self.active.fetch_sub(1, Ordering::SeqCst);
        if !finished {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
            return Err(CollaboratorError::Cancelled);
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.scores
            .get(candidate)
            .cloned()
            .unwrap_or(Ok(0.0))
    }
}

/// Store whose templates are the candidate names themselves.
pub fn name_store<I, K>(ids: I) -> Arc<TemplateStore<String>>
where
    I: IntoIterator<Item = K>,
    K: Into<String>,
{
    let store = TemplateStore::from_templates(ids.into_iter().map(|id| {
        let id: String = id.into();
        (CandidateId::from(id.as_str()), id)
    }))
    .unwrap();
    Arc::new(store)
}

pub fn probe() -> Arc<String> {
    Arc::new("probe".to_string())
}
