//! Concurrent one-to-many identification.
//!
//! A session fans comparisons out over a bounded worker pool, races them
//! against a deadline and stops at the first result that reaches the
//! acceptance threshold. [`Identifier`] wires the external collaborators to
//! a session; [`Session`] can be driven directly with a prepared store.

pub(crate) mod aggregate;
pub(crate) mod dispatch;
pub(crate) mod scope;
pub(crate) mod session;
pub(crate) mod stats;
pub(crate) mod task;

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::collab::{DiagnosticSink, DiscardSink, SampleLoader, Scorer, TemplateBuilder};
use crate::population::{CandidateId, Population};
use crate::store::{PreloadPolicy, PreloadReport, TemplateStore};
use crate::util::{IdentifyError, IdentifyResult};

pub use scope::Termination;
pub use session::{Session, SessionReport};
pub use stats::SessionStats;

/// A scored comparison of the probe against one candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchResult {
    /// The compared candidate.
    pub candidate: CandidateId,
    /// Similarity reported by the scorer.
    pub score: f64,
}

/// Terminal result of an identification request.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// A candidate reached the threshold; the first one observed wins.
    Identified(MatchResult),
    /// Every candidate was compared and none reached the threshold.
    NotIdentified,
    /// The deadline elapsed before any candidate was accepted.
    TimedOut,
}

impl Outcome {
    /// Returns `true` for [`Outcome::Identified`].
    pub fn is_identified(&self) -> bool {
        matches!(self, Self::Identified(_))
    }

    /// Returns the accepted result, if any.
    pub fn matched(&self) -> Option<&MatchResult> {
        match self {
            Self::Identified(result) => Some(result),
            Self::NotIdentified | Self::TimedOut => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identified(result) => {
                write!(f, "identified {} (score {:.2})", result.candidate, result.score)
            }
            Self::NotIdentified => write!(f, "not identified"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// How long a session may search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DeadlinePolicy {
    /// The same budget regardless of population size.
    Fixed(Duration),
    /// `base + per_candidate * dispatched`, optionally capped at `max`.
    Scaled {
        base: Duration,
        per_candidate: Duration,
        max: Option<Duration>,
    },
}

impl DeadlinePolicy {
    /// Returns the budget for a session dispatching `candidates` tasks.
    pub fn budget(&self, candidates: usize) -> Duration {
        match *self {
            Self::Fixed(budget) => budget,
            Self::Scaled {
                base,
                per_candidate,
                max,
            } => {
                let count = u32::try_from(candidates).unwrap_or(u32::MAX);
                let scaled = base.saturating_add(per_candidate.saturating_mul(count));
                max.map_or(scaled, |cap| scaled.min(cap))
            }
        }
    }
}

impl Default for DeadlinePolicy {
    fn default() -> Self {
        Self::Fixed(Duration::from_millis(1000))
    }
}

/// Configuration for identification sessions.
///
/// Passed explicitly to every session; there is no process-wide state.
#[derive(Clone, Debug, PartialEq)]
pub struct IdentifyConfig {
    /// Minimum score accepted as an identification (inclusive).
    pub threshold: f64,
    /// Session time budget.
    pub deadline: DeadlinePolicy,
    /// Maximum number of comparisons running at once.
    pub parallelism: usize,
    /// Handling of candidates that fail to load or template.
    pub preload_policy: PreloadPolicy,
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            threshold: 50.0,
            deadline: DeadlinePolicy::default(),
            parallelism: std::thread::available_parallelism().map_or(1, |n| n.get()),
            preload_policy: PreloadPolicy::Abort,
        }
    }
}

impl IdentifyConfig {
    /// Checks that the configuration can drive a session.
    pub fn validate(&self) -> IdentifyResult<()> {
        if !self.threshold.is_finite() {
            return Err(IdentifyError::InvalidInput("threshold must be finite"));
        }
        if self.parallelism == 0 {
            return Err(IdentifyError::InvalidInput("parallelism must be at least 1"));
        }
        let zero_budget = match self.deadline {
            DeadlinePolicy::Fixed(budget) => budget.is_zero(),
            DeadlinePolicy::Scaled {
                base,
                per_candidate,
                max,
            } => (base.is_zero() && per_candidate.is_zero()) || max.is_some_and(|m| m.is_zero()),
        };
        if zero_budget {
            return Err(IdentifyError::InvalidInput("deadline budget must be positive"));
        }
        Ok(())
    }
}

/// End-to-end identifier over external collaborators.
///
/// Collaborators are shared with blocking worker threads, hence the `Arc`s.
pub struct Identifier<L, B, S> {
    loader: Arc<L>,
    builder: Arc<B>,
    scorer: Arc<S>,
    sink: Arc<dyn DiagnosticSink>,
    config: IdentifyConfig,
}

impl<L, B, S> Identifier<L, B, S>
where
    L: SampleLoader + 'static,
    B: TemplateBuilder<L::Sample> + 'static,
    S: Scorer<B::Template> + 'static,
{
    /// Creates an identifier with default configuration and a discarding
    /// diagnostic sink.
    pub fn new(loader: L, builder: B, scorer: S) -> Self {
        Self {
            loader: Arc::new(loader),
            builder: Arc::new(builder),
            scorer: Arc::new(scorer),
            sink: Arc::new(DiscardSink),
            config: IdentifyConfig::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: IdentifyConfig) -> Self {
        self.config = config;
        self
    }

    /// Routes template-construction diagnostics to `sink`.
    pub fn with_sink<K>(mut self, sink: K) -> Self
    where
        K: DiagnosticSink + 'static,
    {
        self.sink = Arc::new(sink);
        self
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &IdentifyConfig {
        &self.config
    }

    /// Builds the template store for `population` on a blocking thread.
    ///
    /// The returned store can be reused by any number of sessions.
    pub async fn preload(
        &self,
        population: &Population,
    ) -> IdentifyResult<(Arc<TemplateStore<B::Template>>, PreloadReport)> {
        let loader = Arc::clone(&self.loader);
        let builder = Arc::clone(&self.builder);
        let sink = Arc::clone(&self.sink);
        let policy = self.config.preload_policy;
        let population = population.clone();
        let (store, report) = tokio::task::spawn_blocking(move || {
            TemplateStore::preload(&population, &*loader, &*builder, &*sink, policy)
        })
        .await
        .map_err(|err| IdentifyError::Worker {
            reason: err.to_string(),
        })??;
        Ok((Arc::new(store), report))
    }

    /// Loads and templates the probe sample at `path`.
    pub async fn build_probe(&self, path: &Path) -> IdentifyResult<Arc<B::Template>> {
        let loader = Arc::clone(&self.loader);
        let builder = Arc::clone(&self.builder);
        let sink = Arc::clone(&self.sink);
        let path = path.to_path_buf();
        let template = tokio::task::spawn_blocking(move || {
            loader
                .load(&path)
                .and_then(|sample| builder.build(&*sink, &sample))
        })
        .await
        .map_err(|err| IdentifyError::Worker {
            reason: err.to_string(),
        })?
        .map_err(|source| IdentifyError::Probe { source })?;
        Ok(Arc::new(template))
    }

    /// Identifies the probe sample at `probe_path` within `population`.
    ///
    /// The probe is templated first; a probe failure aborts before any
    /// candidate is loaded. If the probe file belongs to the population it
    /// is excluded from the search.
    pub async fn identify(
        &self,
        probe_path: &Path,
        population: &Population,
    ) -> IdentifyResult<Outcome> {
        let probe = self.build_probe(probe_path).await?;
        let (store, _report) = self.preload(population).await?;
        let exclude = population.id_for_path(probe_path);
        let report = self
            .identify_with_store(probe, store, exclude.as_ref())
            .await?;
        Ok(report.outcome)
    }

    /// Runs one session against an already preloaded store.
    pub async fn identify_with_store(
        &self,
        probe: Arc<B::Template>,
        store: Arc<TemplateStore<B::Template>>,
        exclude: Option<&CandidateId>,
    ) -> IdentifyResult<SessionReport> {
        Session::new(self.config.clone())?
            .run(store, probe, exclude, Arc::clone(&self.scorer))
            .await
    }
}
