//! Precomputed candidate templates for one-to-many search.
//!
//! Building templates once, before any matching starts, amortizes the cost
//! of template construction across every comparison of a session (and across
//! sessions when the store is shared behind an `Arc`). Preload is sequential
//! and synchronous so it can never race with matching. After construction
//! the store is immutable and may be read from any number of workers
//! without locking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::collab::{CollaboratorError, DiagnosticSink, SampleLoader, TemplateBuilder};
use crate::population::{CandidateId, Population};
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::{IdentifyError, IdentifyResult};

/// What preload does when one candidate cannot be templated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PreloadPolicy {
    /// Fail the whole preload; no partial population is ever matched.
    #[default]
    Abort,
    /// Skip the candidate, record it in the report and keep going.
    Skip,
}

/// A candidate identifier paired with its precomputed template.
#[derive(Debug)]
pub struct CandidateTemplate<T> {
    id: CandidateId,
    template: T,
}

impl<T> CandidateTemplate<T> {
    /// Returns the candidate identifier.
    pub fn id(&self) -> &CandidateId {
        &self.id
    }

    /// Returns the precomputed template.
    pub fn template(&self) -> &T {
        &self.template
    }
}

/// Summary of a preload pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PreloadReport {
    /// Number of templates stored.
    pub templates: usize,
    /// Candidates dropped under [`PreloadPolicy::Skip`], with the reason.
    pub skipped: Vec<(CandidateId, CollaboratorError)>,
    /// Wall-clock time spent in preload.
    pub elapsed: Duration,
}

/// Immutable mapping from candidate identifier to template.
///
/// Entries keep population order; the index gives keyed lookup.
#[derive(Debug)]
pub struct TemplateStore<T> {
    entries: Vec<CandidateTemplate<T>>,
    index: HashMap<CandidateId, usize>,
}

impl<T> TemplateStore<T> {
    /// Loads and templates every candidate of `population`.
    ///
    /// Every key of the returned store maps to a successfully built
    /// template. Under [`PreloadPolicy::Abort`] the first failure is
    /// returned as [`IdentifyError::Population`].
    pub fn preload<L, B>(
        population: &Population,
        loader: &L,
        builder: &B,
        sink: &dyn DiagnosticSink,
        policy: PreloadPolicy,
    ) -> IdentifyResult<(Self, PreloadReport)>
    where
        L: SampleLoader,
        B: TemplateBuilder<L::Sample, Template = T>,
    {
        let _span = trace_span!("preload", candidates = population.len()).entered();
        let started = Instant::now();

        let mut store = Self::with_capacity(population.len());
        let mut skipped = Vec::new();
        for id in population.ids() {
            let built = loader
                .load(&population.sample_path(id))
                .and_then(|sample| builder.build(sink, &sample));
            match built {
                Ok(template) => store.insert(id.clone(), template)?,
                Err(source) => match policy {
                    PreloadPolicy::Abort => {
                        return Err(IdentifyError::Population {
                            candidate: id.clone(),
                            source,
                        });
                    }
                    PreloadPolicy::Skip => {
                        trace_warn!(
                            "preload_skip",
                            candidate = id.as_str(),
                            reason = source.to_string().as_str()
                        );
                        skipped.push((id.clone(), source));
                    }
                },
            }
        }

        let report = PreloadReport {
            templates: store.len(),
            skipped,
            elapsed: started.elapsed(),
        };
        trace_event!(
            "preload_done",
            templates = report.templates,
            skipped = report.skipped.len(),
            elapsed_ms = report.elapsed.as_millis() as u64
        );
        Ok((store, report))
    }

    /// Builds a store from already constructed templates.
    pub fn from_templates<I>(templates: I) -> IdentifyResult<Self>
    where
        I: IntoIterator<Item = (CandidateId, T)>,
    {
        let iter = templates.into_iter();
        let mut store = Self::with_capacity(iter.size_hint().0);
        for (id, template) in iter {
            store.insert(id, template)?;
        }
        Ok(store)
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    fn insert(&mut self, id: CandidateId, template: T) -> IdentifyResult<()> {
        if self.index.contains_key(&id) {
            return Err(IdentifyError::InvalidInput(
                "duplicate candidate identifier in template store",
            ));
        }
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push(CandidateTemplate { id, template });
        Ok(())
    }

    /// Returns the number of stored templates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the store holds no templates.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the template of candidate `id`.
    pub fn get(&self, id: &str) -> Option<&T> {
        self.index
            .get(id)
            .map(|&slot| &self.entries[slot].template)
    }

    /// Returns whether candidate `id` is stored.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Iterates over identifiers in population order.
    pub fn ids(&self) -> impl Iterator<Item = &CandidateId> {
        self.entries.iter().map(|entry| &entry.id)
    }

    /// Iterates over stored entries in population order.
    pub fn iter(&self) -> impl Iterator<Item = &CandidateTemplate<T>> {
        self.entries.iter()
    }

    pub(crate) fn entry(&self, slot: usize) -> Option<&CandidateTemplate<T>> {
        self.entries.get(slot)
    }

    pub(crate) fn slot_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }
}
