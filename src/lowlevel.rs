//! Low-level building blocks for custom identification pipelines.
//!
//! These expose the pieces a [`Session`](crate::Session) is assembled from:
//! the cancellable scope, the bounded dispatcher, single match tasks and the
//! early-exit aggregator. Most users should prefer [`Identifier`](crate::Identifier)
//! or [`Session`](crate::Session).

pub use crate::search::aggregate::Aggregator;
pub use crate::search::dispatch::{Dispatcher, SessionContext, WorkQueue};
pub use crate::search::scope::Scope;
pub use crate::search::stats::SessionCounters;
pub use crate::search::task::{publish, MatchTask, Publication, TaskReport};
pub use crate::store::CandidateTemplate;
