//! idsearch is a concurrent one-to-many identification orchestrator.
//!
//! Given a probe template and a population of precomputed candidate
//! templates, it compares the probe against every candidate on a bounded
//! worker pool and stops as soon as one comparison reaches the acceptance
//! threshold or the deadline elapses. Sample decoding, template
//! construction and scoring are supplied by the caller through the traits
//! in [`collab`].
//!
//! Acceptance is first-qualifying-result-wins: the first accepted result
//! observed ends the search, even if a higher-scoring candidate was still
//! running. Logging is available through the `tracing` feature and image
//! loading through `image-io`.

pub mod collab;
#[cfg(feature = "image-io")]
pub mod io;
pub mod lowlevel;
pub mod population;
pub mod reference;
pub mod search;
pub mod store;
mod trace;
pub mod util;

pub use collab::{
    CollaboratorError, DiagnosticSink, DiscardSink, SampleLoader, Scorer, TemplateBuilder,
};
pub use population::{enumerate_candidates, CandidateId, Population};
pub use search::{
    DeadlinePolicy, IdentifyConfig, Identifier, MatchResult, Outcome, Session, SessionReport,
    SessionStats, Termination,
};
pub use store::{PreloadPolicy, PreloadReport, TemplateStore};
pub use util::{IdentifyError, IdentifyResult};

pub use tokio_util::sync::CancellationToken;
