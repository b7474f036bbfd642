//! Collaborator interfaces consumed by the identification core.
//!
//! Sample decoding, template construction and pairwise scoring are external
//! services. The core only needs the narrow contracts below; the
//! [`reference`](crate::reference) module ships a small grayscale
//! implementation for demos and benchmarks.

use std::path::Path;

use tokio_util::sync::CancellationToken;

pub use crate::util::CollaboratorError;

/// Decodes a raw biometric sample from storage.
pub trait SampleLoader: Send + Sync {
    type Sample;

    /// Loads the sample stored at `path`.
    fn load(&self, path: &Path) -> Result<Self::Sample, CollaboratorError>;
}

/// Builds a comparable template from a decoded sample.
///
/// Implementations may offer diagnostic artifacts to `sink` while they
/// work; a sink error must abort construction.
pub trait TemplateBuilder<S>: Send + Sync {
    type Template: Send + Sync + 'static;

    /// Constructs the template for `sample`.
    fn build(
        &self,
        sink: &dyn DiagnosticSink,
        sample: &S,
    ) -> Result<Self::Template, CollaboratorError>;
}

/// Pairwise similarity between two templates.
///
/// Called from blocking worker threads. Long comparisons should poll
/// `scope` and return [`CollaboratorError::Cancelled`] once it fires.
pub trait Scorer<T>: Send + Sync {
    /// Returns the similarity of `candidate` to `probe`; higher is closer.
    fn score(
        &self,
        scope: &CancellationToken,
        probe: &T,
        candidate: &T,
    ) -> Result<f64, CollaboratorError>;
}

/// Receiver for diagnostic artifacts produced during template construction.
pub trait DiagnosticSink: Send + Sync {
    /// Returns whether the sink wants the artifact named `key`.
    fn accepts(&self, key: &str) -> bool {
        let _ = key;
        true
    }

    /// Stores one artifact. An error tells the builder to abort.
    fn accept(&self, key: &str, mime: &str, payload: &[u8]) -> Result<(), CollaboratorError>;
}

/// Sink that accepts every artifact and keeps nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardSink;

impl DiagnosticSink for DiscardSink {
    fn accept(&self, _key: &str, _mime: &str, _payload: &[u8]) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Offers an artifact to `sink`, building the payload only if it is wanted.
pub fn offer<F>(
    sink: &dyn DiagnosticSink,
    key: &str,
    mime: &str,
    payload: F,
) -> Result<(), CollaboratorError>
where
    F: FnOnce() -> Vec<u8>,
{
    if !sink.accepts(key) {
        return Ok(());
    }
    sink.accept(key, mime, &payload())
}
