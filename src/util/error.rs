//! Error types for idsearch.

use std::path::PathBuf;

use thiserror::Error;

use crate::population::CandidateId;

/// Result alias for idsearch operations.
pub type IdentifyResult<T> = std::result::Result<T, IdentifyError>;

/// Errors that can abort an identification request.
///
/// Scoring failures are deliberately absent: a failed comparison is
/// isolated to its match task and counted as a non-match.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum IdentifyError {
    /// The input data or parameters are invalid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Sample dimensions are zero or overflow.
    #[error("invalid dimensions: width={width}, height={height}")]
    InvalidDimensions { width: usize, height: usize },
    /// The sample buffer length does not match its dimensions.
    #[error("buffer size mismatch: needed {needed}, got {got}")]
    BufferSize { needed: usize, got: usize },
    /// The candidate population could not be listed.
    #[error("failed to enumerate candidates under {path}: {reason}")]
    Enumerate { path: PathBuf, reason: String },
    /// A candidate sample could not be loaded or templated during preload.
    #[error("candidate {candidate} could not be templated: {source}")]
    Population {
        candidate: CandidateId,
        source: CollaboratorError,
    },
    /// The probe sample could not be loaded or templated.
    #[error("probe could not be templated: {source}")]
    Probe { source: CollaboratorError },
    /// A worker of the session pool panicked or was aborted.
    #[error("match worker failed: {reason}")]
    Worker { reason: String },
    /// Image decoding failed.
    #[cfg(feature = "image-io")]
    #[error("image I/O error: {reason}")]
    ImageIo { reason: String },
}

/// Errors reported by the external collaborators (loader, builder, scorer, sink).
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CollaboratorError {
    /// The raw sample could not be read or decoded.
    #[error("sample load failed: {0}")]
    Load(String),
    /// Template construction failed.
    #[error("template construction failed: {0}")]
    Build(String),
    /// The pairwise comparison failed.
    #[error("scoring failed: {0}")]
    Score(String),
    /// A diagnostic sink refused an artifact and asked the builder to abort.
    #[error("diagnostic sink rejected artifact {key}")]
    SinkRejected { key: String },
    /// The comparison observed scope cancellation and stopped early.
    #[error("cancelled")]
    Cancelled,
}
