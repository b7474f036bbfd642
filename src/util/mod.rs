//! Shared utility helpers.

pub mod error;

pub use error::{CollaboratorError, IdentifyError, IdentifyResult};
