//! Sample loading via the `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use std::path::Path;

use crate::collab::{CollaboratorError, SampleLoader};
use crate::reference::GraySample;
use crate::util::{IdentifyError, IdentifyResult};

/// Converts a decoded grayscale buffer into a sample.
pub fn sample_from_gray_image(img: &image::GrayImage) -> IdentifyResult<GraySample> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    GraySample::new(img.as_raw().clone(), width, height)
}

/// Loads an image from disk and converts it to a grayscale sample.
pub fn load_gray_sample<P: AsRef<Path>>(path: P) -> IdentifyResult<GraySample> {
    let img = image::open(path).map_err(|err| IdentifyError::ImageIo {
        reason: err.to_string(),
    })?;
    sample_from_gray_image(&img.to_luma8())
}

/// [`SampleLoader`] decoding PNG or JPEG files into [`GraySample`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageSampleLoader;

impl SampleLoader for ImageSampleLoader {
    type Sample = GraySample;

    fn load(&self, path: &Path) -> Result<GraySample, CollaboratorError> {
        load_gray_sample(path).map_err(|err| CollaboratorError::Load(err.to_string()))
    }
}
