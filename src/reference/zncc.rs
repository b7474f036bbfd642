//! Zero-mean thumbnail templates compared by normalized cross-correlation.

use tokio_util::sync::CancellationToken;

use crate::collab::{offer, CollaboratorError, DiagnosticSink, Scorer, TemplateBuilder};
use crate::reference::GraySample;

/// Precomputed zero-mean thumbnail of a sample.
#[derive(Clone, Debug)]
pub struct ZnccTemplate {
    side: usize,
    mean: f32,
    inv_std: f32,
    zero_mean: Vec<f32>,
    energy: f64,
}

impl ZnccTemplate {
    /// Builds a template from `side * side` thumbnail pixels.
    pub fn from_pixels(pixels: &[u8], side: usize) -> Result<Self, CollaboratorError> {
        if side == 0 || pixels.len() != side * side {
            return Err(CollaboratorError::Build(format!(
                "expected {} thumbnail pixels, got {}",
                side * side,
                pixels.len()
            )));
        }

        let count = pixels.len() as f64;
        let sum: f64 = pixels.iter().map(|&v| f64::from(v)).sum();
        let mean = sum / count;
        let zero_mean: Vec<f32> = pixels.iter().map(|&v| (f64::from(v) - mean) as f32).collect();
        let energy: f64 = zero_mean.iter().map(|&v| f64::from(v) * f64::from(v)).sum();
        if energy / count <= 1e-8 {
            return Err(CollaboratorError::Build("zero variance thumbnail".into()));
        }

        Ok(Self {
            side,
            mean: mean as f32,
            inv_std: (1.0 / (energy / count).sqrt()) as f32,
            zero_mean,
            energy,
        })
    }

    /// Returns the thumbnail side length.
    pub fn side(&self) -> usize {
        self.side
    }

    /// Returns the mean intensity of the thumbnail.
    pub fn mean(&self) -> f32 {
        self.mean
    }

    /// Returns the inverse standard deviation of the thumbnail.
    pub fn inv_std(&self) -> f32 {
        self.inv_std
    }

    /// Returns the zero-mean thumbnail in row-major order.
    pub fn zero_mean(&self) -> &[f32] {
        &self.zero_mean
    }
}

/// Builds [`ZnccTemplate`]s from [`GraySample`]s.
///
/// Offers two diagnostic artifacts: `thumbnail` (raw `side * side` bytes)
/// and `statistics` (plain text).
#[derive(Clone, Copy, Debug)]
pub struct ZnccTemplateBuilder {
    side: usize,
}

impl ZnccTemplateBuilder {
    /// Creates a builder producing `side x side` thumbnails (minimum 2).
    pub fn new(side: usize) -> Self {
        Self { side: side.max(2) }
    }
}

impl Default for ZnccTemplateBuilder {
    fn default() -> Self {
        Self::new(32)
    }
}

impl TemplateBuilder<GraySample> for ZnccTemplateBuilder {
    type Template = ZnccTemplate;

    fn build(
        &self,
        sink: &dyn DiagnosticSink,
        sample: &GraySample,
    ) -> Result<ZnccTemplate, CollaboratorError> {
        let thumbnail = sample.resample_square(self.side);
        offer(sink, "thumbnail", "application/octet-stream", || {
            thumbnail.clone()
        })?;
        let template = ZnccTemplate::from_pixels(&thumbnail, self.side)?;
        offer(sink, "statistics", "text/plain", || {
            format!(
                "side={} mean={:.3} inv_std={:.6}",
                template.side, template.mean, template.inv_std
            )
            .into_bytes()
        })?;
        Ok(template)
    }
}

/// Scores templates as `100 * max(0, zncc)`.
///
/// Checks the scope once per thumbnail row.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZnccScorer;

impl Scorer<ZnccTemplate> for ZnccScorer {
    fn score(
        &self,
        scope: &CancellationToken,
        probe: &ZnccTemplate,
        candidate: &ZnccTemplate,
    ) -> Result<f64, CollaboratorError> {
        if probe.side != candidate.side {
            return Err(CollaboratorError::Score(format!(
                "template size mismatch: {} vs {}",
                probe.side, candidate.side
            )));
        }

        let mut dot = 0.0f64;
        let rows = probe
            .zero_mean
            .chunks(probe.side)
            .zip(candidate.zero_mean.chunks(candidate.side));
        for (p_row, c_row) in rows {
            if scope.is_cancelled() {
                return Err(CollaboratorError::Cancelled);
            }
            dot += p_row
                .iter()
                .zip(c_row)
                .map(|(&p, &c)| f64::from(p) * f64::from(c))
                .sum::<f64>();
        }

        let zncc = dot / (probe.energy * candidate.energy).sqrt();
        Ok((zncc.max(0.0) * 100.0).min(100.0))
    }
}
