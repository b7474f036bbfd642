//! Reference collaborators used by the CLI, benchmarks and tests.
//!
//! These are deliberately simple: a grayscale sample, a fixed-size
//! zero-mean thumbnail as template, and zero-normalized cross-correlation
//! as score. They make the orchestrator runnable end to end; they are not a
//! biometric feature extractor.

mod zncc;

pub use zncc::{ZnccScorer, ZnccTemplate, ZnccTemplateBuilder};

use crate::util::{IdentifyError, IdentifyResult};

/// Owned 8-bit grayscale sample in row-major order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraySample {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl GraySample {
    /// Creates a sample from a contiguous buffer of `width * height` pixels.
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> IdentifyResult<Self> {
        if width == 0 || height == 0 {
            return Err(IdentifyError::InvalidDimensions { width, height });
        }
        let needed = width
            .checked_mul(height)
            .ok_or(IdentifyError::InvalidDimensions { width, height })?;
        if data.len() != needed {
            return Err(IdentifyError::BufferSize {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Returns the sample width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the sample height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the pixel buffer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns row `y`, or `None` when out of bounds.
    pub fn row(&self, y: usize) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.width;
        self.data.get(start..start + self.width)
    }

    /// Box-filters the sample down (or nearest-samples it up) to `side x side`.
    pub(crate) fn resample_square(&self, side: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(side * side);
        for oy in 0..side {
            let (y0, y1) = span(oy, side, self.height);
            for ox in 0..side {
                let (x0, x1) = span(ox, side, self.width);
                let mut sum = 0u64;
                for y in y0..y1 {
                    let row = &self.data[y * self.width..(y + 1) * self.width];
                    sum += row[x0..x1].iter().map(|&v| u64::from(v)).sum::<u64>();
                }
                let count = ((y1 - y0) * (x1 - x0)) as u64;
                out.push(((sum + count / 2) / count) as u8);
            }
        }
        out
    }
}

/// Source range covered by output cell `index` of `cells` over `len` pixels.
fn span(index: usize, cells: usize, len: usize) -> (usize, usize) {
    let start = index * len / cells;
    let end = ((index + 1) * len / cells).max(start + 1).min(len);
    (start.min(len - 1), end)
}
