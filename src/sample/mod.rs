//! # Sample Builder
//! Turns a raw light curve into a fixed-shape training sample:
//!
//! ```text
//!  RawSeries ──filter(valid)──▶ median ──divide──▶ take(cap) ──▶ NormalizedSeries
//! ```
//!
//! The median is computed over every valid sample *before* truncation, so the
//! normalization base never depends on the window size.

pub mod format;
pub mod writer;

use crate::error::EmptySeriesError;
use crate::retrieval::types::RawSample;

pub use format::{read_labeled_sample, serialize, LabeledSample};
pub use writer::write_labeled_file;

/// Default number of samples kept per output file.
pub const DEFAULT_CAP: usize = 500;

/// One row of the output file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    /// Dimensionless flux (`raw / median`).
    pub flux: f64,
    /// Timestamp in the provider's units, untouched.
    pub timestamp: f64,
}

/// Median-normalized, truncated series in time order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedSeries {
    pub points: Vec<NormalizedPoint>,
    /// Median of the valid raw flux values used as the normalization base.
    pub median_flux: f64,
}

impl NormalizedSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Filter, median-normalize and truncate `raw` to at most `cap` samples.
///
/// Fails when no valid sample remains, the median is zero or non-finite, or
/// a valid sample (raw or normalized) is not a finite number. NaN or Inf
/// never reaches the serialized file.
pub fn build(raw: &[RawSample], cap: usize) -> Result<NormalizedSeries, EmptySeriesError> {
    let mut valid: Vec<(usize, &RawSample)> = Vec::with_capacity(raw.len());
    for (index, s) in raw.iter().enumerate().filter(|(_, s)| s.valid) {
        if !s.flux.is_finite() || !s.timestamp.is_finite() {
            return Err(EmptySeriesError::NonFinite { index });
        }
        valid.push((index, s));
    }
    if valid.is_empty() {
        return Err(EmptySeriesError::NoValidSamples { dropped: raw.len() });
    }

    let fluxes: Vec<f64> = valid.iter().map(|(_, s)| s.flux).collect();
    let median_flux = median(&fluxes).unwrap_or(f64::NAN);
    if !median_flux.is_finite() || median_flux == 0.0 {
        return Err(EmptySeriesError::DegenerateMedian {
            median: median_flux,
        });
    }

    let points = valid
        .into_iter()
        .take(cap)
        .map(|(index, s)| {
            let flux = s.flux / median_flux;
            if flux.is_finite() {
                Ok(NormalizedPoint {
                    flux,
                    timestamp: s.timestamp,
                })
            } else {
                Err(EmptySeriesError::NonFinite { index })
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NormalizedSeries {
        points,
        median_flux,
    })
}

/// Standard median: middle value, or mean of the two middle values for even
/// counts. `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        return Some(sorted[mid]);
    }
    let (a, b) = (sorted[mid - 1], sorted[mid]);
    let sum = a + b;
    if sum.is_finite() {
        Some(sum / 2.0)
    } else {
        Some(a / 2.0 + b / 2.0)
    }
}
