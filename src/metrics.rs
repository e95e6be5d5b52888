//! Per-patch and chart-wide calibration error.
//!
//! Errors are signed `reference - measured` in every representation of
//! [`ColorSpace::ALL`]; aggregates are Euclidean norms over the channels the
//! representation's [`ChannelWeights`](crate::colorspace::ChannelWeights)
//! select.

use serde::Serialize;

use crate::colorspace::{Bgr, ColorSpace};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpaceError {
    pub space: ColorSpace,
    pub channels: [f64; 3],
    pub aggregate: f64,
}

impl SpaceError {
    pub fn between(space: ColorSpace, reference: Bgr, measured: Bgr) -> Self {
        let r = space.convert(reference);
        let m = space.convert(measured);
        let channels = [r[0] - m[0], r[1] - m[1], r[2] - m[2]];
        Self {
            space,
            channels,
            aggregate: space.weights().norm(&channels),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchEvaluation {
    pub index: usize,
    pub name: &'static str,
    pub reference: Bgr,
    pub measured: Bgr,
    /// One entry per representation, in [`ColorSpace::ALL`] order.
    pub errors: [SpaceError; 5],
}

impl PatchEvaluation {
    pub fn evaluate(index: usize, name: &'static str, reference: Bgr, measured: Bgr) -> Self {
        Self {
            index,
            name,
            reference,
            measured,
            errors: ColorSpace::ALL.map(|space| SpaceError::between(space, reference, measured)),
        }
    }

    pub fn error(&self, space: ColorSpace) -> &SpaceError {
        &self.errors[space_index(space)]
    }

    /// Chrominance error, the figure shown on each patch.
    pub fn uv_error(&self) -> f64 {
        self.error(ColorSpace::Yuv).aggregate
    }
}

/// Sums over all patches of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpaceTotal {
    pub space: ColorSpace,
    /// Sum of absolute per-channel errors.
    pub channels: [f64; 3],
    /// Sum of per-patch aggregates.
    pub aggregate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartErrorTotals {
    pub spaces: [SpaceTotal; 5],
}

impl Default for ChartErrorTotals {
    fn default() -> Self {
        Self {
            spaces: ColorSpace::ALL.map(|space| SpaceTotal {
                space,
                channels: [0.0; 3],
                aggregate: 0.0,
            }),
        }
    }
}

impl ChartErrorTotals {
    pub fn accumulate(&mut self, patch: &PatchEvaluation) {
        for (total, err) in self.spaces.iter_mut().zip(patch.errors.iter()) {
            for (sum, e) in total.channels.iter_mut().zip(err.channels) {
                *sum += e.abs();
            }
            total.aggregate += err.aggregate;
        }
    }

    pub fn total(&self, space: ColorSpace) -> &SpaceTotal {
        &self.spaces[space_index(space)]
    }
}

impl<'a> FromIterator<&'a PatchEvaluation> for ChartErrorTotals {
    fn from_iter<I: IntoIterator<Item = &'a PatchEvaluation>>(iter: I) -> Self {
        let mut totals = Self::default();
        for patch in iter {
            totals.accumulate(patch);
        }
        totals
    }
}

fn space_index(space: ColorSpace) -> usize {
    match space {
        ColorSpace::Bgr => 0,
        ColorSpace::Yuv => 1,
        ColorSpace::Lab => 2,
        ColorSpace::Hsv => 3,
        ColorSpace::Xyz => 4,
    }
}
