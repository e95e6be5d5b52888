//! Masked statistics over polygonal regions of a frame.

use nalgebra::Point2;
use serde::Serialize;

use crate::colorspace::Bgr;
use crate::error::SampleError;
use crate::frame::{Frame, Mask};

/// Per-channel mean of the pixels whose centers fall inside `polygon`.
///
/// A fresh mask is rasterized on every call.
pub fn mean_color(frame: &Frame<'_>, polygon: &[Point2<f64>]) -> Result<Bgr, SampleError> {
    let mask = Mask::from_polygon(frame.width(), frame.height(), polygon)?;
    masked_mean(frame, &mask)
}

pub fn masked_mean(frame: &Frame<'_>, mask: &Mask) -> Result<Bgr, SampleError> {
    if mask.is_empty() {
        return Err(SampleError::EmptyRegion);
    }
    let mut sums = [0u64; 3];
    for (x, y) in mask.pixels() {
        let px = frame.pixel(x, y);
        for (sum, v) in sums.iter_mut().zip(px) {
            *sum += u64::from(v);
        }
    }
    let n = mask.count() as f64;
    Ok(Bgr::new(
        sums[0] as f64 / n,
        sums[1] as f64 / n,
        sums[2] as f64 / n,
    ))
}

/// 256-bin histogram per channel, BGR order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelHistograms {
    pub channels: [Vec<u32>; 3],
}

impl ChannelHistograms {
    pub const BINS: usize = 256;

    fn empty() -> Self {
        Self {
            channels: [
                vec![0; Self::BINS],
                vec![0; Self::BINS],
                vec![0; Self::BINS],
            ],
        }
    }

    pub fn total(&self, channel: usize) -> u64 {
        self.channels[channel].iter().map(|&c| u64::from(c)).sum()
    }
}

pub fn histogram(
    frame: &Frame<'_>,
    polygon: &[Point2<f64>],
) -> Result<ChannelHistograms, SampleError> {
    let mask = Mask::from_polygon(frame.width(), frame.height(), polygon)?;
    masked_histogram(frame, &mask)
}

pub fn masked_histogram(frame: &Frame<'_>, mask: &Mask) -> Result<ChannelHistograms, SampleError> {
    if mask.is_empty() {
        return Err(SampleError::EmptyRegion);
    }
    let mut hist = ChannelHistograms::empty();
    for (x, y) in mask.pixels() {
        let px = frame.pixel(x, y);
        for (channel, v) in hist.channels.iter_mut().zip(px) {
            channel[usize::from(v)] += 1;
        }
    }
    Ok(hist)
}
