//! Auxiliary plots drawn on a flat canvas and warped into the chart.

use nalgebra::Point2;

use super::{draw_polyline, fill_rect, BLUE, GREEN, RED, WHITE};
use super::text::TextItem;
use crate::colorspace::Bgr;
use crate::error::HomographyError;
use crate::frame::{Canvas, Frame, Mask};
use crate::homography::Homography;
use crate::sampler::ChannelHistograms;

pub const BAR_CANVAS: (usize, usize) = (100, 100);
pub const HISTOGRAM_CANVAS: (usize, usize) = (512, 400);

const BAR_WIDTH: usize = 20;
const BAR_BASELINE: usize = 80;
const BAR_SLOTS: [usize; 3] = [10, 40, 70];
const LABEL_BASELINE: f64 = 90.0;
const LABEL_SCALE: f64 = 0.75;

/// Canvas plus labels positioned in canvas coordinates.
#[derive(Debug, Clone)]
pub struct Plot {
    pub canvas: Canvas,
    pub labels: Vec<TextItem>,
}

/// Height in pixels of a bar for a channel mean on the 0-255 scale.
pub fn bar_height(mean: f64) -> usize {
    ((mean / 256.0 * BAR_BASELINE as f64) as usize).min(BAR_BASELINE)
}

/// Three bars (B, G, R) rising from a common baseline with their truncated
/// values beneath.
pub fn bar_chart(mean: Bgr) -> Plot {
    let (w, h) = BAR_CANVAS;
    let mut canvas = Canvas::new(w, h, WHITE);
    let mut labels = Vec::with_capacity(3);
    {
        let mut frame = canvas.as_frame();
        for ((value, x), color) in mean
            .to_array()
            .into_iter()
            .zip(BAR_SLOTS)
            .zip([BLUE, GREEN, RED])
        {
            let bar = bar_height(value);
            fill_rect(&mut frame, x, BAR_BASELINE - bar, BAR_WIDTH, bar, color);
            labels.push(
                TextItem::new((value as i64).to_string(), x as f64, LABEL_BASELINE, color)
                    .scaled(LABEL_SCALE),
            );
        }
    }
    Plot { canvas, labels }
}

/// Scale bins linearly so the smallest maps to 0 and the largest to `top`.
/// A flat histogram maps to 0 everywhere.
pub fn normalize_min_max(bins: &[u32], top: f64) -> Vec<f64> {
    let min = bins.iter().copied().min().unwrap_or(0);
    let max = bins.iter().copied().max().unwrap_or(0);
    if max == min {
        return vec![0.0; bins.len()];
    }
    let range = f64::from(max - min);
    bins.iter()
        .map(|&b| f64::from(b - min) / range * top)
        .collect()
}

/// Per-channel histogram polylines on a black canvas.
pub fn histogram_plot(hist: &ChannelHistograms) -> Plot {
    let (w, h) = HISTOGRAM_CANVAS;
    let mut canvas = Canvas::new(w, h, [0, 0, 0]);
    let bin_width = (w as f64 / ChannelHistograms::BINS as f64).round();
    {
        let mut frame = canvas.as_frame();
        for (bins, color) in hist.channels.iter().zip([BLUE, GREEN, RED]) {
            let points: Vec<_> = normalize_min_max(bins, h as f64)
                .into_iter()
                .enumerate()
                .map(|(i, v)| Point2::new(bin_width * i as f64, h as f64 - v.round()))
                .collect();
            draw_polyline(&mut frame, &points, false, color, 2);
        }
    }
    Plot {
        canvas,
        labels: Vec::new(),
    }
}

/// Warp `plot` so its canvas corners land on `quad` (TL, TR, BR, BL) and
/// composite it into the frame.
///
/// The quad is cleared and the warped canvas added on top, so only pixels
/// inside the quad change. Labels are returned mapped into frame
/// coordinates.
pub fn warp_into(
    frame: &mut Frame<'_>,
    plot: &Plot,
    quad: &[Point2<f64>; 4],
) -> Result<Vec<TextItem>, HomographyError> {
    let canvas = &plot.canvas;
    let forward = Homography::from_canvas(canvas.width() as u32, canvas.height() as u32, quad)?;
    let inverse = forward.inverse()?;

    if let Ok(mask) = Mask::from_polygon(frame.width(), frame.height(), quad) {
        for (x, y) in mask.pixels() {
            let src = inverse.map(&Point2::new(x as f64, y as f64));
            frame.set_pixel(x, y, sample_bilinear(canvas, src.x, src.y));
        }
    }

    Ok(plot
        .labels
        .iter()
        .map(|label| {
            let at = forward.map(&Point2::new(label.x, label.y));
            TextItem {
                x: at.x,
                y: at.y,
                ..label.clone()
            }
        })
        .collect())
}

// Samples outside the canvas read as black.
fn sample_bilinear(canvas: &Canvas, x: f64, y: f64) -> [u8; 3] {
    if !x.is_finite() || !y.is_finite() {
        return [0, 0, 0];
    }
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let fetch = |xi: f64, yi: f64| -> [f64; 3] {
        if xi < 0.0 || yi < 0.0 || xi >= canvas.width() as f64 || yi >= canvas.height() as f64 {
            [0.0; 3]
        } else {
            canvas.pixel(xi as usize, yi as usize).map(f64::from)
        }
    };
    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1.0, y0);
    let p01 = fetch(x0, y0 + 1.0);
    let p11 = fetch(x0 + 1.0, y0 + 1.0);
    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}
