//! Diagnostic drawing on BGR frames.
//!
//! Geometry is rasterized directly into the frame; text is returned as
//! [`TextItem`]s for a single cairo pass (see [`text::paint`]).

pub mod plots;
pub mod text;

use nalgebra::Point2;

use crate::anchors::MarkerDetection;
use crate::chart::colormap_color;
use crate::colorspace::ColorSpace;
use crate::frame::{Frame, Mask};
use crate::metrics::{ChartErrorTotals, PatchEvaluation};
use text::TextItem;

pub const BLACK: [u8; 3] = [0, 0, 0];
pub const WHITE: [u8; 3] = [255, 255, 255];
pub const BLUE: [u8; 3] = [255, 0, 0];
pub const GREEN: [u8; 3] = [0, 255, 0];
pub const RED: [u8; 3] = [0, 0, 255];
/// Sample-box outline.
pub const ACCENT: [u8; 3] = [163, 0, 255];
/// Summary headings.
pub const HEADING: [u8; 3] = [99, 31, 0];

pub const OUTLINE_THICKNESS: u32 = 2;

const CORNER_MARK: i64 = 3;
const SUMMARY_X: f64 = 10.0;
const SUMMARY_TOP: f64 = 20.0;
const SUMMARY_BAND: f64 = 100.0;
const SUMMARY_LINE: f64 = 20.0;

/// Fill a pixel-aligned rectangle, clipped to the frame.
pub fn fill_rect(frame: &mut Frame<'_>, x: usize, y: usize, w: usize, h: usize, color: [u8; 3]) {
    let x1 = (x + w).min(frame.width());
    let y1 = (y + h).min(frame.height());
    for yy in y..y1 {
        for xx in x..x1 {
            frame.set_pixel(xx, yy, color);
        }
    }
}

fn stamp(frame: &mut Frame<'_>, x: i64, y: i64, color: [u8; 3], thickness: u32) {
    let lo = -(i64::from(thickness) / 2);
    let hi = lo + i64::from(thickness.max(1)) - 1;
    for dy in lo..=hi {
        for dx in lo..=hi {
            frame.put(x + dx, y + dy, color);
        }
    }
}

/// Bresenham line between rounded endpoints, stamped `thickness` wide.
pub fn draw_line(
    frame: &mut Frame<'_>,
    a: &Point2<f64>,
    b: &Point2<f64>,
    color: [u8; 3],
    thickness: u32,
) {
    if !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
        return;
    }
    // Keep wildly off-frame endpoints from walking millions of steps
    let limit = 4.0 * (frame.width() + frame.height()) as f64;
    let clamp = |v: f64| v.round().clamp(-limit, limit) as i64;
    let (mut x0, mut y0) = (clamp(a.x), clamp(a.y));
    let (x1, y1) = (clamp(b.x), clamp(b.y));

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        stamp(frame, x0, y0, color, thickness);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

pub fn draw_polyline(
    frame: &mut Frame<'_>,
    points: &[Point2<f64>],
    closed: bool,
    color: [u8; 3],
    thickness: u32,
) {
    for pair in points.windows(2) {
        draw_line(frame, &pair[0], &pair[1], color, thickness);
    }
    if closed && points.len() > 2 {
        draw_line(frame, &points[points.len() - 1], &points[0], color, thickness);
    }
}

/// Fill the pixels whose centers fall inside `polygon`. Degenerate polygons
/// draw nothing.
pub fn fill_polygon(frame: &mut Frame<'_>, polygon: &[Point2<f64>], color: [u8; 3]) {
    if let Ok(mask) = Mask::from_polygon(frame.width(), frame.height(), polygon) {
        for (x, y) in mask.pixels() {
            frame.set_pixel(x, y, color);
        }
    }
}

/// Outline every detected marker, box its first corner and label it with
/// its identity.
pub fn draw_markers(frame: &mut Frame<'_>, detections: &[MarkerDetection]) -> Vec<TextItem> {
    let mut labels = Vec::with_capacity(detections.len());
    for det in detections {
        draw_polyline(frame, &det.corners, true, GREEN, 1);
        let first = det.corners[0];
        if first.x.is_finite() && first.y.is_finite() {
            let (cx, cy) = (first.x.round() as i64, first.y.round() as i64);
            for d in -CORNER_MARK..=CORNER_MARK {
                frame.put(cx + d, cy - CORNER_MARK, BLUE);
                frame.put(cx + d, cy + CORNER_MARK, BLUE);
                frame.put(cx - CORNER_MARK, cy + d, BLUE);
                frame.put(cx + CORNER_MARK, cy + d, BLUE);
            }
        }
        let center = det
            .corners
            .iter()
            .fold(Point2::origin(), |acc: Point2<f64>, p| acc + p.coords / 4.0);
        labels.push(TextItem::new(format!("id={}", det.id), center.x, center.y, BLUE));
    }
    labels
}

/// Which optional patch overlays to draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchOverlay {
    pub show_ground_truth: bool,
    pub show_error_color: bool,
}

/// Render one color-checker patch from its frame-space quads.
///
/// `ground_truth` is the right half of the full printed patch.
pub fn draw_patch(
    frame: &mut Frame<'_>,
    sample: &[Point2<f64>; 4],
    ground_truth: &[Point2<f64>; 4],
    patch: &PatchEvaluation,
    overlay: PatchOverlay,
) -> Vec<TextItem> {
    let uv = patch.uv_error();
    if overlay.show_ground_truth {
        let [b, g, r] = patch.reference.truncated();
        fill_polygon(frame, ground_truth, [b as u8, g as u8, r as u8]);
    }
    if overlay.show_error_color {
        fill_polygon(frame, sample, colormap_color(uv));
        vec![TextItem::new(
            format!("{}", uv as u64),
            sample[3].x + 5.0,
            sample[3].y - 5.0,
            BLACK,
        )]
    } else {
        draw_polyline(frame, sample, true, ACCENT, OUTLINE_THICKNESS);
        let text = format!("E[UV]{}", uv as u64);
        vec![
            TextItem::new(text.clone(), sample[0].x, sample[0].y, BLACK),
            TextItem::new(text, sample[3].x, sample[3].y, WHITE),
        ]
    }
}

/// Chart-wide totals as stacked bands of one heading and three channel
/// lines, one band per representation in `spaces`.
pub fn summary_block(totals: &ChartErrorTotals, spaces: &[ColorSpace]) -> Vec<TextItem> {
    let mut lines = Vec::with_capacity(spaces.len() * 4);
    for (band, space) in spaces.iter().enumerate() {
        let top = SUMMARY_TOP + SUMMARY_BAND * band as f64;
        let total = totals.total(*space);
        lines.push(TextItem::new(
            format!("E[{}]={}", space.aggregate_label(), total.aggregate as u64),
            SUMMARY_X,
            top + SUMMARY_LINE,
            HEADING,
        ));
        let colors = match space {
            ColorSpace::Bgr => [BLUE, GREEN, RED],
            _ => [BLACK; 3],
        };
        for (i, (label, value)) in space
            .channel_labels()
            .iter()
            .zip(total.channels)
            .enumerate()
        {
            lines.push(TextItem::new(
                format!(" E[{}]={}", label, value as u64),
                SUMMARY_X,
                top + SUMMARY_LINE * (i + 2) as f64,
                colors[i],
            ));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colorspace::Bgr;

    fn blank(data: &mut Vec<u8>, w: usize, h: usize) -> Frame<'_> {
        data.clear();
        data.resize(w * h * 3, 0);
        Frame::new(data, w, h, w * 3).unwrap()
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> [Point2<f64>; 4] {
        [
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ]
    }

    #[test]
    fn thick_line_covers_two_rows() {
        let mut data = Vec::new();
        let mut frame = blank(&mut data, 20, 20);
        draw_line(&mut frame, &Point2::new(2.0, 10.0), &Point2::new(17.0, 10.0), RED, 2);
        assert_eq!(frame.pixel(10, 10), RED);
        assert_eq!(frame.pixel(10, 9), RED);
        assert_eq!(frame.pixel(10, 11), BLACK);
        assert_eq!(frame.pixel(10, 8), BLACK);
    }

    #[test]
    fn off_frame_lines_are_clipped() {
        let mut data = Vec::new();
        let mut frame = blank(&mut data, 10, 10);
        draw_line(&mut frame, &Point2::new(-1e9, 5.0), &Point2::new(1e9, 5.0), GREEN, 1);
        draw_line(&mut frame, &Point2::new(f64::NAN, 0.0), &Point2::new(3.0, 3.0), GREEN, 1);
        assert!((0..10).all(|x| frame.pixel(x, 5) == GREEN));
        assert_eq!(frame.pixel(3, 3), BLACK);
    }

    #[test]
    fn error_color_fill_replaces_outline() {
        let mut data = Vec::new();
        let mut frame = blank(&mut data, 60, 60);
        let patch = PatchEvaluation::evaluate(
            0,
            "test",
            Bgr::new(200.0, 200.0, 200.0),
            Bgr::new(200.0, 200.0, 200.0),
        );
        let sample = square(10.0, 10.0, 30.0, 30.0);
        let gt = square(20.0, 5.0, 35.0, 35.0);

        let texts = draw_patch(
            &mut frame,
            &sample,
            &gt,
            &patch,
            PatchOverlay {
                show_ground_truth: false,
                show_error_color: true,
            },
        );
        assert_eq!(frame.pixel(15, 15), colormap_color(0.0));
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].text, "0");

        let texts = draw_patch(&mut frame, &sample, &gt, &patch, PatchOverlay::default());
        assert_eq!(frame.pixel(10, 20), ACCENT);
        assert_eq!(texts[0].text, "E[UV]0");
        assert_eq!((texts[0].color, texts[1].color), (BLACK, WHITE));
        assert_eq!(texts[1].y, 30.0);
    }

    #[test]
    fn ground_truth_fills_half_patch() {
        let mut data = Vec::new();
        let mut frame = blank(&mut data, 60, 60);
        let patch = PatchEvaluation::evaluate(
            0,
            "test",
            Bgr::new(10.0, 20.0, 30.0),
            Bgr::new(0.0, 0.0, 0.0),
        );
        draw_patch(
            &mut frame,
            &square(10.0, 10.0, 30.0, 30.0),
            &square(20.0, 5.0, 35.0, 35.0),
            &patch,
            PatchOverlay {
                show_ground_truth: true,
                show_error_color: false,
            },
        );
        assert_eq!(frame.pixel(33, 6), [10, 20, 30]);
        assert_eq!(frame.pixel(5, 6), BLACK);
    }

    #[test]
    fn summary_bands_are_stacked() {
        let totals = ChartErrorTotals::default();
        let lines = summary_block(&totals, &ColorSpace::ALL);
        assert_eq!(lines.len(), 20);
        assert_eq!(lines[0].text, "E[BGR]=0");
        assert_eq!(lines[0].y, 40.0);
        assert_eq!(lines[0].color, HEADING);
        assert_eq!(lines[1].text, " E[B]=0");
        assert_eq!(lines[3].color, RED);
        assert_eq!(lines[4].text, "E[UV]=0");
        assert_eq!(lines[4].y, 140.0);
        assert_eq!(lines[5].color, BLACK);
        assert_eq!(lines[19].text, " E[Z]=0");
        assert_eq!(lines[19].y, 500.0);
    }

    #[test]
    fn markers_get_labels() {
        let mut data = Vec::new();
        let mut frame = blank(&mut data, 100, 100);
        let det = MarkerDetection::axis_aligned(923, 20.0, 20.0, 60.0, 60.0);
        let labels = draw_markers(&mut frame, &[det]);
        assert_eq!(labels[0].text, "id=923");
        assert_eq!((labels[0].x, labels[0].y), (40.0, 40.0));
        assert_eq!(frame.pixel(40, 60), GREEN);
        assert_eq!(frame.pixel(20, 17), BLUE);
    }
}
