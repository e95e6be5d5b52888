//! Borrowed view over an interleaved 3-channel frame and polygon masks.
//!
//! Channel order is whatever the buffer carries; the element negotiates BGR
//! so index 0 is blue throughout the crate.

use nalgebra::Point2;

use crate::error::{FrameError, SampleError};

/// Mutable view of one packed 8-bit, 3-channel plane.
pub struct Frame<'a> {
    data: &'a mut [u8],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a> Frame<'a> {
    pub fn new(
        data: &'a mut [u8],
        width: usize,
        height: usize,
        stride: usize,
    ) -> Result<Self, FrameError> {
        if stride < width * 3 {
            return Err(FrameError::StrideTooSmall { stride, width });
        }
        let needed = if height == 0 {
            0
        } else {
            stride * (height - 1) + width * 3
        };
        if data.len() < needed {
            return Err(FrameError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &[u8] {
        &*self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut *self.data
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> usize {
        y * self.stride + x * 3
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = self.offset(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, px: [u8; 3]) {
        let i = self.offset(x, y);
        self.data[i..i + 3].copy_from_slice(&px);
    }

    /// Set a pixel given signed coordinates, ignoring anything off-frame.
    #[inline]
    pub fn put(&mut self, x: i64, y: i64, px: [u8; 3]) {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            self.set_pixel(x as usize, y as usize, px);
        }
    }

    pub fn fill(&mut self, px: [u8; 3]) {
        for y in 0..self.height {
            for x in 0..self.width {
                self.set_pixel(x, y, px);
            }
        }
    }
}

/// Owned frame-sized scratch image, used for the auxiliary plots.
#[derive(Debug, Clone)]
pub struct Canvas {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl Canvas {
    pub fn new(width: usize, height: usize, background: [u8; 3]) -> Self {
        let data = background
            .iter()
            .copied()
            .cycle()
            .take(width * height * 3)
            .collect();
        Self {
            data,
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn as_frame(&mut self) -> Frame<'_> {
        Frame {
            data: &mut self.data,
            width: self.width,
            height: self.height,
            stride: self.width * 3,
        }
    }
}

/// Pixels of a frame whose centers fall inside a polygon.
///
/// Stored as one horizontal span per covered row so that filling, sampling
/// and histogramming only touch covered pixels.
#[derive(Debug, Clone)]
pub struct Mask {
    width: usize,
    height: usize,
    spans: Vec<Span>,
    count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub y: usize,
    pub x0: usize,
    /// Exclusive.
    pub x1: usize,
}

impl Mask {
    /// Rasterize a closed polygon with the even-odd rule at pixel centers.
    pub fn from_polygon(
        width: usize,
        height: usize,
        polygon: &[Point2<f64>],
    ) -> Result<Self, SampleError> {
        if polygon.len() < 3 {
            return Err(SampleError::TooFewVertices(polygon.len()));
        }
        let area = signed_area(polygon);
        if !(area.abs() > 1e-9) {
            return Err(SampleError::ZeroArea);
        }

        let (min_y, max_y) = polygon.iter().fold((f64::MAX, f64::MIN), |(lo, hi), p| {
            (lo.min(p.y), hi.max(p.y))
        });
        let row_start = (min_y - 0.5).ceil().max(0.0) as usize;
        let row_end = ((max_y - 0.5).floor() + 1.0).clamp(0.0, height as f64) as usize;

        let mut spans = Vec::new();
        let mut count = 0;
        let mut crossings: Vec<f64> = Vec::with_capacity(polygon.len());
        for y in row_start..row_end {
            let yc = y as f64 + 0.5;
            crossings.clear();
            for (i, p) in polygon.iter().enumerate() {
                let q = &polygon[(i + 1) % polygon.len()];
                if (p.y <= yc) != (q.y <= yc) {
                    let t = (yc - p.y) / (q.y - p.y);
                    crossings.push(p.x + t * (q.x - p.x));
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));
            for pair in crossings.chunks_exact(2) {
                // Pixel x is inside when x + 0.5 lies in [left, right)
                let x0 = (pair[0] - 0.5).ceil().clamp(0.0, width as f64) as usize;
                let x1 = (pair[1] - 0.5).ceil().clamp(0.0, width as f64) as usize;
                if x1 > x0 {
                    spans.push(Span { y, x0, x1 });
                    count += x1 - x0;
                }
            }
        }

        Ok(Self {
            width,
            height,
            spans,
            count,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Number of covered pixels.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        self.spans
            .iter()
            .any(|s| s.y == y && (s.x0..s.x1).contains(&x))
    }

    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.spans
            .iter()
            .flat_map(|s| (s.x0..s.x1).map(move |x| (x, s.y)))
    }
}

fn signed_area(polygon: &[Point2<f64>]) -> f64 {
    let n = polygon.len();
    (0..n)
        .map(|i| {
            let p = &polygon[i];
            let q = &polygon[(i + 1) % n];
            p.x * q.y - q.x * p.y
        })
        .sum::<f64>()
        / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point2<f64>> {
        vec![
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ]
    }

    #[test]
    fn frame_rejects_short_buffers() {
        let mut data = vec![0u8; 10];
        assert!(matches!(
            Frame::new(&mut data, 4, 1, 12),
            Err(FrameError::BufferTooSmall { needed: 12, got: 10 })
        ));
        assert!(matches!(
            Frame::new(&mut data, 4, 1, 8),
            Err(FrameError::StrideTooSmall { .. })
        ));
    }

    #[test]
    fn frame_honours_stride_padding() {
        let mut data = vec![0u8; 2 * 8];
        let mut frame = Frame::new(&mut data, 2, 2, 8).unwrap();
        frame.set_pixel(1, 1, [1, 2, 3]);
        assert_eq!(frame.pixel(1, 1), [1, 2, 3]);
        assert_eq!(&data[11..14], &[1, 2, 3]);
    }

    #[test]
    fn axis_aligned_rect_covers_pixel_centers() {
        let mask = Mask::from_polygon(20, 20, &rect(2.0, 3.0, 12.0, 8.0)).unwrap();
        assert_eq!(mask.count(), 10 * 5);
        assert!(mask.contains(2, 3));
        assert!(mask.contains(11, 7));
        assert!(!mask.contains(12, 7));
        assert!(!mask.contains(2, 8));
    }

    #[test]
    fn mask_is_clipped_to_frame() {
        let mask = Mask::from_polygon(10, 10, &rect(-5.0, -5.0, 5.0, 5.0)).unwrap();
        assert_eq!(mask.count(), 25);
        assert!(mask.pixels().all(|(x, y)| x < 5 && y < 5));
    }

    #[test]
    fn triangle_is_roughly_half_its_box() {
        let tri = vec![
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 0.0),
            Point2::new(0.0, 100.0),
        ];
        let mask = Mask::from_polygon(100, 100, &tri).unwrap();
        let count = mask.count() as f64;
        assert!((count - 5000.0).abs() < 100.0, "count = {}", count);
    }

    #[test]
    fn degenerate_polygons_are_errors() {
        assert_eq!(
            Mask::from_polygon(10, 10, &rect(1.0, 1.0, 1.0, 5.0)).unwrap_err(),
            SampleError::ZeroArea
        );
        assert_eq!(
            Mask::from_polygon(10, 10, &[Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)])
                .unwrap_err(),
            SampleError::TooFewVertices(2)
        );
    }

    #[test]
    fn canvas_starts_filled() {
        let mut canvas = Canvas::new(3, 2, [255, 255, 255]);
        assert_eq!(canvas.pixel(2, 1), [255, 255, 255]);
        canvas.as_frame().set_pixel(0, 0, [1, 2, 3]);
        assert_eq!(canvas.pixel(0, 0), [1, 2, 3]);
    }
}
