//! Text labels rendered with cairo and pango.
//!
//! Labels for a frame are collected first and painted in one pass: the
//! covered regions are copied into an `Rgb24` cairo surface, every layout is
//! shown, and the regions are copied back into the BGR frame.

use pangocairo::functions::{create_layout, show_layout};
use thiserror::Error;

use crate::frame::Frame;

#[derive(Debug, Error)]
pub enum TextError {
    #[error("cairo: {0}")]
    Cairo(#[from] cairo::Error),
    #[error("surface data unavailable: {0}")]
    SurfaceData(#[from] cairo::BorrowError),
}

/// One label. `(x, y)` is the bottom-left corner of the text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub text: String,
    pub x: f64,
    pub y: f64,
    /// BGR.
    pub color: [u8; 3],
    /// Multiplier on the configured font size.
    pub scale: f64,
}

impl TextItem {
    pub fn new(text: impl Into<String>, x: f64, y: f64, color: [u8; 3]) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            color,
            scale: 1.0,
        }
    }

    pub fn scaled(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font: String,
    /// Pixels.
    pub size: u32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: "Monospace".to_string(),
            size: 11,
        }
    }
}

// Clipped pixel rectangle touched by one label.
#[derive(Debug, Clone, Copy)]
struct Region {
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
}

impl Region {
    // None when the rectangle misses the frame entirely.
    fn clipped(x0: i64, y0: i64, x1: i64, y1: i64, width: i32, height: i32) -> Option<Self> {
        let (w, h) = (i64::from(width), i64::from(height));
        if x1 <= 0 || y1 <= 0 || x0 >= w || y0 >= h {
            return None;
        }
        Some(Self {
            x0: x0.clamp(0, w) as usize,
            y0: y0.clamp(0, h) as usize,
            x1: x1.clamp(0, w) as usize,
            y1: y1.clamp(0, h) as usize,
        })
    }
}

const MARGIN: i64 = 2;
// Far beyond any frame, small enough that region sums cannot overflow.
const COORD_LIMIT: f64 = 1.0e9;
const MAX_FONT_SIZE: f64 = 4096.0;

/// Paint every item onto `frame`. Items fully outside the frame are skipped.
pub fn paint(
    frame: &mut Frame<'_>,
    items: &[TextItem],
    style: &TextStyle,
) -> Result<(), TextError> {
    if items.is_empty() || frame.width() == 0 || frame.height() == 0 {
        return Ok(());
    }
    let (width, height) = (frame.width() as i32, frame.height() as i32);
    let mut surface = cairo::ImageSurface::create(cairo::Format::Rgb24, width, height)?;

    let mut placed = Vec::with_capacity(items.len());
    {
        let cr = cairo::Context::new(&surface)?;
        for item in items {
            // Mapped label anchors can land arbitrarily far away
            if !item.x.is_finite() || !item.y.is_finite() {
                continue;
            }
            let layout = create_layout(&cr);
            let font = pango::FontDescription::from_string(&style.font);
            layout.set_font_description(Some(&font));
            let font_size = (f64::from(style.size) * item.scale)
                .round()
                .max(1.0)
                .min(MAX_FONT_SIZE) as i32;
            let attr_list = pango::AttrList::new();
            attr_list.insert(pango::AttrSize::new_size_absolute(font_size * pango::SCALE));
            layout.set_attributes(Some(&attr_list));
            layout.set_text(&item.text);

            let (text_width, text_height) = layout.pixel_size();
            let left = item.x.round().clamp(-COORD_LIMIT, COORD_LIMIT) as i64;
            let top = item.y.round().clamp(-COORD_LIMIT, COORD_LIMIT) as i64
                - i64::from(text_height);
            let Some(region) = Region::clipped(
                left - MARGIN,
                top - MARGIN,
                left + i64::from(text_width) + MARGIN,
                top + i64::from(text_height) + MARGIN,
                width,
                height,
            ) else {
                continue;
            };
            placed.push((layout, item, left as f64, top as f64, region));
        }
    }
    if placed.is_empty() {
        return Ok(());
    }

    let surface_stride = surface.stride() as usize;
    {
        let mut surface_data = surface.data()?;
        for (_, _, _, _, region) in &placed {
            for y in region.y0..region.y1 {
                for x in region.x0..region.x1 {
                    let px = frame.pixel(x, y);
                    let idx = y * surface_stride + x * 4;
                    // Rgb24 is native-endian xRGB, i.e. B G R x in memory
                    surface_data[idx] = px[0];
                    surface_data[idx + 1] = px[1];
                    surface_data[idx + 2] = px[2];
                    surface_data[idx + 3] = 255;
                }
            }
        }
    }

    {
        let cr = cairo::Context::new(&surface)?;
        for (layout, item, left, top, _) in &placed {
            cr.save()?;
            cr.set_source_rgb(
                f64::from(item.color[2]) / 255.0,
                f64::from(item.color[1]) / 255.0,
                f64::from(item.color[0]) / 255.0,
            );
            cr.move_to(*left, *top);
            show_layout(&cr, layout);
            cr.restore()?;
        }
    }
    surface.flush();

    let surface_data = surface.data()?;
    for (_, _, _, _, region) in &placed {
        for y in region.y0..region.y1 {
            for x in region.x0..region.x1 {
                let idx = y * surface_stride + x * 4;
                frame.set_pixel(
                    x,
                    y,
                    [surface_data[idx], surface_data[idx + 1], surface_data[idx + 2]],
                );
            }
        }
    }

    Ok(())
}
