//! Single-pixel color conversions used to express patch errors.
//!
//! Every representation is a [`ColorSpace`] value: a conversion from the
//! native BGR sample plus a [`ChannelWeights`] mask saying which channels
//! count toward the representation's aggregate (Euclidean) error.

use serde::Serialize;

/// Mean or reference color on the 0-255 scale, BGR order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Bgr {
    pub b: f64,
    pub g: f64,
    pub r: f64,
}

impl Bgr {
    pub const fn new(b: f64, g: f64, r: f64) -> Self {
        Self { b, g, r }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.b, self.g, self.r]
    }

    /// Channels truncated toward zero, as handed to correction scripts.
    pub fn truncated(self) -> [i64; 3] {
        [self.b as i64, self.g as i64, self.r as i64]
    }
}

impl From<[u8; 3]> for Bgr {
    fn from(px: [u8; 3]) -> Self {
        Self::new(f64::from(px[0]), f64::from(px[1]), f64::from(px[2]))
    }
}

impl From<[f64; 3]> for Bgr {
    fn from(c: [f64; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

/// Which channels of a representation enter its aggregate error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelWeights(pub [bool; 3]);

impl ChannelWeights {
    pub const ALL: Self = Self([true, true, true]);

    /// Euclidean norm over the selected channels.
    pub fn norm(&self, errors: &[f64; 3]) -> f64 {
        errors
            .iter()
            .zip(self.0.iter())
            .filter(|(_, &on)| on)
            .map(|(e, _)| e * e)
            .sum::<f64>()
            .sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    /// Native sample order.
    Bgr,
    /// Luma and two chrominance channels.
    Yuv,
    /// CIE L*a*b*, D65.
    Lab,
    Hsv,
    /// CIE XYZ tristimulus.
    Xyz,
}

impl ColorSpace {
    /// Display and accumulation order.
    pub const ALL: [ColorSpace; 5] = [
        ColorSpace::Bgr,
        ColorSpace::Yuv,
        ColorSpace::Lab,
        ColorSpace::Hsv,
        ColorSpace::Xyz,
    ];

    pub fn convert(&self, c: Bgr) -> [f64; 3] {
        match self {
            ColorSpace::Bgr => c.to_array(),
            ColorSpace::Yuv => bgr_to_yuv(c),
            ColorSpace::Lab => bgr_to_lab(c),
            ColorSpace::Hsv => bgr_to_hsv(c),
            ColorSpace::Xyz => bgr_to_xyz(c),
        }
    }

    /// Luma is left out of the YUV aggregate so that it scores color
    /// fidelity rather than exposure.
    pub fn weights(&self) -> ChannelWeights {
        match self {
            ColorSpace::Yuv => ChannelWeights([false, true, true]),
            _ => ChannelWeights::ALL,
        }
    }

    /// Name of the aggregate in overlays, e.g. `E[UV]`.
    pub fn aggregate_label(&self) -> &'static str {
        match self {
            ColorSpace::Bgr => "BGR",
            ColorSpace::Yuv => "UV",
            ColorSpace::Lab => "LAB",
            ColorSpace::Hsv => "HSV",
            ColorSpace::Xyz => "XYZ",
        }
    }

    pub fn channel_labels(&self) -> [&'static str; 3] {
        match self {
            ColorSpace::Bgr => ["B", "G", "R"],
            ColorSpace::Yuv => ["Y", "U", "V"],
            ColorSpace::Lab => ["L", "A", "B"],
            ColorSpace::Hsv => ["H", "S", "V"],
            ColorSpace::Xyz => ["X", "Y", "Z"],
        }
    }
}

// Linear sRGB (D65) to XYZ, rows X, Y, Z; columns R, G, B
const RGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.412453, 0.357580, 0.180423],
    [0.212671, 0.715160, 0.072169],
    [0.019334, 0.119193, 0.950227],
];

const WHITE_X: f64 = 0.950456;
const WHITE_Z: f64 = 1.088754;

// (6/29)^3
const LAB_EPSILON: f64 = 0.008856;

fn rgb_to_xyz(r: f64, g: f64, b: f64) -> [f64; 3] {
    RGB_TO_XYZ.map(|row| row[0] * r + row[1] * g + row[2] * b)
}

fn bgr_to_yuv(c: Bgr) -> [f64; 3] {
    let y = 0.299 * c.r + 0.587 * c.g + 0.114 * c.b;
    let u = 0.492 * (c.b - y) + 128.0;
    let v = 0.877 * (c.r - y) + 128.0;
    [y, u, v]
}

/// XYZ on the 0-255 scale, no gamma: the sample is treated as linear.
fn bgr_to_xyz(c: Bgr) -> [f64; 3] {
    rgb_to_xyz(c.r, c.g, c.b)
}

fn srgb_to_linear(v: f64) -> f64 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_f(t: f64) -> f64 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn bgr_to_lab(c: Bgr) -> [f64; 3] {
    let lin = |v: f64| srgb_to_linear((v / 255.0).clamp(0.0, 1.0));
    let [x, y, z] = rgb_to_xyz(lin(c.r), lin(c.g), lin(c.b));
    let fx = lab_f(x / WHITE_X);
    let fy = lab_f(y);
    let fz = lab_f(z / WHITE_Z);
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// Hue in degrees, saturation in [0, 1], value on the sample's scale.
fn bgr_to_hsv(c: Bgr) -> [f64; 3] {
    let v = c.r.max(c.g).max(c.b);
    let min = c.r.min(c.g).min(c.b);
    let diff = v - min;
    let s = if v > 0.0 { diff / v } else { 0.0 };
    let h = if diff <= 0.0 {
        0.0
    } else if v == c.r {
        60.0 * (c.g - c.b) / diff
    } else if v == c.g {
        120.0 + 60.0 * (c.b - c.r) / diff
    } else {
        240.0 + 60.0 * (c.r - c.g) / diff
    };
    let h = if h < 0.0 { h + 360.0 } else { h };
    [h, s, v]
}
