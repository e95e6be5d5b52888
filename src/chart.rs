//! Static reference data for the supported charts.
//!
//! Reference coordinates live in the 608x512 space spanned by the four
//! anchor markers of the printed color-checker target.

use nalgebra::Point2;
use serde::Serialize;

/// Which physical target the anchor markers announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartMode {
    None,
    ColorChecker,
    WhiteReference,
    Histogram,
}

impl ChartMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartMode::None => "none",
            ChartMode::ColorChecker => "color-checker",
            ChartMode::WhiteReference => "white-reference",
            ChartMode::Histogram => "histogram",
        }
    }
}

/// Reference geometry and ground truth of a patch chart.
#[derive(Debug)]
pub struct ChartDefinition {
    pub name: &'static str,
    /// Anchor quad in reference space: TL, TR, BR, BL.
    pub anchor_corners: [[f64; 2]; 4],
    /// Outer boundary of the printed chart: TL, TR, BR, BL.
    pub chart_corners: [[f64; 2]; 4],
    pub centroids: &'static [[f64; 2]],
    /// Ground truth per patch, BGR order.
    pub colors: &'static [[u8; 3]],
    pub patch_names: &'static [&'static str],
    /// Sampling box, kept well inside the printed patch to avoid bleed.
    pub sample_size: [f64; 2],
    /// Full printed patch size.
    pub patch_size: [f64; 2],
}

impl ChartDefinition {
    pub fn patch_count(&self) -> usize {
        self.centroids.len()
    }

    pub fn anchor_points(&self) -> [Point2<f64>; 4] {
        self.anchor_corners.map(|[x, y]| Point2::new(x, y))
    }

    pub fn chart_points(&self) -> [Point2<f64>; 4] {
        self.chart_corners.map(|[x, y]| Point2::new(x, y))
    }

    /// Sampling quad of patch `index` in reference space: TL, TR, BR, BL.
    pub fn sample_quad(&self, index: usize) -> [Point2<f64>; 4] {
        let [cx, cy] = self.centroids[index];
        let [w, h] = self.sample_size;
        rect_quad(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    /// Right half of the full printed patch, used to paint the ground truth.
    pub fn ground_truth_quad(&self, index: usize) -> [Point2<f64>; 4] {
        let [cx, cy] = self.centroids[index];
        let [w, h] = self.patch_size;
        rect_quad(cx, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }
}

fn rect_quad(x0: f64, y0: f64, x1: f64, y1: f64) -> [Point2<f64>; 4] {
    [
        Point2::new(x0, y0),
        Point2::new(x1, y0),
        Point2::new(x1, y1),
        Point2::new(x0, y1),
    ]
}

pub static COLOR_CHECKER_CLASSIC: ChartDefinition = ChartDefinition {
    name: "ColorChecker Classic",
    anchor_corners: [[0.0, 0.0], [607.0, 0.0], [607.0, 511.0], [0.0, 511.0]],
    chart_corners: [[0.0, 57.0], [607.0, 57.0], [607.0, 455.0], [0.0, 455.0]],
    centroids: &[
        [46.0, 103.0], [150.0, 103.0], [252.0, 103.0],
        [355.0, 103.0], [458.0, 103.0], [561.0, 103.0],
        [46.0, 205.0], [150.0, 205.0], [252.0, 205.0],
        [355.0, 205.0], [458.0, 205.0], [561.0, 205.0],
        [46.0, 307.0], [150.0, 307.0], [252.0, 307.0],
        [355.0, 307.0], [458.0, 307.0], [561.0, 307.0],
        [46.0, 409.0], [150.0, 409.0], [252.0, 409.0],
        [355.0, 409.0], [458.0, 409.0], [561.0, 409.0],
    ],
    colors: &[
        [68, 82, 115], [130, 150, 192], [157, 122, 98],
        [67, 108, 87], [177, 128, 133], [170, 189, 103],
        [44, 126, 214], [166, 91, 80], [99, 90, 193],
        [108, 60, 94], [64, 188, 157], [46, 163, 224],
        [150, 61, 56], [73, 148, 70], [60, 54, 175],
        [31, 199, 231], [149, 86, 187], [161, 133, 8],
        [242, 243, 243], [200, 200, 200], [160, 160, 160],
        [121, 122, 122], [85, 85, 85], [52, 52, 52],
    ],
    patch_names: &[
        "dark skin", "light skin", "blue sky", "foliage", "blue flower", "bluish green",
        "orange", "purplish blue", "moderate red", "purple", "yellow green", "orange yellow",
        "blue", "green", "red", "yellow", "magenta", "cyan",
        "white", "neutral 8", "neutral 6.5", "neutral 5", "neutral 3.5", "black",
    ],
    sample_size: [50.0, 50.0],
    patch_size: [88.0, 88.0],
};

/// Chart definition for modes that sample individual patches.
pub fn definition(mode: ChartMode) -> Option<&'static ChartDefinition> {
    match mode {
        ChartMode::ColorChecker => Some(&COLOR_CHECKER_CLASSIC),
        _ => None,
    }
}

// Green -> yellow -> red, BGR, index = error magnitude
pub static COLORMAP_GRYLRD: [[u8; 3]; 60] = [
    [58, 111, 4], [62, 119, 8], [66, 126, 12], [71, 136, 17], [75, 143, 21],
    [79, 151, 25], [82, 157, 36], [86, 164, 51], [89, 170, 63], [92, 175, 75],
    [95, 181, 87], [99, 189, 102], [100, 193, 112], [101, 197, 122], [102, 202, 132],
    [103, 207, 144], [104, 212, 154], [105, 216, 164], [111, 220, 175], [117, 224, 183],
    [122, 227, 191], [127, 231, 199], [133, 235, 209], [139, 239, 217], [147, 241, 222],
    [155, 244, 228], [165, 247, 236], [173, 249, 242], [181, 252, 248], [189, 254, 254],
    [181, 249, 254], [173, 244, 254], [165, 239, 254], [155, 233, 254], [147, 228, 254],
    [139, 224, 254], [132, 216, 253], [124, 206, 253], [117, 198, 253], [110, 190, 253],
    [104, 182, 253], [96, 172, 252], [91, 162, 251], [86, 152, 250], [82, 142, 248],
    [76, 129, 246], [71, 119, 245], [67, 109, 244], [61, 97, 238], [57, 87, 233],
    [52, 77, 229], [48, 68, 224], [42, 56, 218], [38, 47, 214], [38, 39, 206],
    [38, 32, 198], [38, 22, 188], [38, 15, 180], [38, 7, 172], [38, 0, 165],
];

/// Colormap index for an error value: truncated, saturating at both ends.
pub fn colormap_index(error: f64) -> usize {
    // `as` saturates negatives and NaN to 0
    (error as usize).min(COLORMAP_GRYLRD.len() - 1)
}

pub fn colormap_color(error: f64) -> [u8; 3] {
    COLORMAP_GRYLRD[colormap_index(error)]
}
