//! Chart report example
//!
//! Renders a synthetic frame showing one of the supported charts framed by
//! its four anchor markers, runs the markerdetect analysis on it for a
//! number of frames and writes the annotated last frame as a PNG.
//!
//! Usage:
//!   cargo run --example chart_report -- --mode color-checker --cast 12,0,-12
//!   cargo run --example chart_report -- --mode white-reference --frames 60 \
//!     --wb-script ./set-wb.sh --output wb.png
//!
//! Scripts are never executed here; the invocations the analysis would make
//! are printed instead.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use gstreamer as gst;
use nalgebra::Point2;

use gstmarkerdetect::analysis::{analyze_frame, AnalyzerSettings, Profile, ScriptSettings};
use gstmarkerdetect::anchors::MarkerDetection;
use gstmarkerdetect::chart::COLOR_CHECKER_CLASSIC;
use gstmarkerdetect::frame::{Frame, Mask};
use gstmarkerdetect::homography::Homography;
use gstmarkerdetect::overlay::text::{self, TextStyle};
use gstmarkerdetect::trigger::{FrameState, RecordingLauncher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Chart {
    ColorChecker,
    WhiteReference,
    Histogram,
}

impl Chart {
    /// Marker ids at the top-left, top-right, bottom-right and bottom-left.
    fn marker_ids(self) -> [i32; 4] {
        match self {
            Chart::ColorChecker => [923, 1001, 241, 1007],
            Chart::WhiteReference => [923, 1002, 241, 1007],
            Chart::Histogram => [923, 1003, 241, 1007],
        }
    }
}

/// Command line parameters for the chart report example
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct ChartReportParams {
    /// Chart shown in the synthetic frame
    #[arg(short, long, value_enum, default_value = "color-checker")]
    mode: Chart,

    /// Frame width
    #[arg(long, default_value = "800")]
    width: usize,

    /// Frame height
    #[arg(long, default_value = "600")]
    height: usize,

    /// Marker edge length in pixels
    #[arg(long, default_value = "60")]
    marker_size: usize,

    /// Per-channel offset added to the chart colors, as B,G,R
    #[arg(long, default_value = "0,0,0", allow_hyphen_values = true)]
    cast: String,

    /// Number of frames to analyze
    #[arg(short, long, default_value = "1")]
    frames: u64,

    /// Analysis profile (full or basic)
    #[arg(short, long, default_value = "full")]
    profile: String,

    /// Paint ground truth over half of every patch
    #[arg(long)]
    show_gt: bool,

    /// Fill patches with their error color
    #[arg(long)]
    show_ec: bool,

    /// ColorChecker script to report invocations for
    #[arg(long)]
    cc_script: Option<String>,

    /// White balance script to report invocations for
    #[arg(long)]
    wb_script: Option<String>,

    /// Frames between script invocations
    #[arg(long, default_value = "0")]
    skip_frames: u32,

    /// Output PNG (a temporary file is kept if omitted)
    #[arg(short, long)]
    output: Option<String>,
}

fn parse_cast(cast: &str) -> Result<[i16; 3]> {
    let parts: Vec<i16> = cast
        .split(',')
        .map(|p| p.trim().parse::<i16>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("invalid cast '{}'", cast))?;
    match parts.as_slice() {
        [b, g, r] => Ok([*b, *g, *r]),
        _ => bail!("cast needs three comma separated values, got '{}'", cast),
    }
}

fn shift(color: [u8; 3], cast: [i16; 3]) -> [u8; 3] {
    let mut out = [0u8; 3];
    for c in 0..3 {
        out[c] = (i16::from(color[c]) + cast[c]).clamp(0, 255) as u8;
    }
    out
}

fn fill(frame: &mut Frame<'_>, polygon: &[Point2<f64>], color: [u8; 3]) {
    if let Ok(mask) = Mask::from_polygon(frame.width(), frame.height(), polygon) {
        for (x, y) in mask.pixels() {
            frame.set_pixel(x, y, color);
        }
    }
}

fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> [Point2<f64>; 4] {
    [
        Point2::new(x0, y0),
        Point2::new(x1, y0),
        Point2::new(x1, y1),
        Point2::new(x0, y1),
    ]
}

/// Draw the four markers and the chart between them. Returns the markers as
/// a detector would report them.
fn render_scene(
    frame: &mut Frame<'_>,
    chart: Chart,
    marker_size: f64,
    cast: [i16; 3],
) -> Result<Vec<MarkerDetection>> {
    let (w, h) = (frame.width() as f64, frame.height() as f64);
    let m = 10.0;
    let s = marker_size;
    if w < 2.0 * (m + s) + 10.0 || h < 2.0 * (m + s) + 10.0 {
        bail!("frame too small for {} px markers", marker_size);
    }
    let [tl, tr, br, bl] = chart.marker_ids();
    let markers = vec![
        MarkerDetection::axis_aligned(tl, m, m, m + s, m + s),
        MarkerDetection::axis_aligned(tr, w - m - s, m, w - m, m + s),
        MarkerDetection::axis_aligned(br, w - m - s, h - m - s, w - m, h - m),
        MarkerDetection::axis_aligned(bl, m, h - m - s, m + s, h - m),
    ];
    for marker in &markers {
        fill(frame, &marker.corners, [0, 0, 0]);
        let [a, _, c, _] = marker.corners;
        let inset = s / 4.0;
        fill(
            frame,
            &square(a.x + inset, a.y + inset, c.x - inset, c.y - inset),
            [255, 255, 255],
        );
    }

    // Same inner corners the anchor classifier picks
    let quad = [
        Point2::new(m, m + s),
        Point2::new(w - m, m + s),
        Point2::new(w - m, h - m - s),
        Point2::new(m, h - m - s),
    ];
    match chart {
        Chart::ColorChecker => {
            let def = &COLOR_CHECKER_CLASSIC;
            let warp = Homography::from_correspondences(&def.anchor_points(), &quad)?;
            let [pw, ph] = def.patch_size;
            for (i, &[cx, cy]) in def.centroids.iter().enumerate() {
                let patch = square(cx - pw / 2.0, cy - ph / 2.0, cx + pw / 2.0, cy + ph / 2.0);
                fill(frame, &warp.map_quad(&patch), shift(def.colors[i], cast));
            }
        }
        Chart::WhiteReference => fill(frame, &quad, shift([235, 235, 235], cast)),
        Chart::Histogram => {
            let mask = Mask::from_polygon(frame.width(), frame.height(), &quad)?;
            let width = frame.width().max(1) as f64;
            for (x, y) in mask.pixels() {
                let v = (x as f64 / width * 255.0) as u8;
                frame.set_pixel(x, y, shift([v, v / 2, 255 - v], cast));
            }
        }
    }
    Ok(markers)
}

fn example_main() -> Result<()> {
    let args = ChartReportParams::parse();
    gst::init()?;

    let profile: Profile = args
        .profile
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let cast = parse_cast(&args.cast)?;
    let settings = AnalyzerSettings {
        profile,
        show_ground_truth: args.show_gt,
        show_error_color: args.show_ec,
        color_checker: ScriptSettings {
            program: args.cc_script.clone(),
            extra_args: None,
            skip_frames: args.skip_frames,
        },
        white_balance: ScriptSettings {
            program: args.wb_script.clone(),
            extra_args: None,
            skip_frames: args.skip_frames,
        },
        ..Default::default()
    };

    let (width, height) = (args.width, args.height);
    let launcher = RecordingLauncher::default();
    let mut state = FrameState::default();
    let mut data = Vec::new();
    let mut last = None;

    for _ in 0..args.frames.max(1) {
        data = [90u8, 90, 90].repeat(width * height);
        let mut frame = Frame::new(&mut data, width, height, width * 3)?;
        let markers = render_scene(&mut frame, args.mode, args.marker_size as f64, cast)?;
        let report = analyze_frame(&mut state, &mut frame, &markers, &settings, &launcher);
        text::paint(&mut frame, &report.texts, &TextStyle::default())?;
        for invocation in &report.invocations {
            println!(
                "frame {}: {} {}",
                report.frame,
                invocation.program,
                invocation.args.join(" ")
            );
        }
        last = Some(report);
    }

    if let Some(report) = &last {
        println!("mode: {}", report.mode.as_str());
        match report.stats() {
            Some(stats) => println!("{}", serde_json::to_string_pretty(stats)?),
            None => println!("no statistics: {:?}", report.outcome),
        }
    }
    println!("{} script invocations recorded", launcher.take().len());

    // BGR -> RGB for the encoder
    let rgb: Vec<u8> = data
        .chunks_exact(3)
        .flat_map(|px| [px[2], px[1], px[0]])
        .collect();
    let image = image::RgbImage::from_raw(width as u32, height as u32, rgb)
        .context("frame buffer does not match its dimensions")?;

    let path = match &args.output {
        Some(path) => std::path::PathBuf::from(path),
        None => {
            let file = tempfile::Builder::new()
                .prefix("chart-report-")
                .suffix(".png")
                .tempfile()?;
            let (_, path) = file.keep()?;
            path
        }
    };
    image.save(&path)?;
    println!("annotated frame written to {}", path.display());
    Ok(())
}

fn main() {
    if let Err(e) = example_main() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
