//! Per-frame chart analysis: classify, map, sample, evaluate, render and
//! maybe trigger.
//!
//! Nothing here knows about GStreamer buffers. The element hands in a
//! [`Frame`] view, the decoded markers and a settings snapshot, then paints
//! the returned text items and posts the statistics.

use std::fmt;
use std::str::FromStr;

use gstreamer as gst;
use nalgebra::Point2;
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::anchors::{classify, AnchorConflictPolicy, MarkerDetection};
use crate::chart::{self, ChartDefinition, ChartMode};
use crate::colorspace::{Bgr, ColorSpace};
use crate::error::{AnalysisError, Result};
use crate::frame::Frame;
use crate::homography::Homography;
use crate::metrics::{ChartErrorTotals, PatchEvaluation};
use crate::overlay::plots::{self, Plot};
use crate::overlay::text::TextItem;
use crate::overlay::{self, PatchOverlay, GREEN, OUTLINE_THICKNESS};
use crate::sampler::{self, ChannelHistograms};
use crate::trigger::{self, FrameState, Invocation, ProcessLauncher};

pub static CAT: Lazy<gst::DebugCategory> = Lazy::new(|| {
    gst::DebugCategory::new(
        "markerdetect-analysis",
        gst::DebugColorFlags::empty(),
        Some("Marker-anchored chart analysis"),
    )
});

/// How much of the analysis is shown on the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    /// Every representation, optional patch overlays honoured.
    #[default]
    Full,
    /// BGR and UV summaries only, plain patch outlines.
    Basic,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Full => "full",
            Profile::Basic => "basic",
        }
    }

    pub fn displayed_spaces(&self) -> &'static [ColorSpace] {
        match self {
            Profile::Full => &ColorSpace::ALL,
            Profile::Basic => &[ColorSpace::Bgr, ColorSpace::Yuv],
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Profile::Full),
            "basic" => Ok(Profile::Basic),
            other => Err(format!("unknown profile '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptSettings {
    pub program: Option<String>,
    pub extra_args: Option<String>,
    pub skip_frames: u32,
}

impl ScriptSettings {
    /// Program to run, if one is configured.
    pub fn program(&self) -> Option<&str> {
        self.program
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// Plain snapshot of the element configuration for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzerSettings {
    pub profile: Profile,
    pub anchor_conflict: AnchorConflictPolicy,
    pub show_ground_truth: bool,
    pub show_error_color: bool,
    pub color_checker: ScriptSettings,
    pub white_balance: ScriptSettings,
}

impl AnalyzerSettings {
    fn patch_overlay(&self) -> PatchOverlay {
        match self.profile {
            Profile::Full => PatchOverlay {
                show_ground_truth: self.show_ground_truth,
                show_error_color: self.show_error_color,
            },
            Profile::Basic => PatchOverlay::default(),
        }
    }
}

/// Statistics of the chart found in a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartStats {
    ColorChecker {
        patches: Vec<PatchEvaluation>,
        totals: ChartErrorTotals,
    },
    WhiteReference {
        mean: Bgr,
    },
    Histogram {
        histograms: ChannelHistograms,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// No complete anchor signature in view.
    NoChart,
    Analyzed(ChartStats),
    /// A chart was announced but its geometry could not be used.
    Skipped(AnalysisError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// 1-based frame number within the stream.
    pub frame: u64,
    pub mode: ChartMode,
    /// Anchor quad (TL, TR, BR, BL) when every role was bound.
    pub anchors: Option<[Point2<f64>; 4]>,
    pub outcome: FrameOutcome,
    /// Labels still to be painted onto the frame.
    pub texts: Vec<TextItem>,
    /// Programs started for this frame.
    pub invocations: Vec<Invocation>,
}

impl FrameReport {
    pub fn stats(&self) -> Option<&ChartStats> {
        match &self.outcome {
            FrameOutcome::Analyzed(stats) => Some(stats),
            _ => None,
        }
    }
}

// Chart geometry resolved for the current frame.
enum Measured {
    ColorChecker {
        patches: Vec<PatchEvaluation>,
        sample_quads: Vec<[Point2<f64>; 4]>,
        truth_quads: Vec<[Point2<f64>; 4]>,
        border: [Point2<f64>; 4],
    },
    WhiteReference(Bgr),
    Histogram(ChannelHistograms),
}

/// Analyze one frame in place.
///
/// The frame is sampled before anything is drawn on it. Geometry errors
/// never escape: they become [`FrameOutcome::Skipped`] and only the marker
/// outlines are drawn.
pub fn analyze_frame(
    state: &mut FrameState,
    frame: &mut Frame<'_>,
    detections: &[MarkerDetection],
    settings: &AnalyzerSettings,
    launcher: &dyn ProcessLauncher,
) -> FrameReport {
    let frame_number = state.begin_frame();
    let classification = classify(detections, settings.anchor_conflict);
    let mode = classification.mode;
    let anchors = classification.anchors.quad();

    if classification.conflicts > 0 {
        gst::debug!(
            CAT,
            "frame {}: {} conflicting anchor detections ({})",
            frame_number,
            classification.conflicts,
            settings.anchor_conflict
        );
    }

    let measured = anchors.and_then(|quad| measure(frame, mode, &quad));

    let mut texts = overlay::draw_markers(frame, detections);

    let outcome = match (measured, anchors) {
        (Some(Ok(measured)), Some(quad)) => {
            match render(frame, measured, &quad, settings, &mut texts) {
                Ok(stats) => FrameOutcome::Analyzed(stats),
                Err(err) => FrameOutcome::Skipped(err),
            }
        }
        (Some(Err(err)), _) => FrameOutcome::Skipped(err),
        _ => FrameOutcome::NoChart,
    };

    match &outcome {
        FrameOutcome::Skipped(err) => {
            gst::warning!(CAT, "frame {}: skipping {} chart: {}", frame_number, mode.as_str(), err);
        }
        FrameOutcome::Analyzed(_) => {
            gst::debug!(CAT, "frame {}: analyzed {} chart", frame_number, mode.as_str());
        }
        FrameOutcome::NoChart => {
            gst::trace!(CAT, "frame {}: no chart ({} markers)", frame_number, detections.len());
        }
    }

    let invocations = run_triggers(state, frame_number, &outcome, settings, launcher);

    FrameReport {
        frame: frame_number,
        mode,
        anchors,
        outcome,
        texts,
        invocations,
    }
}

fn measure(
    frame: &Frame<'_>,
    mode: ChartMode,
    quad: &[Point2<f64>; 4],
) -> Option<Result<Measured>> {
    let region = |source| AnalysisError::Sample { region: 0, source };
    match mode {
        ChartMode::None => None,
        ChartMode::ColorChecker => {
            chart::definition(mode).map(|def| measure_patches(frame, def, quad))
        }
        ChartMode::WhiteReference => Some(
            sampler::mean_color(frame, quad)
                .map(Measured::WhiteReference)
                .map_err(region),
        ),
        ChartMode::Histogram => Some(
            sampler::histogram(frame, quad)
                .map(Measured::Histogram)
                .map_err(region),
        ),
    }
}

fn measure_patches(
    frame: &Frame<'_>,
    def: &'static ChartDefinition,
    quad: &[Point2<f64>; 4],
) -> Result<Measured> {
    let warp = Homography::from_correspondences(&def.anchor_points(), quad)?;

    let mut patches = Vec::with_capacity(def.patch_count());
    let mut sample_quads = Vec::with_capacity(def.patch_count());
    let mut truth_quads = Vec::with_capacity(def.patch_count());
    for index in 0..def.patch_count() {
        let sample = warp.map_quad(&def.sample_quad(index));
        let measured = sampler::mean_color(frame, &sample)
            .map_err(|source| AnalysisError::Sample { region: index, source })?;
        patches.push(PatchEvaluation::evaluate(
            index,
            def.patch_names[index],
            def.colors[index].into(),
            measured,
        ));
        sample_quads.push(sample);
        truth_quads.push(warp.map_quad(&def.ground_truth_quad(index)));
    }

    Ok(Measured::ColorChecker {
        patches,
        sample_quads,
        truth_quads,
        border: warp.map_quad(&def.chart_points()),
    })
}

fn render(
    frame: &mut Frame<'_>,
    measured: Measured,
    quad: &[Point2<f64>; 4],
    settings: &AnalyzerSettings,
    texts: &mut Vec<TextItem>,
) -> Result<ChartStats> {
    match measured {
        Measured::ColorChecker {
            patches,
            sample_quads,
            truth_quads,
            border,
        } => {
            let patch_overlay = settings.patch_overlay();
            for ((patch, sample), truth) in patches.iter().zip(&sample_quads).zip(&truth_quads) {
                texts.extend(overlay::draw_patch(frame, sample, truth, patch, patch_overlay));
            }
            let totals: ChartErrorTotals = patches.iter().collect();
            texts.extend(overlay::summary_block(&totals, settings.profile.displayed_spaces()));
            overlay::draw_polyline(frame, &border, true, GREEN, OUTLINE_THICKNESS);
            Ok(ChartStats::ColorChecker { patches, totals })
        }
        Measured::WhiteReference(mean) => {
            composite(frame, &plots::bar_chart(mean), quad, texts)?;
            Ok(ChartStats::WhiteReference { mean })
        }
        Measured::Histogram(histograms) => {
            composite(frame, &plots::histogram_plot(&histograms), quad, texts)?;
            Ok(ChartStats::Histogram { histograms })
        }
    }
}

fn composite(
    frame: &mut Frame<'_>,
    plot: &Plot,
    quad: &[Point2<f64>; 4],
    texts: &mut Vec<TextItem>,
) -> Result<()> {
    texts.extend(plots::warp_into(frame, plot, quad)?);
    overlay::draw_polyline(frame, quad, true, GREEN, OUTLINE_THICKNESS);
    Ok(())
}

fn run_triggers(
    state: &mut FrameState,
    frame_number: u64,
    outcome: &FrameOutcome,
    settings: &AnalyzerSettings,
    launcher: &dyn ProcessLauncher,
) -> Vec<Invocation> {
    let stats = match outcome {
        FrameOutcome::Analyzed(stats) => Some(stats),
        _ => None,
    };

    let mut invocations = Vec::new();

    let cc = &settings.color_checker;
    let cc_ready = match (cc.program(), stats) {
        (Some(program), Some(ChartStats::ColorChecker { patches, .. })) => Some((program, patches)),
        _ => None,
    };
    if state
        .color_checker
        .tick(frame_number, cc_ready.is_some(), cc.skip_frames)
    {
        if let Some((program, patches)) = cc_ready {
            let means: Vec<Bgr> = patches.iter().map(|p| p.measured).collect();
            invocations.push(Invocation {
                program: program.to_string(),
                args: trigger::color_checker_args(&means, cc.extra_args.as_deref()),
            });
        }
    }

    let wb = &settings.white_balance;
    let wb_ready = match (wb.program(), stats) {
        (Some(program), Some(ChartStats::WhiteReference { mean })) => Some((program, *mean)),
        _ => None,
    };
    if state
        .white_balance
        .tick(frame_number, wb_ready.is_some(), wb.skip_frames)
    {
        if let Some((program, mean)) = wb_ready {
            invocations.push(Invocation {
                program: program.to_string(),
                args: trigger::white_balance_args(mean, wb.extra_args.as_deref()),
            });
        }
    }

    for invocation in &invocations {
        gst::info!(
            CAT,
            "frame {}: running {} with {} arguments",
            frame_number,
            invocation.program,
            invocation.args.len()
        );
        launcher.invoke(invocation);
    }
    invocations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::COLOR_CHECKER_CLASSIC;
    use crate::error::HomographyError;
    use crate::frame::Mask;
    use crate::trigger::RecordingLauncher;

    const W: usize = 700;
    const H: usize = 700;

    fn init() {
        gst::init().unwrap();
    }

    fn markers(top_right: i32) -> Vec<MarkerDetection> {
        vec![
            MarkerDetection::axis_aligned(923, 0.0, 0.0, 100.0, 100.0),
            MarkerDetection::axis_aligned(top_right, 600.0, 0.0, 700.0, 100.0),
            MarkerDetection::axis_aligned(1007, 0.0, 500.0, 100.0, 600.0),
            MarkerDetection::axis_aligned(241, 600.0, 500.0, 700.0, 600.0),
        ]
    }

    /// Gray frame with every color-checker patch painted in its reference
    /// color, as seen through the anchor quad of `markers`.
    fn chart_frame() -> Vec<u8> {
        let mut data = [90u8, 90, 90].repeat(W * H);
        let mut frame = Frame::new(&mut data, W, H, W * 3).unwrap();
        let quad = classify(&markers(1001), AnchorConflictPolicy::FirstWins)
            .anchors
            .quad()
            .unwrap();
        let def = &COLOR_CHECKER_CLASSIC;
        let warp = Homography::from_correspondences(&def.anchor_points(), &quad).unwrap();
        for i in 0..def.patch_count() {
            let [cx, cy] = def.centroids[i];
            let patch = [
                Point2::new(cx - 44.0, cy - 44.0),
                Point2::new(cx + 44.0, cy - 44.0),
                Point2::new(cx + 44.0, cy + 44.0),
                Point2::new(cx - 44.0, cy + 44.0),
            ];
            let mapped = warp.map_quad(&patch);
            let mask = Mask::from_polygon(W, H, &mapped).unwrap();
            for (x, y) in mask.pixels() {
                frame.set_pixel(x, y, def.colors[i]);
            }
        }
        data
    }

    #[test]
    fn color_checker_at_ground_truth_has_zero_error() {
        init();
        let mut data = chart_frame();
        let mut frame = Frame::new(&mut data, W, H, W * 3).unwrap();
        let mut state = FrameState::default();
        let launcher = RecordingLauncher::default();
        let report = analyze_frame(
            &mut state,
            &mut frame,
            &markers(1001),
            &AnalyzerSettings::default(),
            &launcher,
        );

        assert_eq!(report.mode, ChartMode::ColorChecker);
        let Some(ChartStats::ColorChecker { patches, totals }) = report.stats() else {
            panic!("expected color checker stats, got {:?}", report.outcome);
        };
        assert_eq!(patches.len(), 24);
        for patch in patches {
            assert_eq!(patch.measured, patch.reference, "patch {}", patch.name);
        }
        for total in &totals.spaces {
            assert!(total.aggregate.abs() < 1e-9, "{:?}", total.space);
        }
        // 4 marker ids, 2 labels per patch, 5 bands of 4 lines
        assert_eq!(report.texts.len(), 4 + 48 + 20);
        assert!(report.invocations.is_empty());
    }

    #[test]
    fn basic_profile_shows_two_bands() {
        init();
        let mut data = chart_frame();
        let mut frame = Frame::new(&mut data, W, H, W * 3).unwrap();
        let settings = AnalyzerSettings {
            profile: Profile::Basic,
            show_error_color: true,
            ..Default::default()
        };
        let report = analyze_frame(
            &mut FrameState::default(),
            &mut frame,
            &markers(1001),
            &settings,
            &RecordingLauncher::default(),
        );
        assert_eq!(report.texts.len(), 4 + 48 + 8);
        assert!(report.texts.iter().any(|t| t.text == "E[UV]=0"));
        assert!(!report.texts.iter().any(|t| t.text.starts_with("E[LAB]")));
    }

    #[test]
    fn unknown_signature_only_outlines_markers() {
        init();
        let mut data = vec![0u8; W * H * 3];
        let mut frame = Frame::new(&mut data, W, H, W * 3).unwrap();
        let report = analyze_frame(
            &mut FrameState::default(),
            &mut frame,
            &markers(1005),
            &AnalyzerSettings::default(),
            &RecordingLauncher::default(),
        );
        assert_eq!(report.mode, ChartMode::None);
        assert_eq!(report.outcome, FrameOutcome::NoChart);
        assert!(report.anchors.is_some());
        assert_eq!(report.texts.len(), 4);
        assert_eq!(frame.pixel(350, 350), [0, 0, 0]);
        assert_eq!(frame.pixel(650, 100), GREEN);
    }

    #[test]
    fn collapsed_anchors_skip_the_frame() {
        init();
        let mut data = vec![0u8; W * H * 3];
        let mut frame = Frame::new(&mut data, W, H, W * 3).unwrap();
        // Every contributing corner lies on y = 100
        let collapsed = vec![
            MarkerDetection::axis_aligned(923, 0.0, 0.0, 100.0, 100.0),
            MarkerDetection::axis_aligned(1001, 600.0, 0.0, 700.0, 100.0),
            MarkerDetection::axis_aligned(1007, 200.0, 100.0, 300.0, 200.0),
            MarkerDetection::axis_aligned(241, 400.0, 100.0, 500.0, 200.0),
        ];
        let report = analyze_frame(
            &mut FrameState::default(),
            &mut frame,
            &collapsed,
            &AnalyzerSettings::default(),
            &RecordingLauncher::default(),
        );
        assert_eq!(report.mode, ChartMode::ColorChecker);
        assert!(matches!(
            report.outcome,
            FrameOutcome::Skipped(AnalysisError::Geometry(HomographyError::Collinear { .. }))
        ));
    }

    #[test]
    fn self_crossing_anchors_skip_the_frame() {
        init();
        let mut data = vec![0u8; W * H * 3];
        let mut frame = Frame::new(&mut data, W, H, W * 3).unwrap();
        // Bottom markers swap sides, so the anchor quad crosses itself
        let crossed = vec![
            MarkerDetection::axis_aligned(923, 0.0, 0.0, 100.0, 100.0),
            MarkerDetection::axis_aligned(1001, 600.0, 0.0, 700.0, 100.0),
            MarkerDetection::axis_aligned(1007, 600.0, 500.0, 700.0, 600.0),
            MarkerDetection::axis_aligned(241, 0.0, 500.0, 100.0, 600.0),
        ];
        let report = analyze_frame(
            &mut FrameState::default(),
            &mut frame,
            &crossed,
            &AnalyzerSettings::default(),
            &RecordingLauncher::default(),
        );
        assert_eq!(report.mode, ChartMode::ColorChecker);
        assert!(matches!(
            report.outcome,
            FrameOutcome::Skipped(AnalysisError::Geometry(HomographyError::NotConvex { .. }))
        ));
        // Only the marker labels are left to paint
        assert_eq!(report.texts.len(), 4);
    }

    #[test]
    fn white_reference_feeds_white_balance_script() {
        init();
        let mut data = [40u8, 80, 120].repeat(W * H);
        let settings = AnalyzerSettings {
            white_balance: ScriptSettings {
                program: Some("wb.sh".into()),
                extra_args: Some("--dev 0".into()),
                skip_frames: 2,
            },
            color_checker: ScriptSettings {
                program: Some("cc.sh".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let launcher = RecordingLauncher::default();
        let mut state = FrameState::default();
        let mut fired_on = Vec::new();
        for _ in 0..60 {
            let mut frame = Frame::new(&mut data, W, H, W * 3).unwrap();
            let report =
                analyze_frame(&mut state, &mut frame, &markers(1002), &settings, &launcher);
            assert_eq!(report.mode, ChartMode::WhiteReference);
            if !report.invocations.is_empty() {
                fired_on.push(report.frame);
            }
            // Overlays are drawn over the sampled region; restore it
            data = [40u8, 80, 120].repeat(W * H);
        }
        assert_eq!(fired_on, vec![54, 57, 60]);
        let calls = launcher.take();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|c| c.program == "wb.sh"));
        assert_eq!(calls[0].args, ["40", "80", "120", "--dev", "0"]);
    }

    #[test]
    fn histogram_mode_reports_region_histograms() {
        init();
        let mut data = [7u8, 8, 9].repeat(W * H);
        let mut frame = Frame::new(&mut data, W, H, W * 3).unwrap();
        let report = analyze_frame(
            &mut FrameState::default(),
            &mut frame,
            &markers(1003),
            &AnalyzerSettings::default(),
            &RecordingLauncher::default(),
        );
        let Some(ChartStats::Histogram { histograms }) = report.stats() else {
            panic!("expected histogram stats, got {:?}", report.outcome);
        };
        let total = histograms.total(0);
        assert!(total > 0);
        assert_eq!(u64::from(histograms.channels[0][7]), total);
        assert_eq!(u64::from(histograms.channels[2][9]), total);
        // Inside the quad the warped (black) canvas replaced the frame
        assert_eq!(frame.pixel(350, 200), [0, 0, 0]);
        assert_eq!(frame.pixel(350, 650), [7, 8, 9]);
    }

    #[test]
    fn stats_serialize_to_json() {
        let stats = ChartStats::WhiteReference {
            mean: Bgr::new(1.0, 2.0, 3.0),
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["white-reference"]["mean"]["g"], 2.0);
    }

    #[test]
    fn profile_strings() {
        assert_eq!("BASIC".parse(), Ok(Profile::Basic));
        assert!("verbose".parse::<Profile>().is_err());
        assert_eq!(Profile::default().to_string(), "full");
    }
}
