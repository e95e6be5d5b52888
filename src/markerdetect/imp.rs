use glib::ParamSpecBuilderExt;
use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use gstreamer::subclass::prelude::*;
use gstreamer_base as gst_base;
use gstreamer_base::subclass::prelude::*;
use gstreamer_video as gst_video;
use gstreamer_video::prelude::*;
use gstreamer_video::subclass::prelude::*;
use gstreamer_video::{VideoFormat, VideoInfo};
use once_cell::sync::Lazy;
use std::sync::Mutex;

use super::meta::MarkerDetectionMeta;
use crate::analysis::{self, AnalyzerSettings, Profile, ScriptSettings};
use crate::anchors::AnchorConflictPolicy;
use crate::frame::Frame;
use crate::overlay::text::{self, TextStyle};
use crate::trigger::{FrameState, TokioLauncher};

static CAT: Lazy<gst::DebugCategory> = Lazy::new(|| {
    gst::DebugCategory::new(
        "markerdetect",
        gst::DebugColorFlags::empty(),
        Some("Marker Detect Element"),
    )
});

#[derive(Debug, Clone)]
struct Settings {
    cc_script: Option<String>,
    cc_extra_args: Option<String>,
    cc_skip_frames: u32,
    cc_show_gt: bool,
    cc_show_ec: bool,
    wb_script: Option<String>,
    wb_extra_args: Option<String>,
    wb_skip_frames: u32,
    anchor_conflict: AnchorConflictPolicy,
    profile: Profile,
    post_messages: bool,
    text_font: String,
    text_font_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        let style = TextStyle::default();
        Self {
            cc_script: None,
            cc_extra_args: None,
            cc_skip_frames: 0,
            cc_show_gt: false,
            cc_show_ec: false,
            wb_script: None,
            wb_extra_args: None,
            wb_skip_frames: 0,
            anchor_conflict: AnchorConflictPolicy::default(),
            profile: Profile::default(),
            post_messages: true,
            text_font: style.font,
            text_font_size: style.size,
        }
    }
}

impl Settings {
    fn analyzer(&self) -> AnalyzerSettings {
        AnalyzerSettings {
            profile: self.profile,
            anchor_conflict: self.anchor_conflict,
            show_ground_truth: self.cc_show_gt,
            show_error_color: self.cc_show_ec,
            color_checker: ScriptSettings {
                program: self.cc_script.clone(),
                extra_args: self.cc_extra_args.clone(),
                skip_frames: self.cc_skip_frames,
            },
            white_balance: ScriptSettings {
                program: self.wb_script.clone(),
                extra_args: self.wb_extra_args.clone(),
                skip_frames: self.wb_skip_frames,
            },
        }
    }

    fn text_style(&self) -> TextStyle {
        TextStyle {
            font: self.text_font.clone(),
            size: self.text_font_size,
        }
    }
}

/// Analyzes calibration charts framed by fiducial markers and draws the
/// results onto the video.
///
/// Markers are read from the `MarkerDetectionMeta` an upstream detector
/// attaches to each buffer. Depending on which marker ids sit in the four
/// corners the element treats the enclosed area as a ColorChecker Classic,
/// a white reference card or a free region to histogram.
///
/// # Properties
/// - `cc-script`, `cc-extra-args`, `cc-skip-frames`: program fed the 24
///   measured patch colors, extra arguments, frames between runs
/// - `cc-show-gt`: paint the reference color over half of every patch
/// - `cc-show-ec`: fill patches with their error color
/// - `wb-script`, `wb-extra-args`, `wb-skip-frames`: same for the white
///   reference mean
/// - `anchor-conflict`: `first-wins`, `last-wins` or `reject`
/// - `profile`: `full` or `basic`
/// - `post-messages`: post `markerdetect-chart-stats` on the bus
/// - `text-font`, `text-font-size`: label font
///
/// # Example Pipeline
/// ```text
/// gst-launch-1.0 \
///   v4l2src ! videoconvert ! video/x-raw,format=BGR ! \
///   arucodetect ! \
///   markerdetect wb-script=/usr/local/bin/set-wb wb-skip-frames=30 ! \
///   videoconvert ! autovideosink
/// ```
#[derive(Default)]
pub struct MarkerDetect {
    settings: Mutex<Settings>,
    video_info: Mutex<Option<VideoInfo>>,
    state: Mutex<FrameState>,
}

// Include generated type names for variant-specific builds
include!(concat!(env!("OUT_DIR"), "/type_names.rs"));

#[glib::object_subclass]
impl ObjectSubclass for MarkerDetect {
    const NAME: &'static str = MARKER_DETECT_TYPE_NAME;
    type Type = super::MarkerDetect;
    type ParentType = gst_video::VideoFilter;
}

impl ObjectImpl for MarkerDetect {
    fn properties() -> &'static [glib::ParamSpec] {
        static PROPERTIES: Lazy<Vec<glib::ParamSpec>> = Lazy::new(|| {
            vec![
                glib::ParamSpecString::builder("cc-script")
                    .nick("ColorChecker Script")
                    .blurb("Program run with the 24 measured patch colors")
                    .build(),
                glib::ParamSpecString::builder("cc-extra-args")
                    .nick("ColorChecker Extra Arguments")
                    .blurb("Extra whitespace separated arguments for the ColorChecker script")
                    .build(),
                glib::ParamSpecUInt::builder("cc-skip-frames")
                    .nick("ColorChecker Skip Frames")
                    .blurb("Frames to skip between ColorChecker script runs")
                    .default_value(0)
                    .build(),
                glib::ParamSpecBoolean::builder("cc-show-gt")
                    .nick("Show Ground Truth")
                    .blurb("Paint the reference color over half of every patch")
                    .default_value(false)
                    .build(),
                glib::ParamSpecBoolean::builder("cc-show-ec")
                    .nick("Show Error Color")
                    .blurb("Fill every patch with a color encoding its UV error")
                    .default_value(false)
                    .build(),
                glib::ParamSpecString::builder("wb-script")
                    .nick("White Balance Script")
                    .blurb("Program run with the mean color of the white reference")
                    .build(),
                glib::ParamSpecString::builder("wb-extra-args")
                    .nick("White Balance Extra Arguments")
                    .blurb("Extra whitespace separated arguments for the white balance script")
                    .build(),
                glib::ParamSpecUInt::builder("wb-skip-frames")
                    .nick("White Balance Skip Frames")
                    .blurb("Frames to skip between white balance script runs")
                    .default_value(0)
                    .build(),
                glib::ParamSpecString::builder("anchor-conflict")
                    .nick("Anchor Conflict Policy")
                    .blurb("Two markers on one corner: first-wins, last-wins or reject")
                    .default_value(Some(AnchorConflictPolicy::default().as_str()))
                    .build(),
                glib::ParamSpecString::builder("profile")
                    .nick("Analysis Profile")
                    .blurb("full: all color spaces and patch overlays; basic: BGR and UV only")
                    .default_value(Some(Profile::default().as_str()))
                    .build(),
                glib::ParamSpecBoolean::builder("post-messages")
                    .nick("Post Messages")
                    .blurb("Post chart statistics as element messages on the bus")
                    .default_value(true)
                    .build(),
                glib::ParamSpecString::builder("text-font")
                    .nick("Text Font")
                    .blurb("Font family used for overlay labels")
                    .default_value(Some("Monospace"))
                    .build(),
                glib::ParamSpecUInt::builder("text-font-size")
                    .nick("Text Font Size")
                    .blurb("Size of the overlay label font in pixels")
                    .minimum(1)
                    .maximum(200)
                    .default_value(11)
                    .build(),
            ]
        });
        PROPERTIES.as_ref()
    }

    fn set_property(&self, _id: usize, value: &glib::Value, pspec: &glib::ParamSpec) {
        let mut settings = self.settings.lock().unwrap();
        match pspec.name() {
            "cc-script" => {
                settings.cc_script = value.get().expect("type checked upstream");
            }
            "cc-extra-args" => {
                settings.cc_extra_args = value.get().expect("type checked upstream");
            }
            "cc-skip-frames" => {
                settings.cc_skip_frames = value.get().expect("type checked upstream");
            }
            "cc-show-gt" => {
                settings.cc_show_gt = value.get().expect("type checked upstream");
            }
            "cc-show-ec" => {
                settings.cc_show_ec = value.get().expect("type checked upstream");
            }
            "wb-script" => {
                settings.wb_script = value.get().expect("type checked upstream");
            }
            "wb-extra-args" => {
                settings.wb_extra_args = value.get().expect("type checked upstream");
            }
            "wb-skip-frames" => {
                settings.wb_skip_frames = value.get().expect("type checked upstream");
            }
            "anchor-conflict" => {
                let requested: Option<String> = value.get().expect("type checked upstream");
                match requested.as_deref().unwrap_or_default().parse() {
                    Ok(policy) => settings.anchor_conflict = policy,
                    Err(err) => gst::warning!(
                        CAT,
                        obj = self.obj(),
                        "Ignoring anchor-conflict: {}, keeping {}",
                        err,
                        settings.anchor_conflict
                    ),
                }
            }
            "profile" => {
                let requested: Option<String> = value.get().expect("type checked upstream");
                match requested.as_deref().unwrap_or_default().parse() {
                    Ok(profile) => settings.profile = profile,
                    Err(err) => gst::warning!(
                        CAT,
                        obj = self.obj(),
                        "Ignoring profile: {}, keeping {}",
                        err,
                        settings.profile
                    ),
                }
            }
            "post-messages" => {
                settings.post_messages = value.get().expect("type checked upstream");
            }
            "text-font" => {
                let font: Option<String> = value.get().expect("type checked upstream");
                settings.text_font = font.unwrap_or_else(|| TextStyle::default().font);
            }
            "text-font-size" => {
                settings.text_font_size = value.get().expect("type checked upstream");
            }
            _ => unimplemented!(),
        }
    }

    fn property(&self, _id: usize, pspec: &glib::ParamSpec) -> glib::Value {
        let settings = self.settings.lock().unwrap();
        match pspec.name() {
            "cc-script" => settings.cc_script.to_value(),
            "cc-extra-args" => settings.cc_extra_args.to_value(),
            "cc-skip-frames" => settings.cc_skip_frames.to_value(),
            "cc-show-gt" => settings.cc_show_gt.to_value(),
            "cc-show-ec" => settings.cc_show_ec.to_value(),
            "wb-script" => settings.wb_script.to_value(),
            "wb-extra-args" => settings.wb_extra_args.to_value(),
            "wb-skip-frames" => settings.wb_skip_frames.to_value(),
            "anchor-conflict" => settings.anchor_conflict.as_str().to_value(),
            "profile" => settings.profile.as_str().to_value(),
            "post-messages" => settings.post_messages.to_value(),
            "text-font" => settings.text_font.to_value(),
            "text-font-size" => settings.text_font_size.to_value(),
            _ => unimplemented!(),
        }
    }
}

impl GstObjectImpl for MarkerDetect {}

impl ElementImpl for MarkerDetect {
    fn metadata() -> Option<&'static gst::subclass::ElementMetadata> {
        static ELEMENT_METADATA: Lazy<gst::subclass::ElementMetadata> = Lazy::new(|| {
            gst::subclass::ElementMetadata::new(
                "Marker Detect",
                "Filter/Analyzer/Video",
                "Measures marker-anchored color charts and overlays the results",
                "AlbertaBeef <grouby177@gmail.com>",
            )
        });
        Some(&*ELEMENT_METADATA)
    }

    fn pad_templates() -> &'static [gst::PadTemplate] {
        static PAD_TEMPLATES: Lazy<Vec<gst::PadTemplate>> = Lazy::new(|| {
            let caps = gst_video::VideoCapsBuilder::new()
                .format(VideoFormat::Bgr)
                .width_range(1..=3840)
                .height_range(1..=2160)
                .build();

            vec![
                gst::PadTemplate::new(
                    "sink",
                    gst::PadDirection::Sink,
                    gst::PadPresence::Always,
                    &caps,
                )
                .unwrap(),
                gst::PadTemplate::new(
                    "src",
                    gst::PadDirection::Src,
                    gst::PadPresence::Always,
                    &caps,
                )
                .unwrap(),
            ]
        });
        PAD_TEMPLATES.as_slice()
    }
}

impl BaseTransformImpl for MarkerDetect {
    const MODE: gst_base::subclass::BaseTransformMode =
        gst_base::subclass::BaseTransformMode::AlwaysInPlace;
    const PASSTHROUGH_ON_SAME_CAPS: bool = false;
    const TRANSFORM_IP_ON_PASSTHROUGH: bool = false;

    fn start(&self) -> Result<(), gst::ErrorMessage> {
        gst::debug!(CAT, obj = self.obj(), "Starting, frame counter reset");
        *self.state.lock().unwrap() = FrameState::default();
        self.parent_start()
    }

    fn stop(&self) -> Result<(), gst::ErrorMessage> {
        let frames = self.state.lock().unwrap().frame();
        gst::debug!(CAT, obj = self.obj(), "Stopping after {} frames", frames);
        *self.video_info.lock().unwrap() = None;
        self.parent_stop()
    }
}

impl VideoFilterImpl for MarkerDetect {
    fn transform_frame_ip(
        &self,
        frame: &mut gst_video::VideoFrameRef<&mut gst::BufferRef>,
    ) -> Result<gst::FlowSuccess, gst::FlowError> {
        let (width, height) = {
            let video_info = self.video_info.lock().unwrap();
            let info = video_info.as_ref().ok_or_else(|| {
                gst::error!(CAT, obj = self.obj(), "Video info not available");
                gst::FlowError::NotNegotiated
            })?;
            (info.width() as usize, info.height() as usize)
        };

        let detections = frame
            .buffer()
            .meta::<MarkerDetectionMeta>()
            .map(|meta| meta.detections())
            .unwrap_or_default();
        let timestamp = frame.buffer().pts().unwrap_or(gst::ClockTime::ZERO);

        let (analyzer, style, post_messages) = {
            let settings = self.settings.lock().unwrap();
            (settings.analyzer(), settings.text_style(), settings.post_messages)
        };

        let stride = frame.plane_stride()[0] as usize;
        let data = frame.plane_data_mut(0).map_err(|err| {
            gst::error!(CAT, obj = self.obj(), "Failed to map frame plane: {}", err);
            gst::FlowError::Error
        })?;
        let mut view = Frame::new(data, width, height, stride).map_err(|err| {
            gst::error!(CAT, obj = self.obj(), "Unusable frame layout: {}", err);
            gst::FlowError::Error
        })?;

        let report = {
            let mut state = self.state.lock().unwrap();
            analysis::analyze_frame(&mut state, &mut view, &detections, &analyzer, &TokioLauncher)
        };

        if let Err(err) = text::paint(&mut view, &report.texts, &style) {
            gst::warning!(CAT, obj = self.obj(), "Failed to draw labels: {}", err);
        }

        gst::log!(
            CAT,
            obj = self.obj(),
            "Frame {}: {} markers, mode {}, {} labels",
            report.frame,
            detections.len(),
            report.mode.as_str(),
            report.texts.len()
        );

        if post_messages {
            match crate::common::create_stats_message(timestamp, &report) {
                Some(Ok(s)) => {
                    if let Err(err) = self.obj().post_message(gst::message::Element::new(s)) {
                        gst::debug!(CAT, obj = self.obj(), "Failed to post chart stats: {}", err);
                    }
                }
                Some(Err(err)) => {
                    gst::warning!(
                        CAT,
                        obj = self.obj(),
                        "Failed to serialize chart stats: {}",
                        err
                    );
                }
                None => {}
            }
        }

        Ok(gst::FlowSuccess::Ok)
    }

    fn set_info(
        &self,
        _incaps: &gst::Caps,
        in_info: &gst_video::VideoInfo,
        _outcaps: &gst::Caps,
        _out_info: &gst_video::VideoInfo,
    ) -> Result<(), gst::LoggableError> {
        if in_info.format() != VideoFormat::Bgr {
            return Err(gst::loggable_error!(
                CAT,
                "Unsupported format {:?}, expected BGR",
                in_info.format()
            ));
        }
        gst::debug!(
            CAT,
            obj = self.obj(),
            "Negotiated {}x{} BGR",
            in_info.width(),
            in_info.height()
        );
        *self.video_info.lock().unwrap() = Some(in_info.clone());
        Ok(())
    }
}
