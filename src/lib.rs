//! GStreamer plugin measuring color calibration charts framed by fiducial
//! markers.
//!
//! The `markerdetect` element reads marker detections attached to each BGR
//! frame as [`markerdetect::MarkerDetectionMeta`], works out which chart the
//! corner markers announce and overlays the measurements. The analysis
//! itself lives in [`analysis`] and works on plain [`frame::Frame`] views,
//! so it can be driven without a pipeline.

use gstreamer as gst;
use gstreamer::glib;

pub mod analysis;
pub mod anchors;
pub mod chart;
pub mod colorspace;
mod common;
pub mod error;
pub mod frame;
pub mod homography;
pub mod markerdetect;
pub mod metrics;
pub mod overlay;
pub mod sampler;
pub mod trigger;

pub use common::CHART_STATS_MESSAGE;

fn plugin_init(plugin: &gst::Plugin) -> Result<(), glib::BoolError> {
    markerdetect::register(plugin)
}

gst::plugin_define!(
    markerdetect,
    "Marker-anchored color chart analysis",
    plugin_init,
    env!("CARGO_PKG_VERSION"),
    "LGPL",
    env!("CARGO_PKG_NAME"),
    env!("CARGO_PKG_NAME"),
    "http://avnet.com",
    env!("BUILD_REL_DATE")
);
