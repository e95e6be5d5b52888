use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use gstreamer_base as gst_base;
use gstreamer_video as gst_video;

mod imp;
pub mod meta;

pub use meta::{MarkerDetectionMeta, MarkerRecord};

glib::wrapper! {
    pub struct MarkerDetect(ObjectSubclass<imp::MarkerDetect>)
        @extends gst_video::VideoFilter, gst_base::BaseTransform, gst::Element, gst::Object;
}

/// Element factory name, suffixed with the build's plugin variant if any.
pub fn element_name() -> String {
    let variant = env!("PLUGIN_VARIANT");
    if variant.is_empty() {
        "markerdetect".to_string()
    } else {
        format!("markerdetect_{}", variant)
    }
}

pub fn register(plugin: &gst::Plugin) -> Result<(), glib::BoolError> {
    gst::Element::register(
        Some(plugin),
        &element_name(),
        gst::Rank::NONE,
        MarkerDetect::static_type(),
    )
}
