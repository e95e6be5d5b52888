use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use nalgebra::Point2;
use std::fmt;
use std::ptr;

use crate::anchors::MarkerDetection;

/// One decoded fiducial as attached by the upstream detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerRecord {
    pub id: i32,
    /// Top-left, top-right, bottom-right, bottom-left of the marker.
    pub corners: [(f32, f32); 4],
}

impl MarkerRecord {
    pub fn to_detection(&self) -> MarkerDetection {
        MarkerDetection::new(
            self.id,
            self.corners
                .map(|(x, y)| Point2::new(f64::from(x), f64::from(y))),
        )
    }
}

// Public Rust type for the custom meta
#[repr(C)]
pub struct MarkerDetectionMeta(imp::MarkerDetectionMeta);

// Metas must be Send+Sync
unsafe impl Send for MarkerDetectionMeta {}
unsafe impl Sync for MarkerDetectionMeta {}

impl MarkerDetectionMeta {
    pub fn add(
        buffer: &mut gst::BufferRef,
        markers: Vec<MarkerRecord>,
    ) -> gst::MetaRefMut<Self, gst::meta::Standalone> {
        unsafe {
            let meta = gst::ffi::gst_buffer_add_meta(
                buffer.as_mut_ptr(),
                imp::marker_detection_meta_get_info(),
                ptr::null_mut(),
            ) as *mut imp::MarkerDetectionMeta;

            (*meta).markers = markers;

            Self::from_mut_ptr(buffer, meta)
        }
    }

    pub fn push(&mut self, marker: MarkerRecord) {
        self.0.markers.push(marker);
    }

    pub fn markers(&self) -> &[MarkerRecord] {
        &self.0.markers
    }

    pub fn detections(&self) -> Vec<MarkerDetection> {
        self.0.markers.iter().map(MarkerRecord::to_detection).collect()
    }
}

// Trait to allow using the gst::Buffer API with this meta
unsafe impl MetaAPI for MarkerDetectionMeta {
    type GstType = imp::MarkerDetectionMeta;

    fn meta_api() -> glib::Type {
        imp::marker_detection_meta_api_get_type()
    }
}

impl fmt::Debug for MarkerDetectionMeta {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MarkerDetectionMeta")
            .field("markers", &self.markers())
            .finish()
    }
}

// Actual unsafe implementation of the meta
mod imp {
    use super::MarkerRecord;
    use glib::translate::*;
    use gstreamer as gst;
    use gstreamer::glib;
    use once_cell::sync::Lazy;
    use std::mem;
    use std::ptr;

    // This is the C type that is actually stored as meta inside the buffers
    #[repr(C)]
    pub struct MarkerDetectionMeta {
        pub(super) meta: gst::ffi::GstMeta,
        pub(super) markers: Vec<MarkerRecord>,
    }

    pub(super) fn marker_detection_meta_api_get_type() -> glib::Type {
        static TYPE: Lazy<glib::Type> = Lazy::new(|| unsafe {
            let t = from_glib(gst::ffi::gst_meta_api_type_register(
                c"MarkerDetectionMetaAPI".as_ptr() as *const _,
                [ptr::null::<std::os::raw::c_char>()].as_ptr() as *mut *const _,
            ));

            assert_ne!(t, glib::Type::INVALID);

            t
        });

        *TYPE
    }

    unsafe extern "C" fn marker_detection_meta_init(
        meta: *mut gst::ffi::GstMeta,
        _params: glib::ffi::gpointer,
        _buffer: *mut gst::ffi::GstBuffer,
    ) -> glib::ffi::gboolean {
        let meta = &mut *(meta as *mut MarkerDetectionMeta);

        // The field is uninitialized memory here, so write without dropping
        ptr::write(&mut meta.markers, Vec::new());

        true.into_glib()
    }

    unsafe extern "C" fn marker_detection_meta_free(
        meta: *mut gst::ffi::GstMeta,
        _buffer: *mut gst::ffi::GstBuffer,
    ) {
        let meta = &mut *(meta as *mut MarkerDetectionMeta);

        ptr::drop_in_place(&mut meta.markers);
    }

    // Copy the markers along when buffers are copied or made writable
    unsafe extern "C" fn marker_detection_meta_transform(
        dest: *mut gst::ffi::GstBuffer,
        meta: *mut gst::ffi::GstMeta,
        _buffer: *mut gst::ffi::GstBuffer,
        _type_: glib::ffi::GQuark,
        _data: glib::ffi::gpointer,
    ) -> glib::ffi::gboolean {
        let meta = &*(meta as *mut MarkerDetectionMeta);

        super::MarkerDetectionMeta::add(gst::BufferRef::from_mut_ptr(dest), meta.markers.clone());

        true.into_glib()
    }

    pub(super) fn marker_detection_meta_get_info() -> *const gst::ffi::GstMetaInfo {
        struct MetaInfo(ptr::NonNull<gst::ffi::GstMetaInfo>);
        unsafe impl Send for MetaInfo {}
        unsafe impl Sync for MetaInfo {}

        static META_INFO: Lazy<MetaInfo> = Lazy::new(|| unsafe {
            MetaInfo(
                ptr::NonNull::new(gst::ffi::gst_meta_register(
                    marker_detection_meta_api_get_type().into_glib(),
                    c"MarkerDetectionMeta".as_ptr() as *const _,
                    mem::size_of::<MarkerDetectionMeta>(),
                    Some(marker_detection_meta_init),
                    Some(marker_detection_meta_free),
                    Some(marker_detection_meta_transform),
                ) as *mut gst::ffi::GstMetaInfo)
                .expect("Failed to register meta API"),
            )
        });

        META_INFO.0.as_ptr()
    }
}
