//! Software H.264 encoder backed by the OpenH264 shared library.
//!
//! OpenH264 ships as a shared library with a C entry point pair
//! (`WelsCreateSVCEncoder` / `WelsDestroySVCEncoder`) returning an object
//! whose first field is a vtable pointer. The library is loaded at runtime
//! via `libloading`; when it is absent the engine reports a codec-load
//! failure instead of crashing.

use std::ffi::c_int;
use std::path::Path;
use std::sync::Arc;

use libloading::Library;
use tracing::{debug, warn};

use fc_common::{CodecLoadError, EncodeError, H264Frame, H264FrameKind, I420Buffer};

use super::{H264Encoder, H264EncoderConfig};

// ---------------------------------------------------------------------------
// FFI surface (subset of codec_api.h)
// ---------------------------------------------------------------------------

const VIDEO_FORMAT_I420: c_int = 23;
const CAMERA_VIDEO_REAL_TIME: c_int = 0;
const RC_QUALITY_MODE: c_int = 0;
const MAX_LAYER_NUM_OF_FRAME: usize = 128;

// EVideoFrameType
const VIDEO_FRAME_TYPE_IDR: c_int = 1;
const VIDEO_FRAME_TYPE_I: c_int = 2;
const VIDEO_FRAME_TYPE_P: c_int = 3;
const VIDEO_FRAME_TYPE_SKIP: c_int = 4;

#[repr(C)]
struct SEncParamBase {
    i_usage_type: c_int,
    i_pic_width: c_int,
    i_pic_height: c_int,
    i_target_bitrate: c_int,
    i_rc_mode: c_int,
    f_max_frame_rate: f32,
}

#[repr(C)]
struct SSourcePicture {
    i_color_format: c_int,
    i_stride: [c_int; 4],
    p_data: [*const u8; 4],
    i_pic_width: c_int,
    i_pic_height: c_int,
    ui_time_stamp: i64,
}

#[repr(C)]
#[derive(Copy, Clone)]
struct SLayerBSInfo {
    ui_temporal_id: u8,
    ui_spatial_id: u8,
    ui_quality_id: u8,
    e_frame_type: c_int,
    ui_layer_type: u8,
    i_sub_seq_id: c_int,
    i_nal_count: c_int,
    p_nal_length_in_byte: *mut c_int,
    p_bs_buf: *mut u8,
}

#[repr(C)]
struct SFrameBSInfo {
    i_layer_num: c_int,
    s_layer_info: [SLayerBSInfo; MAX_LAYER_NUM_OF_FRAME],
    e_frame_type: c_int,
    ui_time_stamp: i64,
}

/// The C view of the encoder object: a pointer to a vtable.
#[repr(C)]
struct ISVCEncoder {
    vtbl: *const ISVCEncoderVtbl,
}

#[repr(C)]
struct ISVCEncoderVtbl {
    initialize: unsafe extern "C" fn(*mut ISVCEncoder, *const SEncParamBase) -> c_int,
    initialize_ext: *const std::ffi::c_void,
    get_default_params: *const std::ffi::c_void,
    uninitialize: unsafe extern "C" fn(*mut ISVCEncoder) -> c_int,
    encode_frame:
        unsafe extern "C" fn(*mut ISVCEncoder, *const SSourcePicture, *mut SFrameBSInfo) -> c_int,
    encode_parameter_sets: *const std::ffi::c_void,
    force_intra_frame: unsafe extern "C" fn(*mut ISVCEncoder, bool) -> c_int,
    set_option: *const std::ffi::c_void,
    get_option: *const std::ffi::c_void,
}

type CreateEncoderFn = unsafe extern "C" fn(*mut *mut ISVCEncoder) -> c_int;
type DestroyEncoderFn = unsafe extern "C" fn(*mut ISVCEncoder);

// ---------------------------------------------------------------------------
// Library handle
// ---------------------------------------------------------------------------

#[cfg(target_os = "windows")]
const LIBRARY_CANDIDATES: &[&str] = &["openh264.dll"];
#[cfg(target_os = "macos")]
const LIBRARY_CANDIDATES: &[&str] = &["libopenh264.dylib"];
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const LIBRARY_CANDIDATES: &[&str] = &["libopenh264.so", "libopenh264.so.7"];

/// A loaded OpenH264 shared library.
///
/// Holds the `Library` handle (keeping the code mapped) alongside the
/// resolved entry points.
pub struct OpenH264Library {
    _lib: Library,
    create_encoder: CreateEncoderFn,
    destroy_encoder: DestroyEncoderFn,
}

// SAFETY: the handle holds only immutable function pointers; OpenH264
// encoder creation is thread-safe. Individual encoder instances are not.
unsafe impl Send for OpenH264Library {}
unsafe impl Sync for OpenH264Library {}

impl std::fmt::Debug for OpenH264Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenH264Library").finish_non_exhaustive()
    }
}

impl OpenH264Library {
    /// Load the library, searching `dir` when given and the system
    /// loader paths otherwise.
    pub fn load(dir: Option<&Path>) -> Result<Self, CodecLoadError> {
        let mut last_err = String::new();
        for name in LIBRARY_CANDIDATES {
            let lib = match dir {
                Some(d) => unsafe { Library::new(d.join(name)) },
                None => unsafe { Library::new(name) },
            };
            match lib {
                Ok(lib) => return Self::resolve(lib),
                Err(e) => last_err = format!("{name}: {e}"),
            }
        }
        Err(CodecLoadError::LibraryNotFound(last_err))
    }

    fn resolve(lib: Library) -> Result<Self, CodecLoadError> {
        let create_encoder = unsafe {
            *lib.get::<CreateEncoderFn>(b"WelsCreateSVCEncoder\0")
                .map_err(|e| CodecLoadError::SymbolNotFound(format!("WelsCreateSVCEncoder: {e}")))?
        };
        let destroy_encoder = unsafe {
            *lib.get::<DestroyEncoderFn>(b"WelsDestroySVCEncoder\0")
                .map_err(|e| CodecLoadError::SymbolNotFound(format!("WelsDestroySVCEncoder: {e}")))?
        };
        debug!("OpenH264 library loaded");
        Ok(Self {
            _lib: lib,
            create_encoder,
            destroy_encoder,
        })
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// One OpenH264 encoder instance.
pub struct OpenH264Encoder {
    lib: Arc<OpenH264Library>,
    raw: *mut ISVCEncoder,
    width: u32,
    height: u32,
}

// SAFETY: the raw encoder handle is only touched through &mut self; the
// owning worker thread is its sole user.
unsafe impl Send for OpenH264Encoder {}

impl OpenH264Encoder {
    pub fn new(lib: Arc<OpenH264Library>, config: &H264EncoderConfig) -> Result<Self, EncodeError> {
        let mut raw: *mut ISVCEncoder = std::ptr::null_mut();
        let ret = unsafe { (lib.create_encoder)(&mut raw) };
        if ret != 0 || raw.is_null() {
            return Err(EncodeError::InitFailed(format!(
                "WelsCreateSVCEncoder returned {ret}"
            )));
        }

        let params = SEncParamBase {
            i_usage_type: CAMERA_VIDEO_REAL_TIME,
            i_pic_width: config.width as c_int,
            i_pic_height: config.height as c_int,
            i_target_bitrate: config.target_bitrate as c_int,
            i_rc_mode: RC_QUALITY_MODE,
            f_max_frame_rate: config.max_framerate as f32,
        };
        let ret = unsafe { ((*(*raw).vtbl).initialize)(raw, &params) };
        if ret != 0 {
            unsafe { (lib.destroy_encoder)(raw) };
            return Err(EncodeError::InitFailed(format!(
                "ISVCEncoder::Initialize returned {ret}"
            )));
        }

        Ok(Self {
            lib,
            raw,
            width: config.width,
            height: config.height,
        })
    }
}

impl H264Encoder for OpenH264Encoder {
    fn info(&self) -> &str {
        "OpenH264"
    }

    fn encode(
        &mut self,
        dst: &mut H264Frame,
        image: &I420Buffer,
        timestamp_ns: u64,
        force_keyframe: bool,
    ) -> Result<bool, EncodeError> {
        dst.clear();
        dst.timestamp_ns = timestamp_ns;

        if image.width() != self.width || image.height() != self.height {
            return Err(EncodeError::UnsupportedInput(format!(
                "image is {}x{}, encoder configured for {}x{}",
                image.width(),
                image.height(),
                self.width,
                self.height
            )));
        }

        if force_keyframe {
            let ret = unsafe { ((*(*self.raw).vtbl).force_intra_frame)(self.raw, true) };
            if ret != 0 {
                warn!(ret, "ForceIntraFrame failed");
            }
        }

        let picture = SSourcePicture {
            i_color_format: VIDEO_FORMAT_I420,
            i_stride: [
                self.width as c_int,
                (self.width / 2) as c_int,
                (self.width / 2) as c_int,
                0,
            ],
            p_data: [
                image.y().as_ptr(),
                image.u().as_ptr(),
                image.v().as_ptr(),
                std::ptr::null(),
            ],
            i_pic_width: self.width as c_int,
            i_pic_height: self.height as c_int,
            ui_time_stamp: (timestamp_ns / 1_000_000) as i64,
        };

        let mut bs_info: Box<SFrameBSInfo> = Box::new(unsafe { std::mem::zeroed() });
        let ret =
            unsafe { ((*(*self.raw).vtbl).encode_frame)(self.raw, &picture, bs_info.as_mut()) };
        if ret != 0 {
            return Err(EncodeError::EncodeFailed(format!(
                "ISVCEncoder::EncodeFrame returned {ret}"
            )));
        }

        match bs_info.e_frame_type {
            VIDEO_FRAME_TYPE_SKIP => return Ok(false),
            VIDEO_FRAME_TYPE_IDR | VIDEO_FRAME_TYPE_I => dst.kind = H264FrameKind::I,
            VIDEO_FRAME_TYPE_P => dst.kind = H264FrameKind::P,
            _ => dst.kind = H264FrameKind::Unknown,
        }

        for layer_idx in 0..bs_info.i_layer_num.max(0) as usize {
            let layer = &bs_info.s_layer_info[layer_idx];
            let mut layer_len = 0usize;
            for nal_idx in 0..layer.i_nal_count.max(0) as usize {
                layer_len += unsafe { *layer.p_nal_length_in_byte.add(nal_idx) } as usize;
            }
            if layer_len > 0 && !layer.p_bs_buf.is_null() {
                let bytes = unsafe { std::slice::from_raw_parts(layer.p_bs_buf, layer_len) };
                dst.data.extend_from_slice(bytes);
            }
        }

        Ok(!dst.data.is_empty())
    }
}

impl Drop for OpenH264Encoder {
    fn drop(&mut self) {
        unsafe {
            ((*(*self.raw).vtbl).uninitialize)(self.raw);
            (self.lib.destroy_encoder)(self.raw);
        }
    }
}
