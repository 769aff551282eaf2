//! NVIDIA NVENC hardware H.264 encoder probe.
//!
//! # Current Status
//!
//! This is a probe-only backend: [`create`] checks whether the NVENC
//! runtime library can be loaded and then declines, so selection falls
//! through to the next backend. The module exists so that the dispatch
//! order (NVIDIA, AMD, software) is real code, and so the session wiring
//! can land here without touching the selection logic.
//!
//! The full implementation requires an NVENC encode session
//! (`NvEncOpenEncodeSessionEx`), input surface registration, per-frame
//! `NvEncEncodePicture` calls, and bitstream lock/unlock — plus a CUDA or
//! D3D device to feed it.

use libloading::Library;
use tracing::debug;

use super::{H264Encoder, H264EncoderConfig};

#[cfg(target_os = "windows")]
const LIBRARY_CANDIDATES: &[&str] = &["nvEncodeAPI64.dll"];
#[cfg(not(target_os = "windows"))]
const LIBRARY_CANDIDATES: &[&str] = &["libnvidia-encode.so.1", "libnvidia-encode.so"];

/// Probe for an NVENC-backed encoder. Currently always declines.
pub fn create(config: &H264EncoderConfig) -> Option<Box<dyn H264Encoder>> {
    for name in LIBRARY_CANDIDATES {
        if unsafe { Library::new(name) }.is_ok() {
            debug!(
                library = name,
                width = config.width,
                height = config.height,
                "NVENC runtime present but session wiring is not implemented; declining"
            );
            return None;
        }
    }
    debug!("NVENC runtime not found");
    None
}
