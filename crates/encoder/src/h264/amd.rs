//! AMD AMF hardware H.264 encoder probe.
//!
//! # Current Status
//!
//! Probe-only, like the NVIDIA backend: [`create`] checks whether the AMF
//! runtime can be loaded and then declines so selection falls through to
//! the software encoder. The full implementation requires an AMF context
//! and an `AMFVideoEncoderVCE_AVC` component fed from a D3D/Vulkan
//! surface.

use libloading::Library;
use tracing::debug;

use super::{H264Encoder, H264EncoderConfig};

#[cfg(target_os = "windows")]
const LIBRARY_CANDIDATES: &[&str] = &["amfrt64.dll"];
#[cfg(not(target_os = "windows"))]
const LIBRARY_CANDIDATES: &[&str] = &["libamfrt64.so.1", "libamfrt64.so"];

/// Probe for an AMF-backed encoder. Currently always declines.
pub fn create(config: &H264EncoderConfig) -> Option<Box<dyn H264Encoder>> {
    for name in LIBRARY_CANDIDATES {
        if unsafe { Library::new(name) }.is_ok() {
            debug!(
                library = name,
                width = config.width,
                height = config.height,
                "AMF runtime present but component wiring is not implemented; declining"
            );
            return None;
        }
    }
    debug!("AMF runtime not found");
    None
}
