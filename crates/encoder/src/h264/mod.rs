//! H.264 encoder abstraction and backend selection.

pub mod amd;
pub mod nvidia;
pub mod openh264;

use std::sync::Arc;

use fc_common::{CodecLoadError, EncodeError, H264Frame, I420Buffer};
use tracing::info;

use openh264::{OpenH264Encoder, OpenH264Library};

/// Configuration handed to every H.264 backend.
#[derive(Copy, Clone, Debug)]
pub struct H264EncoderConfig {
    pub width: u32,
    pub height: u32,
    /// Target bitrate in bits/sec.
    pub target_bitrate: u32,
    /// Upper bound on the input frame rate.
    pub max_framerate: u32,
}

/// One H.264 encoding backend.
///
/// `encode` may buffer internally and produce zero, one, or several NAL
/// units per call; `Ok(false)` with an empty output is the "no emission
/// this tick" signal and is not an error.
pub trait H264Encoder: Send {
    /// Human-readable backend name ("OpenH264", "NVIDIA NVENC", ...).
    fn info(&self) -> &str;

    /// Encode one I420 image. On success `dst` holds the produced Annex-B
    /// bitstream (possibly empty) with its picture kind derived, and the
    /// return value says whether anything was emitted.
    fn encode(
        &mut self,
        dst: &mut H264Frame,
        image: &I420Buffer,
        timestamp_ns: u64,
        force_keyframe: bool,
    ) -> Result<bool, EncodeError>;
}

/// Pick an H.264 backend.
///
/// With `use_hardware` set the probes run in order — NVIDIA, then AMD —
/// and the first one that materializes wins. The software encoder is the
/// unconditional fallback; without its library, selection fails.
pub fn select_h264_encoder(
    software: Option<&Arc<OpenH264Library>>,
    config: &H264EncoderConfig,
    use_hardware: bool,
) -> Result<Box<dyn H264Encoder>, CodecLoadError> {
    if use_hardware {
        if let Some(enc) = nvidia::create(config) {
            info!(backend = enc.info(), "Selected hardware H.264 encoder");
            return Ok(enc);
        }
        if let Some(enc) = amd::create(config) {
            info!(backend = enc.info(), "Selected hardware H.264 encoder");
            return Ok(enc);
        }
    }

    let lib = software.ok_or(CodecLoadError::NoEncoder)?;
    let enc = OpenH264Encoder::new(lib.clone(), config)
        .map_err(|e| CodecLoadError::CreateFailed(e.to_string()))?;
    info!(backend = enc.info(), "Selected software H.264 encoder");
    Ok(Box::new(enc))
}
