//! Capture configuration.

use serde::{Deserialize, Serialize};

/// Number of pooled raw frames used when `video_max_buffers` is 0.
pub const DEFAULT_MAX_BUFFERS: u32 = 4;

/// Configuration for a capture context.
///
/// Mirrors the options recognized by the embedding API. `video_max_buffers`
/// bounds the number of raw frames in flight per lane and is the only
/// admission-control knob: producers block once the pool is drained.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Whether a video track is captured.
    pub video: bool,
    /// Output width in pixels.
    pub video_width: u32,
    /// Output height in pixels.
    pub video_height: u32,
    /// Target frame rate passed to the encoder.
    pub video_framerate: u32,
    /// Target video bitrate in bits/sec.
    pub video_bitrate: u32,
    /// Size of the pooled raw-frame arena per lane (0 = default of 4).
    pub video_max_buffers: u32,
    /// Prefer a hardware H.264 encoder when one is available.
    pub video_use_hardware_encoder_if_possible: bool,

    /// Whether an audio track is captured.
    pub audio: bool,
    /// Audio sample rate in Hz.
    pub audio_sample_rate: u32,
    /// Number of interleaved audio channels.
    pub audio_num_channels: u32,
    /// Target audio bitrate in bits/sec.
    pub audio_bitrate: u32,
    /// Gain applied to every sample before encoding (1.0 = none).
    pub audio_scale: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            video: true,
            video_width: 1920,
            video_height: 1080,
            video_framerate: 30,
            video_bitrate: 8_000_000,
            video_max_buffers: 0,
            video_use_hardware_encoder_if_possible: true,
            audio: false,
            audio_sample_rate: 48_000,
            audio_num_channels: 2,
            audio_bitrate: 64_000,
            audio_scale: 1.0,
        }
    }
}

impl CaptureConfig {
    /// Effective pool size: `video_max_buffers`, with 0 meaning the default.
    pub fn effective_max_buffers(&self) -> u32 {
        if self.video_max_buffers == 0 {
            DEFAULT_MAX_BUFFERS
        } else {
            self.video_max_buffers
        }
    }

    /// Byte size of one RGBA raw frame.
    pub fn rgba_frame_size(&self) -> usize {
        self.video_width as usize * self.video_height as usize * 4
    }

    /// Byte size of one I420 raw frame (Y + U + V planes).
    pub fn i420_frame_size(&self) -> usize {
        let wh = self.video_width as usize * self.video_height as usize;
        wh + wh / 4 + wh / 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_embedding_defaults() {
        let cfg = CaptureConfig::default();
        assert!(cfg.video);
        assert!(!cfg.audio);
        assert!(cfg.video_use_hardware_encoder_if_possible);
        assert_eq!(cfg.video_width, 1920);
        assert_eq!(cfg.video_height, 1080);
        assert_eq!(cfg.audio_sample_rate, 48_000);
        assert_eq!(cfg.audio_num_channels, 2);
        assert!((cfg.audio_scale - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_max_buffers_falls_back_to_default() {
        let cfg = CaptureConfig {
            video_max_buffers: 0,
            ..CaptureConfig::default()
        };
        assert_eq!(cfg.effective_max_buffers(), DEFAULT_MAX_BUFFERS);

        let cfg = CaptureConfig {
            video_max_buffers: 2,
            ..CaptureConfig::default()
        };
        assert_eq!(cfg.effective_max_buffers(), 2);
    }

    #[test]
    fn frame_sizes() {
        let cfg = CaptureConfig {
            video_width: 4,
            video_height: 2,
            ..CaptureConfig::default()
        };
        assert_eq!(cfg.rgba_frame_size(), 4 * 2 * 4);
        assert_eq!(cfg.i420_frame_size(), 8 + 2 + 2);
    }
}
