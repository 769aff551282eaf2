//! AAC encoder abstraction.

pub mod faac;

use std::sync::Arc;

use fc_common::{AacFrame, EncodeError};
use tracing::info;

use faac::{FaacEncoder, FaacLibrary};

/// Configuration handed to the AAC backend.
#[derive(Copy, Clone, Debug)]
pub struct AacEncoderConfig {
    /// Input/output sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub num_channels: u32,
    /// Target bitrate in bits/sec.
    pub target_bitrate: u32,
}

/// One AAC encoding backend.
pub trait AacEncoder: Send {
    /// The AudioSpecificConfig bytes the muxer embeds into `esds`.
    fn header(&self) -> &[u8];

    /// Encode a block of interleaved f32 samples into `dst`.
    ///
    /// The encoder buffers internally until a full AAC frame of input has
    /// accumulated, so `dst` may come back empty. A zero-length `samples`
    /// slice drains whatever is still buffered — the final flush issued
    /// during shutdown.
    fn encode(&mut self, dst: &mut AacFrame, samples: &[f32]) -> Result<(), EncodeError>;
}

/// Create the AAC encoder for the loaded FAAC library.
pub fn create_aac_encoder(
    lib: Arc<FaacLibrary>,
    config: &AacEncoderConfig,
) -> Result<Box<dyn AacEncoder>, EncodeError> {
    let enc = FaacEncoder::new(lib, config)?;
    info!(
        sample_rate = config.sample_rate,
        channels = config.num_channels,
        bitrate = config.target_bitrate,
        "AAC encoder created"
    );
    Ok(Box::new(enc))
}
