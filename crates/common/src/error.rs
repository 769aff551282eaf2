//! Shared error types for the capture engine (thiserror-based).

use thiserror::Error;

/// Graphics device errors (texture readback / upload).
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("Texture transfer failed: {0}")]
    TransferFailed(String),

    #[error("Invalid texture handle: {0:#x}")]
    InvalidHandle(u64),

    #[error("Destination buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
}

/// Errors from loading a codec library at runtime.
#[derive(Error, Debug)]
pub enum CodecLoadError {
    #[error("Codec library not found: {0}")]
    LibraryNotFound(String),

    #[error("Required symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Codec library loaded but encoder creation failed: {0}")]
    CreateFailed(String),

    #[error("No H.264 encoder available (hardware probes declined and no software codec loaded)")]
    NoEncoder,
}

/// Errors from the per-frame encode path.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Encoder init failed: {0}")]
    InitFailed(String),

    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_error_display() {
        let err = GpuError::TransferFailed("device lost".into());
        assert!(err.to_string().contains("device lost"));
    }

    #[test]
    fn gpu_error_buffer_too_small() {
        let err = GpuError::BufferTooSmall {
            needed: 100,
            got: 50,
        };
        let msg = err.to_string();
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn codec_load_error_display() {
        let err = CodecLoadError::LibraryNotFound("libopenh264.so".into());
        assert!(err.to_string().contains("libopenh264.so"));
    }

    #[test]
    fn encode_error_display() {
        let err = EncodeError::EncodeFailed("bitstream overflow".into());
        assert!(err.to_string().contains("bitstream overflow"));
    }
}
