//! Capture-context error types.

use thiserror::Error;

/// Errors surfaced by the capture context.
///
/// Per-frame failures (readback, encode) are *not* errors at this level —
/// they degrade to a `false` submission result or a dropped frame. Only
/// configuration-time failures and `close()` I/O reach the caller.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Codec load failure: {0}")]
    CodecLoad(#[from] fc_common::CodecLoadError),

    #[error("Encoder failure: {0}")]
    Encoder(#[from] fc_common::EncodeError),

    #[error("Mux error: {0}")]
    Mux(#[from] fc_mux::MuxError),

    #[error("Color conversion failed: {0}")]
    Convert(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Capture context already closed")]
    AlreadyClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
