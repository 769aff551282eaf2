//! `fc-common` — Shared types, traits, and errors for the framecast capture engine.
//!
//! This crate is the foundation that the other engine crates depend on.
//! It defines the core abstractions:
//!
//! - **Frames**: `RawVideoFrame`, `RawAudioFrame`, `H264Frame`, `AacFrame` (data flow types)
//! - **Config**: `CaptureConfig` (recognized capture options and their defaults)
//! - **Graphics**: `GraphicsDevice` (texture readback abstraction)
//! - **Clock**: monotonic nanosecond timestamps for enqueued frames
//! - **Errors**: `GpuError`, `EncodeError`, `CodecLoadError` (thiserror-based)

pub mod clock;
pub mod config;
pub mod error;
pub mod frame;
pub mod gfx;

// Re-export commonly used items at crate root
pub use config::CaptureConfig;
pub use error::{CodecLoadError, EncodeError, GpuError};
pub use frame::{
    AacFrame, ColorSpace, H264Frame, H264FrameKind, I420Buffer, NalUnitType, RawAudioFrame,
    RawVideoFrame,
};
pub use gfx::{GraphicsDevice, TextureFormat, TextureHandle};
