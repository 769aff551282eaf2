//! `fc-encoder` — encoder selection and codec wrappers.
//!
//! Provides the H.264 and AAC encoding layer of the capture engine. Codec
//! libraries are loaded dynamically at runtime via `libloading`, allowing
//! graceful degradation when a library or the hardware it drives is absent.
//!
//! # Module Structure
//!
//! - [`h264`] — the `H264Encoder` trait and backend selection
//!   - [`h264::openh264`] — software encoder backed by the OpenH264 shared library
//!   - [`h264::nvidia`] — NVENC hardware probe
//!   - [`h264::amd`] — AMF hardware probe
//! - [`aac`] — the `AacEncoder` trait
//!   - [`aac::faac`] — encoder backed by the FAAC shared library
//!
//! # Selection Policy
//!
//! When hardware encoding is requested the probes run in order (NVIDIA,
//! then AMD); the first backend that materializes wins. The software
//! encoder is the unconditional fallback — if its library cannot be
//! loaded either, selection fails and no capture context is created.

pub mod aac;
pub mod h264;

// Re-export primary API types
pub use aac::{create_aac_encoder, faac::FaacLibrary, AacEncoder, AacEncoderConfig};
pub use h264::{openh264::OpenH264Library, select_h264_encoder, H264Encoder, H264EncoderConfig};
