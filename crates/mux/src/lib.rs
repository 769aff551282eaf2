//! `fc-mux` — streaming MP4 container writer for the framecast capture engine.
//!
//! Serializes encoded H.264 and AAC frames into a playable MP4 file
//! (ISO Base Media File Format / ISO 14496-12) in a single pass.
//!
//! # Architecture
//!
//! - **No FFmpeg dependency** — pure Rust MP4 box writing
//! - **Streaming** — `ftyp`, `free`, and a 64-bit `mdat` header are written
//!   eagerly; sample bytes append as frames arrive
//! - **Moov-at-end** — per-sample index tables accumulate in memory and the
//!   `moov` box is emitted by `close()`, which also backpatches the `mdat`
//!   length
//! - **Any sink** — generic over `std::io::Write + Seek`
//!
//! # Usage
//!
//! ```ignore
//! use fc_mux::Mp4StreamWriter;
//!
//! let mut writer = Mp4StreamWriter::new(sink, &config)?;
//! writer.set_aac_header(aac_encoder.header());
//!
//! // Append encoded frames progressively (any interleaving)
//! writer.add_video_frame(&h264_frame)?;
//! writer.add_audio_frame(&aac_frame)?;
//!
//! // Close: derives the sample tables, writes moov, backpatches mdat
//! writer.close()?;
//! ```

pub mod atoms;
pub mod error;
pub mod writer;

// Re-export primary API types
pub use error::{MuxError, MuxResult};
pub use writer::{Mp4StreamWriter, SampleInfo};
