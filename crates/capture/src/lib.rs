//! `fc-capture` — the capture context tying the engine together.
//!
//! Raw video frames (texture readbacks or caller-supplied pixel buffers)
//! and raw audio sample blocks enter through [`CaptureContext`], travel
//! through bounded per-lane frame pools to dedicated encoder worker
//! threads, and fan out as encoded bitstream to every attached MP4 stream
//! writer.
//!
//! ```text
//!  raw video pixels ─┐                    ┌─► H.264 encoder ─┐
//!                    ├► video frame pool ─┤                  │
//!   GPU texture ─────┘      (bounded)     └──► video worker ─┤
//!                                                            ├─► stream writer(s)
//!                                          ┌──► audio worker ┤
//!  raw float samples ─► audio frame pool ──┤                 │
//!                        (bounded)         └─► AAC encoder ──┘
//! ```

pub mod context;
pub mod convert;
pub mod error;
pub mod pool;
pub mod runtime;

// Re-export primary API types
pub use context::{CaptureContext, CaptureSink, CaptureStats};
pub use error::CaptureError;
pub use pool::FramePool;
pub use runtime::{Runtime, RuntimeConfig};
