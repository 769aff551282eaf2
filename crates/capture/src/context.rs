//! The capture context: pools, lanes, workers, and stream fan-out.
//!
//! Producers call `add_*` from arbitrary threads. Each lane (video, audio)
//! owns a bounded frame pool and a FIFO task queue drained by one
//! dedicated worker thread that runs the encoder and hands the result to
//! every attached stream writer. Task values are plain slot ids resolved
//! against the pool arena — nothing borrowed crosses the queue.
//!
//! Shutdown is cooperative: `close()` flushes the audio encoder, quiesces
//! both lanes, joins the workers, and closes every writer. Dropping an
//! unclosed context stops the workers and discards whatever was queued.

use std::collections::VecDeque;
use std::io::{Seek, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use fc_common::{
    clock, AacFrame, CaptureConfig, ColorSpace, GraphicsDevice, H264Frame, RawAudioFrame,
    RawVideoFrame, TextureFormat, TextureHandle,
};
use fc_encoder::{
    create_aac_encoder, select_h264_encoder, AacEncoder, AacEncoderConfig, H264Encoder,
    H264EncoderConfig,
};
use fc_mux::Mp4StreamWriter;

use crate::convert;
use crate::error::CaptureError;
use crate::pool::FramePool;
use crate::runtime::Runtime;

/// Byte sinks accepted by [`CaptureContext::attach_stream`].
pub trait CaptureSink: Write + Seek + Send {}
impl<T: Write + Seek + Send> CaptureSink for T {}

type SharedWriter = Arc<Mutex<Mp4StreamWriter<Box<dyn CaptureSink>>>>;

/// Video task record: which pool slot to encode and whether the RGBA
/// staging buffer still needs conversion into the I420 planes.
#[derive(Copy, Clone, Debug)]
struct VideoTask {
    slot: usize,
    convert: bool,
}

/// Audio task record.
#[derive(Copy, Clone, Debug)]
struct AudioTask {
    slot: usize,
}

// ---------------------------------------------------------------------------
// Lanes
// ---------------------------------------------------------------------------

/// One media lane: a FIFO of tagged tasks plus the in-flight counter.
///
/// `active_tasks` counts a task from enqueue until its worker finishes it,
/// so "both counters read zero" means fully quiesced.
struct Lane<T> {
    queue: Mutex<VecDeque<T>>,
    ready: Condvar,
    active_tasks: AtomicUsize,
}

impl<T> Lane<T> {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            active_tasks: AtomicUsize::new(0),
        }
    }

    fn enqueue(&self, task: T) {
        self.active_tasks.fetch_add(1, Ordering::SeqCst);
        self.queue.lock().push_back(task);
        self.ready.notify_one();
    }

    /// Worker side: pop the next task, blocking on the condition variable.
    /// Returns `None` once `stop` is raised; tasks still queued at that
    /// point are discarded.
    fn next(&self, stop: &AtomicBool) -> Option<T> {
        let mut queue = self.queue.lock();
        while !stop.load(Ordering::SeqCst) && queue.is_empty() {
            self.ready.wait(&mut queue);
        }
        if stop.load(Ordering::SeqCst) {
            return None;
        }
        queue.pop_front()
    }

    fn finish_task(&self) {
        self.active_tasks.fetch_sub(1, Ordering::SeqCst);
    }

    fn idle(&self) -> bool {
        self.active_tasks.load(Ordering::SeqCst) == 0
    }
}

struct VideoShared {
    pool: FramePool<RawVideoFrame>,
    lane: Lane<VideoTask>,
}

struct AudioShared {
    pool: FramePool<RawAudioFrame>,
    lane: Lane<AudioTask>,
}

#[derive(Default)]
struct Counters {
    video_frames_submitted: AtomicU64,
    audio_frames_submitted: AtomicU64,
    capture_failures: AtomicU64,
}

struct Shared {
    config: CaptureConfig,
    stop: AtomicBool,
    writers: Mutex<Vec<SharedWriter>>,
    video: Option<VideoShared>,
    audio: Option<AudioShared>,
    /// AudioSpecificConfig captured from the encoder at creation; seeds
    /// every writer attached afterwards.
    aac_header: Vec<u8>,
    counters: Counters,
}

impl Shared {
    fn snapshot_writers(&self) -> Vec<SharedWriter> {
        self.writers.lock().clone()
    }
}

/// Point-in-time statistics for a capture context.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Video frames accepted by `add_video_*`.
    pub video_frames_submitted: u64,
    /// Audio blocks accepted by `add_audio`.
    pub audio_frames_submitted: u64,
    /// Texture readbacks that failed.
    pub capture_failures: u64,
    /// Free slots in the video pool right now.
    pub video_buffers_free: usize,
    /// Total slots in the video pool.
    pub video_buffers_total: usize,
    /// Free slots in the audio pool right now.
    pub audio_buffers_free: usize,
    /// Total slots in the audio pool.
    pub audio_buffers_total: usize,
}

// ---------------------------------------------------------------------------
// CaptureContext
// ---------------------------------------------------------------------------

/// A capture session: two encode lanes feeding any number of MP4 streams.
pub struct CaptureContext {
    shared: Arc<Shared>,
    device: Arc<dyn GraphicsDevice>,
    video_worker: Option<JoinHandle<()>>,
    audio_worker: Option<JoinHandle<()>>,
    closed: bool,
}

impl std::fmt::Debug for CaptureContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureContext")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl CaptureContext {
    /// Create a context, selecting encoders through the runtime per the
    /// configuration. Fails when an enabled lane has no usable codec.
    pub fn new(
        runtime: &Runtime,
        config: CaptureConfig,
        device: Arc<dyn GraphicsDevice>,
    ) -> Result<Self, CaptureError> {
        let video_encoder = if config.video {
            let h264_config = H264EncoderConfig {
                width: config.video_width,
                height: config.video_height,
                target_bitrate: config.video_bitrate,
                max_framerate: config.video_framerate,
            };
            Some(select_h264_encoder(
                runtime.openh264(),
                &h264_config,
                config.video_use_hardware_encoder_if_possible,
            )?)
        } else {
            None
        };

        let audio_encoder = if config.audio {
            let lib = runtime.faac().ok_or_else(|| {
                fc_common::CodecLoadError::LibraryNotFound("FAAC library not loaded".into())
            })?;
            let aac_config = AacEncoderConfig {
                sample_rate: config.audio_sample_rate,
                num_channels: config.audio_num_channels,
                target_bitrate: config.audio_bitrate,
            };
            Some(create_aac_encoder(lib.clone(), &aac_config)?)
        } else {
            None
        };

        Self::with_encoders(config, device, video_encoder, audio_encoder)
    }

    /// Create a context around already-built encoders, bypassing codec
    /// dispatch. Used by hardware integrations and tests.
    pub fn with_encoders(
        config: CaptureConfig,
        device: Arc<dyn GraphicsDevice>,
        video_encoder: Option<Box<dyn H264Encoder>>,
        audio_encoder: Option<Box<dyn AacEncoder>>,
    ) -> Result<Self, CaptureError> {
        if config.video && video_encoder.is_none() {
            return Err(CaptureError::InvalidConfig(
                "video enabled but no H.264 encoder supplied".into(),
            ));
        }
        if config.audio && audio_encoder.is_none() {
            return Err(CaptureError::InvalidConfig(
                "audio enabled but no AAC encoder supplied".into(),
            ));
        }

        let buffers = config.effective_max_buffers() as usize;
        let (width, height) = (config.video_width, config.video_height);

        let video = config.video.then(|| VideoShared {
            pool: FramePool::new(buffers, || RawVideoFrame::new(width, height)),
            lane: Lane::new(),
        });
        let audio = config.audio.then(|| AudioShared {
            pool: FramePool::new(buffers, RawAudioFrame::default),
            lane: Lane::new(),
        });

        let aac_header = audio_encoder
            .as_ref()
            .map(|enc| enc.header().to_vec())
            .unwrap_or_default();

        let shared = Arc::new(Shared {
            config,
            stop: AtomicBool::new(false),
            writers: Mutex::new(Vec::new()),
            video,
            audio,
            aac_header,
            counters: Counters::default(),
        });

        let video_worker = match video_encoder {
            Some(encoder) => {
                let shared = shared.clone();
                Some(
                    std::thread::Builder::new()
                        .name("fc-video-worker".into())
                        .spawn(move || video_worker_loop(&shared, encoder))?,
                )
            }
            None => None,
        };
        let audio_worker = match audio_encoder {
            Some(encoder) => {
                let shared = shared.clone();
                Some(
                    std::thread::Builder::new()
                        .name("fc-audio-worker".into())
                        .spawn(move || audio_worker_loop(&shared, encoder))?,
                )
            }
            None => None,
        };

        info!(
            video = shared.config.video,
            audio = shared.config.audio,
            buffers,
            "Capture context created"
        );

        Ok(Self {
            shared,
            device,
            video_worker,
            audio_worker,
            closed: false,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &CaptureConfig {
        &self.shared.config
    }

    /// Bind a new MP4 stream writer to `sink`. Every frame encoded from
    /// now on is also serialized into this stream.
    pub fn attach_stream<S>(&self, sink: S) -> Result<(), CaptureError>
    where
        S: Write + Seek + Send + 'static,
    {
        let mut writer =
            Mp4StreamWriter::new(Box::new(sink) as Box<dyn CaptureSink>, &self.shared.config)?;
        if !self.shared.aac_header.is_empty() {
            writer.set_aac_header(&self.shared.aac_header);
        }
        self.shared.writers.lock().push(Arc::new(Mutex::new(writer)));
        Ok(())
    }

    /// Submit one video frame by reading back a texture.
    ///
    /// Returns `true` when the frame was enqueued for encoding; `false`
    /// when video is disabled or the readback failed (the pooled frame is
    /// returned either way).
    pub fn add_video_texture(&self, tex: TextureHandle, timestamp_ns: u64) -> bool {
        let Some(video) = &self.shared.video else {
            return false;
        };

        let slot = video.pool.acquire();
        let ts = resolve_timestamp(timestamp_ns);
        {
            let mut frame = video.pool.slot(slot).lock();
            frame.timestamp_ns = ts;
            if let Err(e) = self.device.read_texture(
                &mut frame.rgba,
                tex,
                self.shared.config.video_width,
                self.shared.config.video_height,
                TextureFormat::Rgba8,
            ) {
                drop(frame);
                video.pool.release(slot);
                self.shared
                    .counters
                    .capture_failures
                    .fetch_add(1, Ordering::SeqCst);
                warn!(error = %e, "Texture readback failed; frame dropped");
                return false;
            }
        }

        video.lane.enqueue(VideoTask {
            slot,
            convert: true,
        });
        self.shared
            .counters
            .video_frames_submitted
            .fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Submit one video frame from a raw pixel buffer.
    ///
    /// `pixels` must match the configured geometry: `4·w·h` bytes for
    /// RGBA, `w·h + w·h/4 + w·h/4` for I420.
    pub fn add_video_pixels(
        &self,
        pixels: &[u8],
        colorspace: ColorSpace,
        timestamp_ns: u64,
    ) -> bool {
        let Some(video) = &self.shared.video else {
            return false;
        };

        let expected = match colorspace {
            ColorSpace::Rgba => self.shared.config.rgba_frame_size(),
            ColorSpace::I420 => self.shared.config.i420_frame_size(),
        };
        if pixels.len() != expected {
            warn!(
                got = pixels.len(),
                expected, "Pixel buffer does not match configured geometry"
            );
            return false;
        }

        let slot = video.pool.acquire();
        let ts = resolve_timestamp(timestamp_ns);
        let convert = {
            let mut frame = video.pool.slot(slot).lock();
            frame.timestamp_ns = ts;
            match colorspace {
                ColorSpace::Rgba => {
                    frame.rgba.copy_from_slice(pixels);
                    true
                }
                ColorSpace::I420 => {
                    frame.i420.copy_from_contiguous(pixels);
                    false
                }
            }
        };

        video.lane.enqueue(VideoTask { slot, convert });
        self.shared
            .counters
            .video_frames_submitted
            .fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Submit a block of interleaved f32 samples. A zero-length block
    /// flushes the encoder (issued internally by `close()`).
    pub fn add_audio(&self, samples: &[f32], timestamp_ns: u64) -> bool {
        let Some(audio) = &self.shared.audio else {
            return false;
        };

        let slot = audio.pool.acquire();
        let ts = resolve_timestamp(timestamp_ns);
        audio.pool.slot(slot).lock().fill(samples, ts);

        audio.lane.enqueue(AudioTask { slot });
        self.shared
            .counters
            .audio_frames_submitted
            .fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Spin-yield until both lanes have drained (no queued or running
    /// tasks).
    pub fn wait_idle(&self) {
        loop {
            let video_idle = self.shared.video.as_ref().is_none_or(|v| v.lane.idle());
            let audio_idle = self.shared.audio.as_ref().is_none_or(|a| a.lane.idle());
            if video_idle && audio_idle {
                return;
            }
            std::thread::yield_now();
        }
    }

    /// Flush the audio encoder, drain both lanes, stop the workers, and
    /// close every attached stream. Must be called exactly once; frames
    /// submitted afterwards are rejected.
    pub fn close(&mut self) -> Result<(), CaptureError> {
        if self.closed {
            return Err(CaptureError::AlreadyClosed);
        }

        if self.shared.config.audio {
            self.add_audio(&[], 0);
        }
        self.wait_idle();
        self.shutdown_workers();
        self.closed = true;

        let mut first_err = None;
        for writer in self.shared.snapshot_writers() {
            if let Err(e) = writer.lock().close() {
                warn!(error = %e, "Stream close failed");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }

        debug!("Capture context closed");
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Current counters and pool occupancy.
    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            video_frames_submitted: self
                .shared
                .counters
                .video_frames_submitted
                .load(Ordering::SeqCst),
            audio_frames_submitted: self
                .shared
                .counters
                .audio_frames_submitted
                .load(Ordering::SeqCst),
            capture_failures: self.shared.counters.capture_failures.load(Ordering::SeqCst),
            video_buffers_free: self.shared.video.as_ref().map_or(0, |v| v.pool.free_count()),
            video_buffers_total: self.shared.video.as_ref().map_or(0, |v| v.pool.capacity()),
            audio_buffers_free: self.shared.audio.as_ref().map_or(0, |a| a.pool.free_count()),
            audio_buffers_total: self.shared.audio.as_ref().map_or(0, |a| a.pool.capacity()),
        }
    }

    fn shutdown_workers(&mut self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        if let Some(video) = &self.shared.video {
            video.lane.ready.notify_all();
        }
        if let Some(audio) = &self.shared.audio {
            audio.lane.ready.notify_all();
        }
        if let Some(handle) = self.video_worker.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.audio_worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CaptureContext {
    fn drop(&mut self) {
        if !self.closed {
            self.shutdown_workers();
        }
    }
}

fn resolve_timestamp(timestamp_ns: u64) -> u64 {
    if timestamp_ns != 0 {
        timestamp_ns
    } else {
        clock::now_ns()
    }
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

fn video_worker_loop(shared: &Shared, mut encoder: Box<dyn H264Encoder>) {
    let Some(video) = &shared.video else {
        return;
    };
    debug!(backend = encoder.info(), "Video worker running");

    let mut encoded = H264Frame::default();
    while let Some(task) = video.lane.next(&shared.stop) {
        {
            let mut frame = video.pool.slot(task.slot).lock();
            let ts = frame.timestamp_ns;
            let result = (|| -> Result<(), CaptureError> {
                if task.convert {
                    let RawVideoFrame { rgba, i420, .. } = &mut *frame;
                    convert::rgba_to_i420(rgba, i420)?;
                }
                encoder.encode(&mut encoded, &frame.i420, ts, false)?;
                Ok(())
            })();
            match result {
                Ok(()) => encoded.timestamp_ns = ts,
                Err(e) => {
                    // treated as a zero-byte emission for this frame
                    debug!(error = %e, "Video encode produced nothing");
                    encoded.clear();
                }
            }
        }
        video.pool.release(task.slot);

        if !encoded.data.is_empty() {
            for writer in shared.snapshot_writers() {
                if let Err(e) = writer.lock().add_video_frame(&encoded) {
                    warn!(error = %e, "Video sample write failed");
                }
            }
        }
        video.lane.finish_task();
    }
    debug!("Video worker exited");
}

fn audio_worker_loop(shared: &Shared, mut encoder: Box<dyn AacEncoder>) {
    let Some(audio) = &shared.audio else {
        return;
    };
    let scale = shared.config.audio_scale;

    let mut encoded = AacFrame::default();
    while let Some(task) = audio.lane.next(&shared.stop) {
        {
            let mut frame = audio.pool.slot(task.slot).lock();
            let ts = frame.timestamp_ns;
            if (scale - 1.0).abs() > f32::EPSILON {
                for sample in frame.data.iter_mut() {
                    *sample *= scale;
                }
            }
            match encoder.encode(&mut encoded, &frame.data) {
                Ok(()) => encoded.timestamp_ns = ts,
                Err(e) => {
                    debug!(error = %e, "Audio encode produced nothing");
                    encoded.clear();
                }
            }
        }
        audio.pool.release(task.slot);

        if !encoded.data.is_empty() {
            for writer in shared.snapshot_writers() {
                if let Err(e) = writer.lock().add_audio_frame(&encoded) {
                    warn!(error = %e, "Audio sample write failed");
                }
            }
        }
        audio.lane.finish_task();
    }
    debug!("Audio worker exited");
}
