//! End-to-end pipeline tests: producers → pools → workers → MP4 streams.
//!
//! Encoders are injected test doubles so the pipeline runs deterministically
//! without codec libraries or a GPU; the resulting MP4 bytes are parsed
//! with a minimal box walker.

use std::io::{Cursor, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use fc_capture::{convert, CaptureContext, CaptureError};
use fc_common::{
    CaptureConfig, ColorSpace, EncodeError, GpuError, GraphicsDevice, H264Frame, H264FrameKind,
    I420Buffer, TextureFormat, TextureHandle,
};
use fc_encoder::{AacEncoder, H264Encoder};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

const SPS: &[u8] = &[0x67, 0x42, 0xC0, 0x1E];
const PPS: &[u8] = &[0x68, 0xCE];
const IDR: &[u8] = &[0x65, 0xAA, 0xBB];
const P: &[u8] = &[0x41, 0xCC];

fn annex_b(units: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for unit in units {
        out.extend_from_slice(&[0, 0, 0, 1]);
        out.extend_from_slice(unit);
    }
    out
}

/// Emits an SPS+PPS+IDR frame first, P frames afterwards, and records the
/// timestamps it was handed.
struct TestVideoEncoder {
    frames: u64,
    timestamps: Arc<Mutex<Vec<u64>>>,
}

impl TestVideoEncoder {
    fn new() -> Self {
        Self {
            frames: 0,
            timestamps: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl H264Encoder for TestVideoEncoder {
    fn info(&self) -> &str {
        "test-h264"
    }

    fn encode(
        &mut self,
        dst: &mut H264Frame,
        _image: &I420Buffer,
        timestamp_ns: u64,
        _force_keyframe: bool,
    ) -> Result<bool, EncodeError> {
        dst.clear();
        dst.timestamp_ns = timestamp_ns;
        self.timestamps.lock().push(timestamp_ns);
        if self.frames == 0 {
            dst.data = annex_b(&[SPS, PPS, IDR]);
            dst.kind = H264FrameKind::I;
        } else {
            dst.data = annex_b(&[P]);
            dst.kind = H264FrameKind::P;
        }
        self.frames += 1;
        Ok(true)
    }
}

/// Records every sample it receives; emits a 2-byte payload per non-empty
/// block and counts flushes.
struct TestAudioEncoder {
    header: Vec<u8>,
    received: Arc<Mutex<Vec<f32>>>,
    flushes: Arc<AtomicUsize>,
}

impl TestAudioEncoder {
    fn new() -> Self {
        Self {
            header: vec![0x12, 0x10],
            received: Arc::new(Mutex::new(Vec::new())),
            flushes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl AacEncoder for TestAudioEncoder {
    fn header(&self) -> &[u8] {
        &self.header
    }

    fn encode(&mut self, dst: &mut fc_common::AacFrame, samples: &[f32]) -> Result<(), EncodeError> {
        dst.clear();
        if samples.is_empty() {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }
        self.received.lock().extend_from_slice(samples);
        dst.data = vec![samples.len() as u8, 0xAB];
        Ok(())
    }
}

struct TestDevice {
    fail_readback: bool,
}

impl GraphicsDevice for TestDevice {
    fn read_texture(
        &self,
        dst: &mut [u8],
        _tex: TextureHandle,
        _width: u32,
        _height: u32,
        _format: TextureFormat,
    ) -> Result<(), GpuError> {
        if self.fail_readback {
            return Err(GpuError::TransferFailed("injected failure".into()));
        }
        dst.fill(0x80);
        Ok(())
    }

    fn write_texture(
        &self,
        _tex: TextureHandle,
        _width: u32,
        _height: u32,
        _format: TextureFormat,
        _src: &[u8],
    ) -> Result<(), GpuError> {
        Ok(())
    }
}

/// A cloneable sink whose bytes remain inspectable after the writer owns it.
#[derive(Clone, Default)]
struct SharedSink {
    inner: Arc<Mutex<Cursor<Vec<u8>>>>,
}

impl SharedSink {
    fn bytes(&self) -> Vec<u8> {
        self.inner.lock().get_ref().clone()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.lock().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.lock().flush()
    }
}

impl Seek for SharedSink {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.inner.lock().seek(pos)
    }
}

// ---------------------------------------------------------------------------
// Box parsing helpers
// ---------------------------------------------------------------------------

fn be32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes(buf[at..at + 4].try_into().unwrap())
}

fn find_box(buf: &[u8], kind: &[u8; 4]) -> usize {
    buf.windows(4)
        .position(|w| w == kind)
        .unwrap_or_else(|| panic!("box {:?} not found", std::str::from_utf8(kind)))
}

fn top_level_boxes(buf: &[u8]) -> Vec<[u8; 4]> {
    let mut boxes = Vec::new();
    let mut offset = 0usize;
    while offset + 8 <= buf.len() {
        let size = be32(buf, offset);
        let mut ty = [0u8; 4];
        ty.copy_from_slice(&buf[offset + 4..offset + 8]);
        boxes.push(ty);
        offset += if size == 1 {
            u64::from_be_bytes(buf[offset + 8..offset + 16].try_into().unwrap()) as usize
        } else {
            size as usize
        };
    }
    boxes
}

fn stsz_sample_count(buf: &[u8]) -> u32 {
    be32(buf, find_box(buf, b"stsz") + 4 + 8)
}

// ---------------------------------------------------------------------------
// Configs
// ---------------------------------------------------------------------------

fn video_config(max_buffers: u32) -> CaptureConfig {
    CaptureConfig {
        video: true,
        video_width: 4,
        video_height: 4,
        video_framerate: 30,
        video_bitrate: 1_000_000,
        video_max_buffers: max_buffers,
        audio: false,
        ..CaptureConfig::default()
    }
}

fn audio_config() -> CaptureConfig {
    CaptureConfig {
        video: false,
        audio: true,
        audio_sample_rate: 48_000,
        audio_num_channels: 2,
        audio_bitrate: 64_000,
        ..CaptureConfig::default()
    }
}

fn i420_pixels(config: &CaptureConfig, value: u8) -> Vec<u8> {
    vec![value; config.i420_frame_size()]
}

fn device() -> Arc<dyn GraphicsDevice> {
    Arc::new(TestDevice {
        fail_readback: false,
    })
}

// ---------------------------------------------------------------------------
// Pipeline tests
// ---------------------------------------------------------------------------

#[test]
fn video_only_pipeline_produces_valid_mp4() {
    convert::initialize_converter();
    let config = video_config(0);
    let mut ctx = CaptureContext::with_encoders(
        config.clone(),
        device(),
        Some(Box::new(TestVideoEncoder::new())),
        None,
    )
    .unwrap();
    let sink = SharedSink::default();
    ctx.attach_stream(sink.clone()).unwrap();

    let rgba = vec![0x40u8; config.rgba_frame_size()];
    for i in 0..5u64 {
        assert!(ctx.add_video_pixels(&rgba, ColorSpace::Rgba, (i + 1) * 33_000_000));
    }
    ctx.close().unwrap();

    let buf = sink.bytes();
    assert_eq!(
        top_level_boxes(&buf),
        vec![*b"ftyp", *b"free", *b"mdat", *b"moov"]
    );

    assert_eq!(stsz_sample_count(&buf), 5);

    // first frame carried the IDR, so sample 1 is the only sync sample
    let stss_body = find_box(&buf, b"stss") + 4;
    assert_eq!(be32(&buf, stss_body + 4), 1);
    assert_eq!(be32(&buf, stss_body + 8), 1);

    // uniform 33 ms deltas collapse into one stts run of four
    let stts_body = find_box(&buf, b"stts") + 4;
    assert_eq!(be32(&buf, stts_body + 4), 1);
    assert_eq!(be32(&buf, stts_body + 8), 4);
    assert_eq!(be32(&buf, stts_body + 12), 33);

    let stats = ctx.stats();
    assert_eq!(stats.video_frames_submitted, 5);
    assert_eq!(stats.video_buffers_free, stats.video_buffers_total);
}

#[test]
fn concurrent_producers_record_every_submitted_frame() {
    let config = video_config(2);
    let mut ctx = CaptureContext::with_encoders(
        config.clone(),
        device(),
        Some(Box::new(TestVideoEncoder::new())),
        None,
    )
    .unwrap();
    let sink = SharedSink::default();
    ctx.attach_stream(sink.clone()).unwrap();

    const PRODUCERS: usize = 4;
    const FRAMES_EACH: usize = 10;

    std::thread::scope(|s| {
        for p in 0..PRODUCERS {
            let ctx = &ctx;
            let pixels = i420_pixels(&config, p as u8);
            s.spawn(move || {
                for _ in 0..FRAMES_EACH {
                    assert!(ctx.add_video_pixels(&pixels, ColorSpace::I420, 0));
                }
            });
        }
    });

    ctx.wait_idle();
    let stats = ctx.stats();
    assert_eq!(
        stats.video_frames_submitted,
        (PRODUCERS * FRAMES_EACH) as u64
    );
    assert_eq!(
        stats.video_buffers_free, stats.video_buffers_total,
        "all pooled frames must return after quiesce"
    );

    ctx.close().unwrap();
    assert_eq!(stsz_sample_count(&sink.bytes()), (PRODUCERS * FRAMES_EACH) as u32);
}

#[test]
fn single_buffer_two_producers_make_progress() {
    let config = video_config(1);
    let mut ctx = CaptureContext::with_encoders(
        config.clone(),
        device(),
        Some(Box::new(TestVideoEncoder::new())),
        None,
    )
    .unwrap();
    let sink = SharedSink::default();
    ctx.attach_stream(sink.clone()).unwrap();

    std::thread::scope(|s| {
        for _ in 0..2 {
            let ctx = &ctx;
            let pixels = i420_pixels(&config, 7);
            s.spawn(move || {
                for _ in 0..5 {
                    assert!(ctx.add_video_pixels(&pixels, ColorSpace::I420, 0));
                }
            });
        }
    });

    ctx.close().unwrap();
    assert_eq!(stsz_sample_count(&sink.bytes()), 10);
}

#[test]
fn audio_scale_is_applied_and_close_flushes() {
    let encoder = TestAudioEncoder::new();
    let received = encoder.received.clone();
    let flushes = encoder.flushes.clone();

    let mut ctx = CaptureContext::with_encoders(
        CaptureConfig {
            audio_scale: 2.0,
            ..audio_config()
        },
        device(),
        None,
        Some(Box::new(encoder)),
    )
    .unwrap();
    let sink = SharedSink::default();
    ctx.attach_stream(sink.clone()).unwrap();

    assert!(ctx.add_audio(&[0.25; 8], 10_000_000));
    ctx.close().unwrap();

    assert_eq!(*received.lock(), vec![0.5f32; 8]);
    assert!(
        flushes.load(Ordering::SeqCst) >= 1,
        "close must issue the zero-length flush"
    );

    // one recorded audio sample (the flush emitted nothing)
    assert_eq!(stsz_sample_count(&sink.bytes()), 1);
}

#[test]
fn timestamp_policy_verbatim_or_clock() {
    let config = video_config(0);
    let encoder = TestVideoEncoder::new();
    let timestamps = encoder.timestamps.clone();
    let mut ctx =
        CaptureContext::with_encoders(config.clone(), device(), Some(Box::new(encoder)), None)
            .unwrap();

    let pixels = i420_pixels(&config, 1);
    assert!(ctx.add_video_pixels(&pixels, ColorSpace::I420, 123_456_789));
    assert!(ctx.add_video_pixels(&pixels, ColorSpace::I420, 0));
    ctx.wait_idle();

    let seen = timestamps.lock().clone();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], 123_456_789, "non-zero timestamps pass through verbatim");
    assert_ne!(seen[1], 0, "zero timestamps are replaced by the clock");

    ctx.close().unwrap();
}

#[test]
fn failed_readback_returns_frame_and_reports_false() {
    let config = video_config(1);
    let mut ctx = CaptureContext::with_encoders(
        config,
        Arc::new(TestDevice {
            fail_readback: true,
        }),
        Some(Box::new(TestVideoEncoder::new())),
        None,
    )
    .unwrap();
    let sink = SharedSink::default();
    ctx.attach_stream(sink.clone()).unwrap();

    assert!(!ctx.add_video_texture(TextureHandle(1), 0));

    let stats = ctx.stats();
    assert_eq!(stats.capture_failures, 1);
    assert_eq!(stats.video_frames_submitted, 0);
    assert_eq!(stats.video_buffers_free, stats.video_buffers_total);

    ctx.close().unwrap();
    assert_eq!(stsz_sample_count(&sink.bytes()), 0);
}

#[test]
fn mismatched_pixel_buffer_is_rejected() {
    let config = video_config(0);
    let mut ctx = CaptureContext::with_encoders(
        config,
        device(),
        Some(Box::new(TestVideoEncoder::new())),
        None,
    )
    .unwrap();

    assert!(!ctx.add_video_pixels(&[0u8; 3], ColorSpace::Rgba, 0));
    assert!(!ctx.add_video_pixels(&[0u8; 3], ColorSpace::I420, 0));
    assert_eq!(ctx.stats().video_frames_submitted, 0);
    ctx.close().unwrap();
}

#[test]
fn disabled_lanes_report_false() {
    let config = video_config(0);
    let mut video_only = CaptureContext::with_encoders(
        config.clone(),
        device(),
        Some(Box::new(TestVideoEncoder::new())),
        None,
    )
    .unwrap();
    assert!(!video_only.add_audio(&[0.0; 4], 0));
    video_only.close().unwrap();

    let mut audio_only = CaptureContext::with_encoders(
        audio_config(),
        device(),
        None,
        Some(Box::new(TestAudioEncoder::new())),
    )
    .unwrap();
    let pixels = i420_pixels(&video_config(0), 0);
    assert!(!audio_only.add_video_pixels(&pixels, ColorSpace::I420, 0));
    assert!(!audio_only.add_video_texture(TextureHandle(3), 0));
    audio_only.close().unwrap();
}

#[test]
fn every_attached_stream_receives_identical_bytes() {
    let config = video_config(0);
    let mut ctx = CaptureContext::with_encoders(
        config.clone(),
        device(),
        Some(Box::new(TestVideoEncoder::new())),
        None,
    )
    .unwrap();
    let first = SharedSink::default();
    let second = SharedSink::default();
    ctx.attach_stream(first.clone()).unwrap();
    ctx.attach_stream(second.clone()).unwrap();

    let pixels = i420_pixels(&config, 3);
    for i in 0..3u64 {
        assert!(ctx.add_video_pixels(&pixels, ColorSpace::I420, (i + 1) * 40_000_000));
    }
    ctx.close().unwrap();

    let a = first.bytes();
    let b = second.bytes();
    assert!(!a.is_empty());
    assert_eq!(a, b);
}

#[test]
fn missing_encoder_for_enabled_lane_is_rejected() {
    let err = CaptureContext::with_encoders(video_config(0), device(), None, None).unwrap_err();
    assert!(matches!(err, CaptureError::InvalidConfig(_)));

    let err = CaptureContext::with_encoders(audio_config(), device(), None, None).unwrap_err();
    assert!(matches!(err, CaptureError::InvalidConfig(_)));
}

#[test]
fn close_twice_is_rejected() {
    let mut ctx = CaptureContext::with_encoders(
        video_config(0),
        device(),
        Some(Box::new(TestVideoEncoder::new())),
        None,
    )
    .unwrap();
    ctx.close().unwrap();
    assert!(matches!(ctx.close(), Err(CaptureError::AlreadyClosed)));
}
