//! Streaming MP4 writer.
//!
//! Single-pass serializer for one video (H.264) and one audio (AAC) track.
//! The prologue (`ftyp`, `free`, and a 64-bit `mdat` header) is written at
//! construction; encoded frames append directly into `mdat` as they arrive
//! while per-sample index data accumulates in memory. `close()` derives the
//! chunk and decode-time tables, emits the `moov` box, and backpatches the
//! `mdat` length.
//!
//! Layout of the finished stream: `ftyp | free | mdat{ samples } | moov`.

use byteorder::{BigEndian, WriteBytesExt};
use std::io::{Seek, Write};

use fc_common::{AacFrame, CaptureConfig, H264Frame, H264FrameKind, NalUnitType};
use tracing::{debug, info};

use crate::atoms::{
    box_size_placeholder, fill_box_size, large_box_size_placeholder, mac_time,
    patch_large_box_size, write_matrix, write_zeros, LANGUAGE_UND, MOVIE_TIMESCALE,
};
use crate::error::{MuxError, MuxResult};

const AUDIO_TRACK_NAME: &str = "UTJ Sound Media Handler";
const VIDEO_TRACK_NAME: &str = "UTJ Video Media Handler";
const VIDEO_COMPRESSION_NAME: &[u8] = b"AVC Coding";

/// Media timescale shared by the movie header and the video track, and the
/// fixed duration value the original format writes into the audio `mdhd`.
const UNIT_DURATION: u32 = MOVIE_TIMESCALE;

/// Index record for one sample written into `mdat`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SampleInfo {
    /// Absolute byte position where the sample bytes begin.
    pub offset: u64,
    /// Sample byte length as written.
    pub size: u32,
    /// Timestamp carried over from the encoded frame, in nanoseconds.
    pub timestamp_ns: u64,
}

/// Run-length-encoded `stsc` entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct SampleToChunk {
    first_chunk: u32,
    samples_per_chunk: u32,
}

/// Run-length-encoded `stts` entry (durations in milliseconds).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct TimeToSample {
    count: u32,
    duration_ms: u32,
}

// ---------------------------------------------------------------------------
// Index table derivation
// ---------------------------------------------------------------------------

/// Group contiguous samples into chunks. A sample begins a new chunk iff it
/// is the first sample or the previous sample's bytes do not end exactly
/// where this one's begin.
fn derive_chunks(samples: &[SampleInfo]) -> (Vec<u64>, Vec<SampleToChunk>) {
    let mut chunks = Vec::new();
    let mut stc: Vec<SampleToChunk> = Vec::new();
    let mut prev: Option<&SampleInfo> = None;

    for cur in samples {
        let contiguous = prev.is_some_and(|p| p.offset + u64::from(p.size) == cur.offset);
        if contiguous {
            if let Some(last) = stc.last_mut() {
                last.samples_per_chunk += 1;
            }
        } else {
            chunks.push(cur.offset);
            stc.push(SampleToChunk {
                first_chunk: chunks.len() as u32,
                samples_per_chunk: 1,
            });
        }
        prev = Some(cur);
    }
    (chunks, stc)
}

/// Run-length encode inter-sample durations (nanoseconds truncated to
/// milliseconds). Returns the entries and the total track duration in ms.
/// The last sample carries no trailing duration.
fn derive_decode_times(samples: &[SampleInfo]) -> (Vec<TimeToSample>, u32) {
    let mut times: Vec<TimeToSample> = Vec::new();
    let mut total_ms = 0u32;

    for pair in samples.windows(2) {
        let duration_ms =
            (pair[1].timestamp_ns.saturating_sub(pair[0].timestamp_ns) / 1_000_000) as u32;
        total_ms += duration_ms;

        match times.last_mut() {
            Some(last) if last.duration_ms == duration_ms => last.count += 1,
            _ => times.push(TimeToSample {
                count: 1,
                duration_ms,
            }),
        }
    }
    (times, total_ms)
}

/// `co64` is required iff any chunk offset exceeds the 32-bit range. Chunk
/// offsets grow monotonically, so checking the last entry suffices.
fn needs_co64(chunks: &[u64]) -> bool {
    chunks.last().is_some_and(|&o| o > u64::from(u32::MAX))
}

/// The inner descriptor chain carried by the `esds` box: decoder config
/// descriptor wrapping the AAC AudioSpecificConfig (header bytes 2..) plus
/// the trailing SL config descriptor.
fn build_esds_descriptor(aac_header: &[u8], audio_bitrate: u32) -> Vec<u8> {
    let mut add = Vec::new(); // audio decoder descriptor
    add.push(0x40); // object type: ISO/IEC 14496-3 audio
    add.push(0x15); // stream type flags
    add.push(0x00);
    add.extend_from_slice(&0x0600u16.to_be_bytes()); // decode buffer size (1536)
    add.extend_from_slice(&audio_bitrate.to_be_bytes()); // max bitrate
    add.extend_from_slice(&audio_bitrate.to_be_bytes()); // avg bitrate
    add.push(0x05); // decoder specific descriptor
    let tail = if aac_header.len() >= 2 {
        &aac_header[2..]
    } else {
        &[]
    };
    add.push(tail.len() as u8);
    add.extend_from_slice(tail);

    let mut dd = Vec::new(); // decoder descriptor
    dd.extend_from_slice(&[0, 0]); // ES id
    dd.push(0); // stream priority
    dd.push(0x04); // descriptor type
    dd.push(add.len() as u8);
    dd.extend_from_slice(&add);
    dd.push(0x06); // SL config descriptor
    dd.push(0x01);
    dd.push(0x02);
    dd
}

// ---------------------------------------------------------------------------
// Leaf box writers
// ---------------------------------------------------------------------------

fn write_stts<W: Write + Seek>(w: &mut W, times: &[TimeToSample]) -> MuxResult<()> {
    let pos = box_size_placeholder(w)?;
    w.write_all(b"stts")?;
    w.write_u32::<BigEndian>(0)?; // version and flags
    w.write_u32::<BigEndian>(times.len() as u32)?;
    for t in times {
        w.write_u32::<BigEndian>(t.count)?;
        w.write_u32::<BigEndian>(t.duration_ms)?;
    }
    fill_box_size(w, pos)
}

fn write_stss<W: Write + Seek>(w: &mut W, sample_ids: &[u32]) -> MuxResult<()> {
    let pos = box_size_placeholder(w)?;
    w.write_all(b"stss")?;
    w.write_u32::<BigEndian>(0)?;
    w.write_u32::<BigEndian>(sample_ids.len() as u32)?;
    for id in sample_ids {
        w.write_u32::<BigEndian>(*id)?;
    }
    fill_box_size(w, pos)
}

fn write_stsc<W: Write + Seek>(w: &mut W, stc: &[SampleToChunk]) -> MuxResult<()> {
    let pos = box_size_placeholder(w)?;
    w.write_all(b"stsc")?;
    w.write_u32::<BigEndian>(0)?;
    w.write_u32::<BigEndian>(stc.len() as u32)?;
    for e in stc {
        w.write_u32::<BigEndian>(e.first_chunk)?;
        w.write_u32::<BigEndian>(e.samples_per_chunk)?;
        w.write_u32::<BigEndian>(1)?; // sample description index
    }
    fill_box_size(w, pos)
}

fn write_stsz<W: Write + Seek>(w: &mut W, samples: &[SampleInfo]) -> MuxResult<()> {
    let pos = box_size_placeholder(w)?;
    w.write_all(b"stsz")?;
    w.write_u32::<BigEndian>(0)?;
    w.write_u32::<BigEndian>(0)?; // uniform size 0 = per-sample sizes follow
    w.write_u32::<BigEndian>(samples.len() as u32)?;
    for s in samples {
        w.write_u32::<BigEndian>(s.size)?;
    }
    fill_box_size(w, pos)
}

/// `stco` for 32-bit chunk offsets, `co64` once any offset exceeds them.
fn write_chunk_offsets<W: Write + Seek>(w: &mut W, chunks: &[u64]) -> MuxResult<()> {
    let pos = box_size_placeholder(w)?;
    if needs_co64(chunks) {
        w.write_all(b"co64")?;
        w.write_u32::<BigEndian>(0)?;
        w.write_u32::<BigEndian>(chunks.len() as u32)?;
        for c in chunks {
            w.write_u64::<BigEndian>(*c)?;
        }
    } else {
        w.write_all(b"stco")?;
        w.write_u32::<BigEndian>(0)?;
        w.write_u32::<BigEndian>(chunks.len() as u32)?;
        for c in chunks {
            w.write_u32::<BigEndian>(*c as u32)?;
        }
    }
    fill_box_size(w, pos)
}

fn write_hdlr<W: Write + Seek>(w: &mut W, handler: &[u8; 4], name: &str) -> MuxResult<()> {
    let pos = box_size_placeholder(w)?;
    w.write_all(b"hdlr")?;
    w.write_u32::<BigEndian>(0)?; // version and flags
    w.write_u32::<BigEndian>(0)?; // pre-defined
    w.write_all(handler)?;
    write_zeros(w, 12)?; // reserved
    w.write_all(name.as_bytes())?;
    w.write_u8(0)?; // nul terminator
    fill_box_size(w, pos)
}

fn write_dinf<W: Write + Seek>(w: &mut W) -> MuxResult<()> {
    let pos = box_size_placeholder(w)?;
    w.write_all(b"dinf")?;
    let dref_pos = box_size_placeholder(w)?;
    w.write_all(b"dref")?;
    w.write_u32::<BigEndian>(0)?;
    w.write_u32::<BigEndian>(1)?; // entry count
    let url_pos = box_size_placeholder(w)?;
    w.write_all(b"url ")?;
    w.write_u32::<BigEndian>(1)?; // flag 1 = data in this file
    fill_box_size(w, url_pos)?;
    fill_box_size(w, dref_pos)?;
    fill_box_size(w, pos)
}

fn write_mdhd<W: Write + Seek>(
    w: &mut W,
    ctime: u32,
    timescale: u32,
    duration: u32,
) -> MuxResult<()> {
    let pos = box_size_placeholder(w)?;
    w.write_all(b"mdhd")?;
    w.write_u32::<BigEndian>(0)?; // version and flags
    w.write_u32::<BigEndian>(ctime)?;
    w.write_u32::<BigEndian>(ctime)?;
    w.write_u32::<BigEndian>(timescale)?;
    w.write_u32::<BigEndian>(duration)?;
    w.write_u16::<BigEndian>(LANGUAGE_UND)?;
    w.write_u16::<BigEndian>(0)?; // quality
    fill_box_size(w, pos)
}

#[allow(clippy::too_many_arguments)]
fn write_tkhd<W: Write + Seek>(
    w: &mut W,
    ctime: u32,
    track_id: u32,
    duration_ms: u32,
    is_audio: bool,
    width: u32,
    height: u32,
) -> MuxResult<()> {
    let pos = box_size_placeholder(w)?;
    w.write_all(b"tkhd")?;
    w.write_u32::<BigEndian>(0x0000_0006)?; // version 0, flags: in-movie | in-preview
    w.write_u32::<BigEndian>(ctime)?;
    w.write_u32::<BigEndian>(ctime)?;
    w.write_u32::<BigEndian>(track_id)?;
    w.write_u32::<BigEndian>(0)?; // reserved
    w.write_u32::<BigEndian>(duration_ms)?;
    write_zeros(w, 8)?; // reserved
    w.write_u16::<BigEndian>(0)?; // layer
    w.write_u16::<BigEndian>(0)?; // alternate group
    w.write_u16::<BigEndian>(if is_audio { 0x0100 } else { 0 })?; // volume
    w.write_u16::<BigEndian>(0)?; // reserved
    write_matrix(w)?;
    w.write_u32::<BigEndian>(width << 16)?; // 16.16 fixed point
    w.write_u32::<BigEndian>(height << 16)?;
    fill_box_size(w, pos)
}

// ---------------------------------------------------------------------------
// Mp4StreamWriter
// ---------------------------------------------------------------------------

/// Single-pass MP4 serializer bound to one byte sink.
///
/// Frame appends are best-effort: a failed write is reported but the
/// overall capture continues, and I/O errors surface definitively from
/// [`close`](Self::close).
pub struct Mp4StreamWriter<W: Write + Seek> {
    stream: W,
    config: CaptureConfig,
    /// Byte offset of the `mdat` box header (its size is backpatched on close).
    mdat_begin: u64,
    video_samples: Vec<SampleInfo>,
    audio_samples: Vec<SampleInfo>,
    /// 1-based sample numbers of IDR frames (`stss`).
    iframe_ids: Vec<u32>,
    /// Canonical SPS payload, last seen wins; excluded from `mdat`.
    sps: Vec<u8>,
    /// Canonical PPS payload, last seen wins; excluded from `mdat`.
    pps: Vec<u8>,
    /// AAC AudioSpecificConfig from the encoder, carried into `esds`.
    aac_header: Vec<u8>,
    closed: bool,
}

impl<W: Write + Seek> Mp4StreamWriter<W> {
    /// Bind a writer to `stream` and emit the prologue at the current
    /// position: `ftyp`, `free`, and the 64-bit `mdat` header placeholder.
    pub fn new(mut stream: W, config: &CaptureConfig) -> MuxResult<Self> {
        // ftyp: major brand mp42, minor version 0, compatible mp42 + isom
        stream.write_u32::<BigEndian>(0x18)?;
        stream.write_all(b"ftyp")?;
        stream.write_all(b"mp42")?;
        stream.write_u32::<BigEndian>(0)?;
        stream.write_all(b"mp42")?;
        stream.write_all(b"isom")?;

        stream.write_u32::<BigEndian>(0x08)?;
        stream.write_all(b"free")?;

        let mdat_begin = stream.stream_position()?;
        large_box_size_placeholder(&mut stream, b"mdat")?;

        Ok(Self {
            stream,
            config: config.clone(),
            mdat_begin,
            video_samples: Vec::new(),
            audio_samples: Vec::new(),
            iframe_ids: Vec::new(),
            sps: Vec::new(),
            pps: Vec::new(),
            aac_header: Vec::new(),
            closed: false,
        })
    }

    /// Store the AAC AudioSpecificConfig obtained from the encoder.
    pub fn set_aac_header(&mut self, header: &[u8]) {
        self.aac_header = header.to_vec();
    }

    /// Number of video samples recorded so far.
    pub fn video_sample_count(&self) -> usize {
        self.video_samples.len()
    }

    /// Number of audio samples recorded so far.
    pub fn audio_sample_count(&self) -> usize {
        self.audio_samples.len()
    }

    /// Append an encoded H.264 frame.
    ///
    /// SPS and PPS NAL units update the stored decoder configuration and
    /// are not written into `mdat`; every other NAL is written with a
    /// 4-byte big-endian length prefix replacing the Annex-B start code.
    /// A frame that contributed no bytes records no index entry.
    pub fn add_video_frame(&mut self, frame: &H264Frame) -> MuxResult<()> {
        if self.closed {
            return Err(MuxError::AlreadyClosed);
        }
        if frame.data.is_empty() {
            return Ok(());
        }

        let offset = self.stream.stream_position()?;

        if frame.kind == H264FrameKind::I {
            self.iframe_ids.push(self.video_samples.len() as u32 + 1);
        }

        let mut size = 0u32;
        let mut io_result: MuxResult<()> = Ok(());
        let stream = &mut self.stream;
        let sps = &mut self.sps;
        let pps = &mut self.pps;
        frame.for_each_nal(|nal| {
            if io_result.is_err() || nal.len() < 5 {
                return;
            }
            let payload = &nal[4..];
            match NalUnitType::from_header_byte(payload[0]) {
                NalUnitType::Sps => {
                    sps.clear();
                    sps.extend_from_slice(payload);
                }
                NalUnitType::Pps => {
                    pps.clear();
                    pps.extend_from_slice(payload);
                }
                _ => {
                    io_result = (|| -> MuxResult<()> {
                        stream.write_u32::<BigEndian>(payload.len() as u32)?;
                        stream.write_all(payload)?;
                        Ok(())
                    })();
                    if io_result.is_ok() {
                        size += payload.len() as u32 + 4;
                    }
                }
            }
        });
        io_result?;

        if size > 0 {
            self.video_samples.push(SampleInfo {
                offset,
                size,
                timestamp_ns: frame.timestamp_ns,
            });
        }
        debug!(offset, size, ts = frame.timestamp_ns, "video sample");
        Ok(())
    }

    /// Append an encoded AAC frame verbatim.
    pub fn add_audio_frame(&mut self, frame: &AacFrame) -> MuxResult<()> {
        if self.closed {
            return Err(MuxError::AlreadyClosed);
        }
        if frame.data.is_empty() {
            return Ok(());
        }

        let offset = self.stream.stream_position()?;
        self.stream.write_all(&frame.data)?;
        self.audio_samples.push(SampleInfo {
            offset,
            size: frame.data.len() as u32,
            timestamp_ns: frame.timestamp_ns,
        });
        Ok(())
    }

    /// Derive the sample tables, write `moov`, and backpatch the `mdat`
    /// length. Must be called exactly once.
    pub fn close(&mut self) -> MuxResult<()> {
        if self.closed {
            return Err(MuxError::AlreadyClosed);
        }
        self.closed = true;

        // Players expect at least one sync sample.
        if self.iframe_ids.is_empty() {
            self.iframe_ids.push(1);
        }

        let (video_times, video_duration_ms) = derive_decode_times(&self.video_samples);
        let (audio_times, audio_duration_ms) = derive_decode_times(&self.audio_samples);
        let (video_chunks, video_stc) = derive_chunks(&self.video_samples);
        let (audio_chunks, audio_stc) = derive_chunks(&self.audio_samples);

        let mdat_end = self.stream.stream_position()?;
        let ctime = mac_time();
        let mut track_id = 0u32;

        let moov_pos = box_size_placeholder(&mut self.stream)?;
        self.stream.write_all(b"moov")?;

        self.write_mvhd(ctime, video_duration_ms.max(audio_duration_ms))?;

        if self.config.audio {
            track_id += 1;
            self.write_audio_trak(ctime, track_id, audio_duration_ms, &audio_times, &audio_stc, &audio_chunks)?;
        }
        if self.config.video {
            track_id += 1;
            self.write_video_trak(ctime, track_id, video_duration_ms, &video_times, &video_stc, &video_chunks)?;
        }

        fill_box_size(&mut self.stream, moov_pos)?;

        patch_large_box_size(&mut self.stream, self.mdat_begin + 8, mdat_end - self.mdat_begin)?;
        self.stream.flush()?;

        info!(
            video_samples = self.video_samples.len(),
            audio_samples = self.audio_samples.len(),
            mdat_bytes = mdat_end - self.mdat_begin,
            "MP4 stream closed"
        );
        Ok(())
    }

    /// Whether `close` has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn write_mvhd(&mut self, ctime: u32, duration_ms: u32) -> MuxResult<()> {
        let next_track_id = u32::from(self.config.audio) + u32::from(self.config.video) + 1;
        let w = &mut self.stream;
        let pos = box_size_placeholder(w)?;
        w.write_all(b"mvhd")?;
        w.write_u32::<BigEndian>(0)?; // version and flags
        w.write_u32::<BigEndian>(ctime)?;
        w.write_u32::<BigEndian>(ctime)?;
        w.write_u32::<BigEndian>(MOVIE_TIMESCALE)?;
        w.write_u32::<BigEndian>(duration_ms)?;
        w.write_u32::<BigEndian>(0x0001_0000)?; // playback rate 1.0
        w.write_u16::<BigEndian>(0x0100)?; // volume 1.0
        write_zeros(w, 10)?; // reserved
        write_matrix(w)?;
        write_zeros(w, 24)?; // preview/poster/selection/current time
        w.write_u32::<BigEndian>(next_track_id)?;
        fill_box_size(w, pos)
    }

    fn write_audio_trak(
        &mut self,
        ctime: u32,
        track_id: u32,
        duration_ms: u32,
        times: &[TimeToSample],
        stc: &[SampleToChunk],
        chunks: &[u64],
    ) -> MuxResult<()> {
        let dd = build_esds_descriptor(&self.aac_header, self.config.audio_bitrate);
        let sample_rate = self.config.audio_sample_rate;
        let channels = self.config.audio_num_channels as u16;
        let samples = &self.audio_samples;
        let w = &mut self.stream;

        let trak = box_size_placeholder(w)?;
        w.write_all(b"trak")?;
        write_tkhd(w, ctime, track_id, duration_ms, true, 0, 0)?;

        let mdia = box_size_placeholder(w)?;
        w.write_all(b"mdia")?;
        write_mdhd(w, ctime, sample_rate, UNIT_DURATION)?;
        write_hdlr(w, b"soun", AUDIO_TRACK_NAME)?;

        let minf = box_size_placeholder(w)?;
        w.write_all(b"minf")?;

        // smhd: balance 0
        let smhd = box_size_placeholder(w)?;
        w.write_all(b"smhd")?;
        w.write_u32::<BigEndian>(0)?;
        w.write_u32::<BigEndian>(0)?;
        fill_box_size(w, smhd)?;

        write_dinf(w)?;

        let stbl = box_size_placeholder(w)?;
        w.write_all(b"stbl")?;

        let stsd = box_size_placeholder(w)?;
        w.write_all(b"stsd")?;
        w.write_u32::<BigEndian>(0)?;
        w.write_u32::<BigEndian>(1)?; // entry count

        let mp4a = box_size_placeholder(w)?;
        w.write_all(b"mp4a")?;
        write_zeros(w, 6)?; // reserved
        w.write_u16::<BigEndian>(1)?; // data reference index
        w.write_u16::<BigEndian>(0)?; // encoding version
        w.write_u16::<BigEndian>(0)?; // encoding revision
        w.write_u32::<BigEndian>(0)?; // encoding vendor
        w.write_u16::<BigEndian>(channels)?;
        w.write_u16::<BigEndian>(16)?; // sample size
        w.write_u16::<BigEndian>(0)?; // compression id
        w.write_u16::<BigEndian>(0)?; // packet size
        w.write_u32::<BigEndian>(sample_rate << 16)?; // 16.16 fixed point

        let esds = box_size_placeholder(w)?;
        w.write_all(b"esds")?;
        w.write_u32::<BigEndian>(0)?;
        w.write_u8(0x03)?; // ES descriptor
        w.write_u8(dd.len() as u8)?;
        w.write_all(&dd)?;
        fill_box_size(w, esds)?;

        fill_box_size(w, mp4a)?;
        fill_box_size(w, stsd)?;

        write_stts(w, times)?;
        write_stsc(w, stc)?;
        write_stsz(w, samples)?;
        write_chunk_offsets(w, chunks)?;

        fill_box_size(w, stbl)?;
        fill_box_size(w, minf)?;
        fill_box_size(w, mdia)?;
        fill_box_size(w, trak)
    }

    fn write_video_trak(
        &mut self,
        ctime: u32,
        track_id: u32,
        duration_ms: u32,
        times: &[TimeToSample],
        stc: &[SampleToChunk],
        chunks: &[u64],
    ) -> MuxResult<()> {
        let width = self.config.video_width;
        let height = self.config.video_height;
        let sps = &self.sps;
        let pps = &self.pps;
        let samples = &self.video_samples;
        let iframe_ids = &self.iframe_ids;
        let w = &mut self.stream;

        let trak = box_size_placeholder(w)?;
        w.write_all(b"trak")?;
        write_tkhd(w, ctime, track_id, duration_ms, false, width, height)?;

        let mdia = box_size_placeholder(w)?;
        w.write_all(b"mdia")?;
        write_mdhd(w, ctime, UNIT_DURATION, duration_ms)?;
        write_hdlr(w, b"vide", VIDEO_TRACK_NAME)?;

        let minf = box_size_placeholder(w)?;
        w.write_all(b"minf")?;

        // vmhd: graphics mode copy, opcolor black
        let vmhd = box_size_placeholder(w)?;
        w.write_all(b"vmhd")?;
        w.write_u32::<BigEndian>(0x0000_0001)?;
        w.write_u16::<BigEndian>(0)?; // graphics mode
        write_zeros(w, 6)?; // opcolor
        fill_box_size(w, vmhd)?;

        write_dinf(w)?;

        let stbl = box_size_placeholder(w)?;
        w.write_all(b"stbl")?;

        let stsd = box_size_placeholder(w)?;
        w.write_all(b"stsd")?;
        w.write_u32::<BigEndian>(0)?;
        w.write_u32::<BigEndian>(1)?; // entry count

        let avc1 = box_size_placeholder(w)?;
        w.write_all(b"avc1")?;
        write_zeros(w, 6)?; // reserved
        w.write_u16::<BigEndian>(1)?; // data reference index
        w.write_u16::<BigEndian>(0)?; // encoding version
        w.write_u16::<BigEndian>(0)?; // encoding revision
        w.write_u32::<BigEndian>(0)?; // encoding vendor
        w.write_u32::<BigEndian>(0)?; // temporal quality
        w.write_u32::<BigEndian>(0)?; // spatial quality
        w.write_u16::<BigEndian>(width as u16)?;
        w.write_u16::<BigEndian>(height as u16)?;
        w.write_u32::<BigEndian>(0x0048_0000)?; // 72 dpi horizontal
        w.write_u32::<BigEndian>(0x0048_0000)?; // 72 dpi vertical
        w.write_u32::<BigEndian>(0)?; // data size
        w.write_u16::<BigEndian>(1)?; // frame count per sample
        w.write_u8(VIDEO_COMPRESSION_NAME.len() as u8)?;
        w.write_all(VIDEO_COMPRESSION_NAME)?;
        write_zeros(w, 31 - VIDEO_COMPRESSION_NAME.len())?;
        w.write_u16::<BigEndian>(0)?;
        w.write_u16::<BigEndian>(0xFFFF)?; // color table id (none)

        // avcC: decoder configuration with the canonical SPS/PPS
        let avcc = box_size_placeholder(w)?;
        w.write_all(b"avcC")?;
        w.write_u8(1)?; // configuration version
        w.write_u8(sps.get(1).copied().unwrap_or(0x42))?; // profile
        w.write_u8(sps.get(2).copied().unwrap_or(0xC0))?; // profile compatibility
        w.write_u8(sps.get(3).copied().unwrap_or(0x14))?; // level
        w.write_u8(0xFF)?; // 4-byte NAL length prefixes
        w.write_u8(0xE1)?; // one SPS
        w.write_u16::<BigEndian>(sps.len() as u16)?;
        w.write_all(sps)?;
        w.write_u8(1)?; // one PPS
        w.write_u16::<BigEndian>(pps.len() as u16)?;
        w.write_all(pps)?;
        fill_box_size(w, avcc)?;

        fill_box_size(w, avc1)?;
        fill_box_size(w, stsd)?;

        write_stts(w, times)?;
        if !iframe_ids.is_empty() {
            write_stss(w, iframe_ids)?;
        }
        write_stsc(w, stc)?;
        write_stsz(w, samples)?;
        write_chunk_offsets(w, chunks)?;

        fill_box_size(w, stbl)?;
        fill_box_size(w, minf)?;
        fill_box_size(w, mdia)?;
        fill_box_size(w, trak)
    }
}
