//! Raw and encoded media frames — the data flowing through the pipeline.
//!
//! Raw frames are pooled, fixed-size buffers filled by producers and
//! consumed by the encoder workers. Encoded frames exist only inside one
//! worker task: they are handed to every attached stream writer and then
//! cleared for reuse.

use std::fmt;

/// Annex-B NAL start code (`0x00000001`).
pub const NAL_START_CODE: [u8; 4] = [0, 0, 0, 1];

/// Color space of caller-supplied raw pixel buffers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColorSpace {
    /// 4 bytes per pixel, converted to I420 before encoding.
    Rgba,
    /// Planar YUV 4:2:0, copied into the pooled frame directly.
    I420,
}

// ---------------------------------------------------------------------------
// I420 buffer
// ---------------------------------------------------------------------------

/// Planar YUV 4:2:0 pixel storage: full-plane Y followed by half-width,
/// half-height U and V planes in one contiguous allocation.
#[derive(Clone, Debug)]
pub struct I420Buffer {
    buf: Vec<u8>,
    width: u32,
    height: u32,
}

impl I420Buffer {
    /// Allocate zeroed planes for the given geometry.
    pub fn new(width: u32, height: u32) -> Self {
        let wh = width as usize * height as usize;
        Self {
            buf: vec![0u8; wh + wh / 4 + wh / 4],
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn y_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn chroma_len(&self) -> usize {
        self.y_len() / 4
    }

    /// The Y plane (`width × height` bytes).
    pub fn y(&self) -> &[u8] {
        &self.buf[..self.y_len()]
    }

    /// The U plane (`width/2 × height/2` bytes).
    pub fn u(&self) -> &[u8] {
        let y = self.y_len();
        &self.buf[y..y + self.chroma_len()]
    }

    /// The V plane (`width/2 × height/2` bytes).
    pub fn v(&self) -> &[u8] {
        let start = self.y_len() + self.chroma_len();
        &self.buf[start..start + self.chroma_len()]
    }

    /// All three planes as mutable slices, in Y, U, V order.
    pub fn planes_mut(&mut self) -> (&mut [u8], &mut [u8], &mut [u8]) {
        let y_len = self.y_len();
        let c_len = self.chroma_len();
        let (y, rest) = self.buf.split_at_mut(y_len);
        let (u, v) = rest.split_at_mut(c_len);
        (y, u, &mut v[..c_len])
    }

    /// Copy contiguous I420 data (Y then U then V) into the planes.
    ///
    /// Returns `false` when `src` does not match the buffer geometry.
    pub fn copy_from_contiguous(&mut self, src: &[u8]) -> bool {
        if src.len() != self.buf.len() {
            return false;
        }
        self.buf.copy_from_slice(src);
        true
    }

    /// Total byte size of all planes.
    pub fn byte_len(&self) -> usize {
        self.buf.len()
    }
}

// ---------------------------------------------------------------------------
// Raw frames
// ---------------------------------------------------------------------------

/// A pooled raw video frame: an RGBA staging buffer plus the I420 planes
/// handed to the encoder. Both are sized at pool creation and never
/// reallocated.
#[derive(Clone, Debug)]
pub struct RawVideoFrame {
    /// RGBA staging buffer (`4 × width × height` bytes).
    pub rgba: Vec<u8>,
    /// I420 planes passed to the H.264 encoder.
    pub i420: I420Buffer,
    /// Enqueue timestamp in nanoseconds.
    pub timestamp_ns: u64,
}

impl RawVideoFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            rgba: vec![0u8; width as usize * height as usize * 4],
            i420: I420Buffer::new(width, height),
            timestamp_ns: 0,
        }
    }
}

/// A pooled raw audio frame: interleaved f32 PCM samples.
///
/// Unlike video frames the sample count varies per submission; the backing
/// allocation is reused across tasks so steady-state capture does not
/// allocate.
#[derive(Clone, Debug, Default)]
pub struct RawAudioFrame {
    /// Interleaved f32 samples.
    pub data: Vec<f32>,
    /// Enqueue timestamp in nanoseconds.
    pub timestamp_ns: u64,
}

impl RawAudioFrame {
    /// Replace the frame contents, reusing the existing allocation.
    pub fn fill(&mut self, samples: &[f32], timestamp_ns: u64) {
        self.data.clear();
        self.data.extend_from_slice(samples);
        self.timestamp_ns = timestamp_ns;
    }
}

// ---------------------------------------------------------------------------
// Encoded frames
// ---------------------------------------------------------------------------

/// H.264 NAL unit types the muxer cares about.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NalUnitType {
    /// Non-IDR coded slice (type 1).
    Slice,
    /// IDR coded slice (type 5).
    Idr,
    /// Sequence parameter set (type 7).
    Sps,
    /// Picture parameter set (type 8).
    Pps,
    /// Anything else.
    Other(u8),
}

impl NalUnitType {
    /// Classify from the NAL header byte (the byte after the start code).
    pub fn from_header_byte(byte: u8) -> Self {
        match byte & 0x1F {
            1 => Self::Slice,
            5 => Self::Idr,
            7 => Self::Sps,
            8 => Self::Pps,
            other => Self::Other(other),
        }
    }
}

/// Picture kind of an encoded H.264 frame, derived from its first VCL NAL.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum H264FrameKind {
    I,
    P,
    B,
    #[default]
    Unknown,
}

impl H264FrameKind {
    /// Derive the kind from an Annex-B bitstream: an IDR slice makes the
    /// frame an I-frame, a non-IDR slice a P-frame. B-frames are never
    /// produced by this pipeline, so type-1 slices are classified P.
    pub fn from_bitstream(data: &[u8]) -> Self {
        let mut kind = Self::Unknown;
        for_each_nal_in(data, |nal| {
            if kind != Self::Unknown || nal.len() < 5 {
                return;
            }
            match NalUnitType::from_header_byte(nal[4]) {
                NalUnitType::Idr => kind = Self::I,
                NalUnitType::Slice => kind = Self::P,
                _ => {}
            }
        });
        kind
    }
}

/// Walk the Annex-B NAL units in `data`, yielding each unit as a slice that
/// includes its 4-byte start code.
fn for_each_nal_in(data: &[u8], mut f: impl FnMut(&[u8])) {
    if data.len() < 5 {
        return;
    }
    let mut start = match find_start_code(data, 0) {
        Some(pos) => pos,
        None => return,
    };
    loop {
        match find_start_code(data, start + 4) {
            Some(next) => {
                f(&data[start..next]);
                start = next;
            }
            None => {
                f(&data[start..]);
                break;
            }
        }
    }
}

fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    if data.len() < from + 4 {
        return None;
    }
    data[from..]
        .windows(4)
        .position(|w| w == NAL_START_CODE)
        .map(|p| p + from)
}

/// An encoded H.264 frame: Annex-B bitstream plus timestamp bookkeeping.
#[derive(Clone, Debug, Default)]
pub struct H264Frame {
    /// Annex-B bitstream (NAL units prefixed by `0x00000001`).
    pub data: Vec<u8>,
    /// Picture kind derived from the first VCL NAL.
    pub kind: H264FrameKind,
    /// Timestamp carried over from the raw frame, in nanoseconds.
    pub timestamp_ns: u64,
}

impl H264Frame {
    /// Reset for reuse by the next encode task.
    pub fn clear(&mut self) {
        self.data.clear();
        self.kind = H264FrameKind::Unknown;
        self.timestamp_ns = 0;
    }

    /// Yield each NAL unit (start code included) in bitstream order.
    pub fn for_each_nal(&self, f: impl FnMut(&[u8])) {
        for_each_nal_in(&self.data, f);
    }

    /// Re-derive `kind` from the current bitstream contents.
    pub fn derive_kind(&mut self) {
        self.kind = H264FrameKind::from_bitstream(&self.data);
    }
}

impl fmt::Display for H264Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "H264Frame({:?}, {} bytes, ts={}ns)",
            self.kind,
            self.data.len(),
            self.timestamp_ns
        )
    }
}

/// An encoded AAC frame: raw payload without ADTS framing (the muxer
/// wraps it), plus the carried-over timestamp.
#[derive(Clone, Debug, Default)]
pub struct AacFrame {
    /// Raw AAC payload bytes.
    pub data: Vec<u8>,
    /// Timestamp carried over from the raw frame, in nanoseconds.
    pub timestamp_ns: u64,
}

impl AacFrame {
    /// Reset for reuse by the next encode task.
    pub fn clear(&mut self) {
        self.data.clear();
        self.timestamp_ns = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nal(ty: u8, payload: &[u8]) -> Vec<u8> {
        let mut v = NAL_START_CODE.to_vec();
        v.push(ty);
        v.extend_from_slice(payload);
        v
    }

    #[test]
    fn i420_plane_layout() {
        let buf = I420Buffer::new(4, 4);
        assert_eq!(buf.y().len(), 16);
        assert_eq!(buf.u().len(), 4);
        assert_eq!(buf.v().len(), 4);
        assert_eq!(buf.byte_len(), 24);
    }

    #[test]
    fn i420_planes_mut_are_disjoint_and_sized() {
        let mut buf = I420Buffer::new(4, 2);
        let (y, u, v) = buf.planes_mut();
        assert_eq!(y.len(), 8);
        assert_eq!(u.len(), 2);
        assert_eq!(v.len(), 2);
        y[0] = 1;
        u[0] = 2;
        v[0] = 3;
        assert_eq!(buf.y()[0], 1);
        assert_eq!(buf.u()[0], 2);
        assert_eq!(buf.v()[0], 3);
    }

    #[test]
    fn i420_copy_from_contiguous_checks_length() {
        let mut buf = I420Buffer::new(4, 2);
        assert!(!buf.copy_from_contiguous(&[0u8; 5]));
        let src: Vec<u8> = (0..12).collect();
        assert!(buf.copy_from_contiguous(&src));
        assert_eq!(buf.y(), &src[..8]);
        assert_eq!(buf.u(), &src[8..10]);
        assert_eq!(buf.v(), &src[10..12]);
    }

    #[test]
    fn raw_video_frame_buffer_sizes() {
        let frame = RawVideoFrame::new(8, 4);
        assert_eq!(frame.rgba.len(), 8 * 4 * 4);
        assert_eq!(frame.i420.byte_len(), 32 + 8 + 8);
    }

    #[test]
    fn raw_audio_frame_fill_reuses_allocation() {
        let mut frame = RawAudioFrame::default();
        frame.fill(&[0.5; 256], 42);
        let cap = frame.data.capacity();
        frame.fill(&[0.25; 128], 43);
        assert_eq!(frame.data.len(), 128);
        assert_eq!(frame.data.capacity(), cap);
        assert_eq!(frame.timestamp_ns, 43);
    }

    #[test]
    fn nal_type_classification() {
        assert_eq!(NalUnitType::from_header_byte(0x67), NalUnitType::Sps);
        assert_eq!(NalUnitType::from_header_byte(0x68), NalUnitType::Pps);
        assert_eq!(NalUnitType::from_header_byte(0x65), NalUnitType::Idr);
        assert_eq!(NalUnitType::from_header_byte(0x41), NalUnitType::Slice);
        assert_eq!(NalUnitType::from_header_byte(0x06), NalUnitType::Other(6));
    }

    #[test]
    fn for_each_nal_yields_units_with_start_codes() {
        let mut frame = H264Frame::default();
        frame.data.extend(nal(0x67, &[0xAA, 0xBB]));
        frame.data.extend(nal(0x68, &[0xCC]));
        frame.data.extend(nal(0x65, &[0x01, 0x02, 0x03]));

        let mut units = Vec::new();
        frame.for_each_nal(|n| units.push(n.to_vec()));

        assert_eq!(units.len(), 3);
        assert_eq!(&units[0][..4], &NAL_START_CODE);
        assert_eq!(units[0][4], 0x67);
        assert_eq!(units[1][4], 0x68);
        assert_eq!(units[2], nal(0x65, &[0x01, 0x02, 0x03]));
    }

    #[test]
    fn for_each_nal_single_unit() {
        let mut frame = H264Frame::default();
        frame.data.extend(nal(0x41, &[0xEE; 8]));
        let mut count = 0;
        frame.for_each_nal(|n| {
            count += 1;
            assert_eq!(n.len(), 13);
        });
        assert_eq!(count, 1);
    }

    #[test]
    fn for_each_nal_empty_bitstream() {
        let frame = H264Frame::default();
        let mut count = 0;
        frame.for_each_nal(|_| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn frame_kind_from_bitstream() {
        let mut idr = nal(0x67, &[1]);
        idr.extend(nal(0x68, &[2]));
        idr.extend(nal(0x65, &[3, 4]));
        assert_eq!(H264FrameKind::from_bitstream(&idr), H264FrameKind::I);

        let p = nal(0x41, &[9, 9]);
        assert_eq!(H264FrameKind::from_bitstream(&p), H264FrameKind::P);

        let sps_only = nal(0x67, &[1]);
        assert_eq!(
            H264FrameKind::from_bitstream(&sps_only),
            H264FrameKind::Unknown
        );
    }

    #[test]
    fn h264_frame_clear() {
        let mut frame = H264Frame {
            data: nal(0x65, &[1]),
            kind: H264FrameKind::I,
            timestamp_ns: 99,
        };
        frame.clear();
        assert!(frame.data.is_empty());
        assert_eq!(frame.kind, H264FrameKind::Unknown);
        assert_eq!(frame.timestamp_ns, 0);
    }
}
