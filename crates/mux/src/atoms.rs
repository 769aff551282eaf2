//! Low-level MP4 atom/box writing primitives.
//!
//! MP4 files are structured as nested boxes (atoms). Each box has:
//! - 4-byte big-endian size (includes header)
//! - 4-byte ASCII type (e.g. "ftyp", "moov", "mdat")
//!
//! All multi-byte box fields are big-endian; sample payload bytes are
//! written with no byte swapping.

use byteorder::{BigEndian, WriteBytesExt};
use std::io::{Seek, SeekFrom, Write};

use crate::error::MuxResult;

/// Movie-level timescale (1000 = millisecond precision).
pub const MOVIE_TIMESCALE: u32 = 1000;

/// ISO 639-2/T "und" (undetermined) packed into 3x5 bits.
pub const LANGUAGE_UND: u16 = 0x55C4;

/// Seconds between 1904-01-01 (MP4 epoch) and 1970-01-01 (Unix epoch).
pub const MP4_EPOCH_OFFSET: u64 = 2_082_844_800;

/// Current time as 32-bit seconds since the Mac epoch.
pub fn mac_time() -> u32 {
    let unix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    (unix + MP4_EPOCH_OFFSET) as u32
}

/// Write a box size placeholder (4 bytes of zeros) and return the stream
/// position where the size should be patched later.
///
/// Usage pattern:
/// ```ignore
/// let pos = box_size_placeholder(&mut writer)?;
/// writer.write_all(b"moov")?;
/// // ... write box content ...
/// fill_box_size(&mut writer, pos)?;
/// ```
pub fn box_size_placeholder<W: Write + Seek>(writer: &mut W) -> MuxResult<u64> {
    let pos = writer.stream_position()?;
    writer.write_u32::<BigEndian>(0)?; // placeholder
    Ok(pos)
}

/// Patch the box size at the given position with the actual size
/// (from `pos` to current position).
pub fn fill_box_size<W: Write + Seek>(writer: &mut W, size_pos: u64) -> MuxResult<()> {
    let current = writer.stream_position()?;
    let size = current - size_pos;
    writer.seek(SeekFrom::Start(size_pos))?;
    writer.write_u32::<BigEndian>(size as u32)?;
    writer.seek(SeekFrom::Start(current))?;
    Ok(())
}

/// Write a 64-bit large-size box header (size field = 1, followed by the
/// type and an 8-byte extended size placeholder). Returns the position of
/// the extended size field.
pub fn large_box_size_placeholder<W: Write + Seek>(
    writer: &mut W,
    box_type: &[u8; 4],
) -> MuxResult<u64> {
    writer.write_u32::<BigEndian>(1)?; // size=1 signals extended size
    writer.write_all(box_type)?;
    let size_pos = writer.stream_position()?;
    writer.write_u64::<BigEndian>(0)?; // placeholder for extended size
    Ok(size_pos)
}

/// Overwrite the 8-byte extended size field at `size_pos` with `size`,
/// restoring the current position afterwards.
pub fn patch_large_box_size<W: Write + Seek>(
    writer: &mut W,
    size_pos: u64,
    size: u64,
) -> MuxResult<()> {
    let current = writer.stream_position()?;
    writer.seek(SeekFrom::Start(size_pos))?;
    writer.write_u64::<BigEndian>(size)?;
    writer.seek(SeekFrom::Start(current))?;
    Ok(())
}

/// Write zero padding bytes.
pub fn write_zeros<W: Write>(writer: &mut W, count: usize) -> MuxResult<()> {
    let zeros = [0u8; 36];
    let mut remaining = count;
    while remaining > 0 {
        let n = remaining.min(zeros.len());
        writer.write_all(&zeros[..n])?;
        remaining -= n;
    }
    Ok(())
}

/// Write the identity display matrix used in `mvhd` and every `tkhd`:
/// `(1,0,0, 0,1,0, 0,0,16384.0)` as 9 big-endian u32 values.
pub fn write_matrix<W: Write>(writer: &mut W) -> MuxResult<()> {
    const MATRIX: [u32; 9] = [
        0x0001_0000, 0, 0, //
        0, 0x0001_0000, 0, //
        0, 0, 0x4000_0000,
    ];
    for v in MATRIX {
        writer.write_u32::<BigEndian>(v)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn box_size_placeholder_and_fill() {
        let mut cursor = Cursor::new(Vec::new());
        let pos = box_size_placeholder(&mut cursor).unwrap();
        assert_eq!(pos, 0);

        cursor.write_all(b"moov").unwrap();
        cursor.write_all(&[0xAA; 20]).unwrap();

        fill_box_size(&mut cursor, pos).unwrap();

        let buf = cursor.into_inner();
        // Total size = 4 (size) + 4 (type) + 20 (content) = 28 bytes
        assert_eq!(buf.len(), 28);
        assert_eq!(&buf[0..4], &[0x00, 0x00, 0x00, 28]);
        assert_eq!(&buf[4..8], b"moov");
    }

    #[test]
    fn fill_box_size_restores_position() {
        let mut cursor = Cursor::new(Vec::new());
        let pos = box_size_placeholder(&mut cursor).unwrap();
        cursor.write_all(b"trak").unwrap();
        fill_box_size(&mut cursor, pos).unwrap();
        assert_eq!(cursor.stream_position().unwrap(), 8);
    }

    #[test]
    fn large_box_header_layout() {
        let mut cursor = Cursor::new(Vec::new());
        let size_pos = large_box_size_placeholder(&mut cursor, b"mdat").unwrap();
        assert_eq!(size_pos, 8);

        cursor.write_all(&[0xBB; 32]).unwrap();
        patch_large_box_size(&mut cursor, size_pos, 48).unwrap();

        let buf = cursor.into_inner();
        assert_eq!(buf.len(), 48);
        // size field = 1 (signals extended size)
        assert_eq!(&buf[0..4], &[0x00, 0x00, 0x00, 0x01]);
        assert_eq!(&buf[4..8], b"mdat");
        let extended = u64::from_be_bytes(buf[8..16].try_into().unwrap());
        assert_eq!(extended, 48);
    }

    #[test]
    fn patch_large_box_size_restores_position() {
        let mut cursor = Cursor::new(Vec::new());
        let size_pos = large_box_size_placeholder(&mut cursor, b"mdat").unwrap();
        cursor.write_all(&[0; 8]).unwrap();
        let end = cursor.stream_position().unwrap();
        patch_large_box_size(&mut cursor, size_pos, 24).unwrap();
        assert_eq!(cursor.stream_position().unwrap(), end);
    }

    #[test]
    fn matrix_encoding() {
        let mut buf = Vec::new();
        write_matrix(&mut buf).unwrap();
        assert_eq!(buf.len(), 36);
        assert_eq!(&buf[0..4], &[0x00, 0x01, 0x00, 0x00]);
        assert_eq!(&buf[16..20], &[0x00, 0x01, 0x00, 0x00]);
        assert_eq!(&buf[32..36], &[0x40, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn zeros_of_arbitrary_length() {
        let mut buf = Vec::new();
        write_zeros(&mut buf, 100).unwrap();
        assert_eq!(buf, vec![0u8; 100]);
    }

    #[test]
    fn language_und_constant() {
        // u=0x15, n=0x0E, d=0x04 -> (0x15 << 10) | (0x0E << 5) | 0x04
        assert_eq!(LANGUAGE_UND, (0x15 << 10) | (0x0E << 5) | 0x04);
    }

    #[test]
    fn mac_time_is_after_epoch_offset() {
        assert!(u64::from(mac_time()) > MP4_EPOCH_OFFSET);
    }
}
