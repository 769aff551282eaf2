//! AAC encoder backed by the FAAC shared library.
//!
//! FAAC consumes fixed-size blocks of `input_samples` samples per call, so
//! the wrapper keeps a pending buffer and encodes as many full blocks as
//! the caller's data covers. The raw (ADTS-less) output format is selected
//! because the MP4 writer supplies the framing.

use std::ffi::{c_char, c_int, c_uint, c_ulong, c_void};
use std::path::Path;
use std::sync::Arc;

use libloading::Library;
use tracing::debug;

use fc_common::{AacFrame, CodecLoadError, EncodeError};

use super::{AacEncoder, AacEncoderConfig};

// ---------------------------------------------------------------------------
// FFI surface (subset of faac.h)
// ---------------------------------------------------------------------------

type FaacEncHandle = *mut c_void;

const MPEG4: c_uint = 0;
const AAC_OBJECT_LOW: c_uint = 2;
const FAAC_INPUT_FLOAT: c_uint = 4;
const OUTPUT_FORMAT_RAW: c_uint = 0;

#[repr(C)]
struct FaacEncConfiguration {
    version: c_int,
    name: *mut c_char,
    copyright: *mut c_char,
    mpeg_version: c_uint,
    aac_object_type: c_uint,
    allow_midside: c_uint,
    use_lfe: c_uint,
    use_tns: c_uint,
    bit_rate: c_ulong,
    band_width: c_uint,
    quant_qual: c_ulong,
    output_format: c_uint,
    psymodellist: *mut c_void,
    psymodelidx: c_uint,
    input_format: c_uint,
    shortctl: c_int,
    channel_map: [c_int; 64],
}

type EncOpenFn =
    unsafe extern "C" fn(c_ulong, c_uint, *mut c_ulong, *mut c_ulong) -> FaacEncHandle;
type GetConfigurationFn = unsafe extern "C" fn(FaacEncHandle) -> *mut FaacEncConfiguration;
type SetConfigurationFn = unsafe extern "C" fn(FaacEncHandle, *mut FaacEncConfiguration) -> c_int;
type GetDecoderSpecificInfoFn =
    unsafe extern "C" fn(FaacEncHandle, *mut *mut u8, *mut c_ulong) -> c_int;
type EncodeFn = unsafe extern "C" fn(FaacEncHandle, *mut i32, c_uint, *mut u8, c_uint) -> c_int;
type CloseFn = unsafe extern "C" fn(FaacEncHandle) -> c_int;

// ---------------------------------------------------------------------------
// Library handle
// ---------------------------------------------------------------------------

#[cfg(target_os = "windows")]
const LIBRARY_CANDIDATES: &[&str] = &["libfaac.dll", "faac.dll"];
#[cfg(target_os = "macos")]
const LIBRARY_CANDIDATES: &[&str] = &["libfaac.dylib"];
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const LIBRARY_CANDIDATES: &[&str] = &["libfaac.so", "libfaac.so.0"];

/// A loaded FAAC shared library.
pub struct FaacLibrary {
    _lib: Library,
    open: EncOpenFn,
    get_configuration: GetConfigurationFn,
    set_configuration: SetConfigurationFn,
    get_decoder_specific_info: GetDecoderSpecificInfoFn,
    encode: EncodeFn,
    close: CloseFn,
}

// SAFETY: only immutable function pointers; encoder handles are owned by
// single threads.
unsafe impl Send for FaacLibrary {}
unsafe impl Sync for FaacLibrary {}

impl std::fmt::Debug for FaacLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaacLibrary").finish_non_exhaustive()
    }
}

impl FaacLibrary {
    /// Load the library, searching `dir` when given and the system loader
    /// paths otherwise.
    pub fn load(dir: Option<&Path>) -> Result<Self, CodecLoadError> {
        let mut last_err = String::new();
        for name in LIBRARY_CANDIDATES {
            let lib = match dir {
                Some(d) => unsafe { Library::new(d.join(name)) },
                None => unsafe { Library::new(name) },
            };
            match lib {
                Ok(lib) => return Self::resolve(lib),
                Err(e) => last_err = format!("{name}: {e}"),
            }
        }
        Err(CodecLoadError::LibraryNotFound(last_err))
    }

    fn resolve(lib: Library) -> Result<Self, CodecLoadError> {
        fn sym<T: Copy>(lib: &Library, name: &[u8]) -> Result<T, CodecLoadError> {
            unsafe { lib.get::<T>(name) }.map(|s| *s).map_err(|e| {
                CodecLoadError::SymbolNotFound(format!(
                    "{}: {e}",
                    String::from_utf8_lossy(&name[..name.len() - 1])
                ))
            })
        }

        let loaded = Self {
            open: sym::<EncOpenFn>(&lib, b"faacEncOpen\0")?,
            get_configuration: sym::<GetConfigurationFn>(
                &lib,
                b"faacEncGetCurrentConfiguration\0",
            )?,
            set_configuration: sym::<SetConfigurationFn>(&lib, b"faacEncSetConfiguration\0")?,
            get_decoder_specific_info: sym::<GetDecoderSpecificInfoFn>(
                &lib,
                b"faacEncGetDecoderSpecificInfo\0",
            )?,
            encode: sym::<EncodeFn>(&lib, b"faacEncEncode\0")?,
            close: sym::<CloseFn>(&lib, b"faacEncClose\0")?,
            _lib: lib,
        };
        debug!("FAAC library loaded");
        Ok(loaded)
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// One FAAC encoder instance.
pub struct FaacEncoder {
    lib: Arc<FaacLibrary>,
    handle: FaacEncHandle,
    /// Samples FAAC expects per encode call.
    input_samples: usize,
    /// Output buffer sized to FAAC's reported maximum.
    out_buf: Vec<u8>,
    /// Input not yet covering a full block.
    pending: Vec<f32>,
    /// AudioSpecificConfig captured at construction.
    header: Vec<u8>,
}

// SAFETY: the handle is only touched through &mut self on the owning
// worker thread.
unsafe impl Send for FaacEncoder {}

impl FaacEncoder {
    pub fn new(lib: Arc<FaacLibrary>, config: &AacEncoderConfig) -> Result<Self, EncodeError> {
        let mut input_samples: c_ulong = 0;
        let mut max_output_bytes: c_ulong = 0;
        let handle = unsafe {
            (lib.open)(
                c_ulong::from(config.sample_rate),
                config.num_channels as c_uint,
                &mut input_samples,
                &mut max_output_bytes,
            )
        };
        if handle.is_null() {
            return Err(EncodeError::InitFailed(
                "faacEncOpen returned null".to_string(),
            ));
        }

        unsafe {
            let cfg = (lib.get_configuration)(handle);
            if cfg.is_null() {
                (lib.close)(handle);
                return Err(EncodeError::InitFailed(
                    "faacEncGetCurrentConfiguration returned null".to_string(),
                ));
            }
            (*cfg).mpeg_version = MPEG4;
            (*cfg).aac_object_type = AAC_OBJECT_LOW;
            (*cfg).input_format = FAAC_INPUT_FLOAT;
            (*cfg).output_format = OUTPUT_FORMAT_RAW;
            (*cfg).bit_rate = c_ulong::from(config.target_bitrate)
                / c_ulong::from(config.num_channels.max(1));
            if (lib.set_configuration)(handle, cfg) == 0 {
                (lib.close)(handle);
                return Err(EncodeError::InitFailed(
                    "faacEncSetConfiguration rejected the configuration".to_string(),
                ));
            }
        }

        // AudioSpecificConfig; FAAC hands out a malloc'd buffer that stays
        // valid for the life of the handle.
        let mut header = Vec::new();
        unsafe {
            let mut ptr: *mut u8 = std::ptr::null_mut();
            let mut len: c_ulong = 0;
            if (lib.get_decoder_specific_info)(handle, &mut ptr, &mut len) == 0 && !ptr.is_null() {
                header.extend_from_slice(std::slice::from_raw_parts(ptr, len as usize));
            }
        }

        Ok(Self {
            lib,
            handle,
            input_samples: input_samples as usize,
            out_buf: vec![0u8; max_output_bytes as usize],
            pending: Vec::new(),
            header,
        })
    }

    /// Run one faacEncEncode call over `samples` (may be empty to drain)
    /// and append any produced bytes to `dst`.
    fn encode_block(&mut self, samples: &[f32], dst: &mut AacFrame) -> Result<bool, EncodeError> {
        let produced = unsafe {
            (self.lib.encode)(
                self.handle,
                // with FAAC_INPUT_FLOAT the input is f32 despite the
                // int32 pointer in the C signature
                samples.as_ptr() as *mut i32,
                samples.len() as c_uint,
                self.out_buf.as_mut_ptr(),
                self.out_buf.len() as c_uint,
            )
        };
        if produced < 0 {
            return Err(EncodeError::EncodeFailed(format!(
                "faacEncEncode returned {produced}"
            )));
        }
        dst.data.extend_from_slice(&self.out_buf[..produced as usize]);
        Ok(produced > 0)
    }
}

impl AacEncoder for FaacEncoder {
    fn header(&self) -> &[u8] {
        &self.header
    }

    fn encode(&mut self, dst: &mut AacFrame, samples: &[f32]) -> Result<(), EncodeError> {
        dst.clear();

        if samples.is_empty() {
            // flush: a trailing partial block, then drain the codec
            if !self.pending.is_empty() {
                let tail = std::mem::take(&mut self.pending);
                self.encode_block(&tail, dst)?;
            }
            while self.encode_block(&[], dst)? {}
            return Ok(());
        }

        self.pending.extend_from_slice(samples);
        while self.pending.len() >= self.input_samples {
            let block: Vec<f32> = self.pending.drain(..self.input_samples).collect();
            self.encode_block(&block, dst)?;
        }
        Ok(())
    }
}

impl Drop for FaacEncoder {
    fn drop(&mut self) {
        unsafe {
            (self.lib.close)(self.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_from_missing_dir_fails() {
        let result = FaacLibrary::load(Some(Path::new("/nonexistent/codec/dir")));
        assert!(matches!(result, Err(CodecLoadError::LibraryNotFound(_))));
    }
}
