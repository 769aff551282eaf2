//! Graphics device abstraction.
//!
//! The capture core never talks to a GPU API directly; the embedder hands
//! it an object implementing [`GraphicsDevice`] that can copy texture
//! contents into (and out of) host memory. Readback failures are soft:
//! the frame is returned to the pool and the submission reports `false`.

use crate::error::GpuError;

/// Opaque texture handle as passed across the embedding boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Pixel layout of texture transfers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    /// 8-bit RGBA, 4 bytes per pixel.
    Rgba8,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
        }
    }
}

/// Host-side view of the embedder's graphics device.
pub trait GraphicsDevice: Send + Sync {
    /// Copy the contents of `tex` into `dst`.
    ///
    /// `dst` must hold `width × height × bytes_per_pixel` bytes.
    fn read_texture(
        &self,
        dst: &mut [u8],
        tex: TextureHandle,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<(), GpuError>;

    /// Upload `src` into `tex`.
    fn write_texture(
        &self,
        tex: TextureHandle,
        width: u32,
        height: u32,
        format: TextureFormat,
        src: &[u8],
    ) -> Result<(), GpuError>;
}
