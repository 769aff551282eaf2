//! RGBA→I420 color conversion.
//!
//! Delegates to `dcv-color-primitives`, matching the BT.601 limited-range
//! conversion the capture surfaces produce. The converter keeps process
//! state that must be initialized once before the first conversion;
//! [`Runtime::new`](crate::Runtime::new) takes care of that.

use dcv_color_primitives as dcp;

use fc_common::I420Buffer;

use crate::error::CaptureError;

/// One-time converter initialization. Safe to call repeatedly.
pub fn initialize_converter() {
    dcp::initialize();
}

/// Convert a 4-byte-per-pixel RGBA buffer into the I420 planes of `dst`.
///
/// `src` must hold exactly `4 × width × height` bytes for the geometry of
/// `dst`.
pub fn rgba_to_i420(src: &[u8], dst: &mut I420Buffer) -> Result<(), CaptureError> {
    let width = dst.width();
    let height = dst.height();

    let src_format = dcp::ImageFormat {
        pixel_format: dcp::PixelFormat::Bgra,
        color_space: dcp::ColorSpace::Lrgb,
        num_planes: 1,
    };
    let dst_format = dcp::ImageFormat {
        pixel_format: dcp::PixelFormat::I420,
        color_space: dcp::ColorSpace::Bt601,
        num_planes: 3,
    };

    let (y, u, v) = dst.planes_mut();
    dcp::convert_image(
        width,
        height,
        &src_format,
        None,
        &[src],
        &dst_format,
        None,
        &mut [y, u, v],
    )
    .map_err(|e| CaptureError::Convert(format!("{e:?}")))
}
