//! Bitmap container and compositing engine
//!
//! Pixels are packed `0xAARRGGBB` words, row-major. All arithmetic is integer
//! and bit-exact; see `blend` for the mode formulas and `resample` for the
//! fixed-point bilinear blitter that drives `blend()`/`copy()`/`resize()`.

mod blend;
mod codec;
mod filter;
mod pixel_buffer;
mod resample;

pub use blend::{blend_color, BlendMode};
pub use codec::{decode, load_tiff, ImageKind};
pub use filter::Filter;
pub use pixel_buffer::{DirtyRegion, PixelBuffer};

pub const ALPHA_MASK: u32 = 0xFF00_0000;
pub const RED_MASK: u32 = 0x00FF_0000;
pub const GREEN_MASK: u32 = 0x0000_FF00;
pub const BLUE_MASK: u32 = 0x0000_00FF;
pub const RGB_MASK: u32 = 0x00FF_FFFF;

/// Storage format of a [`PixelBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// Opaque color; the alpha byte is always 0xFF
    Rgb,
    /// Color with straight alpha
    #[default]
    Argb,
    /// One byte per pixel in the low bits, read back as white with that alpha
    Alpha,
}

/// Pack four channels into an ARGB word
#[inline]
pub fn argb(a: u8, r: u8, g: u8, b: u8) -> u32 {
    (u32::from(a) << 24) | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

/// Unpack an ARGB word into `(a, r, g, b)`
#[inline]
pub fn channels(c: u32) -> (u8, u8, u8, u8) {
    ((c >> 24) as u8, (c >> 16) as u8, (c >> 8) as u8, c as u8)
}
