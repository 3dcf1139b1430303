//! Image file output and input
//!
//! TIFF and TGA are written by hand so the bytes are stable across versions.
//! PNG and JPEG go through the `image` crate.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use log::{debug, error};

use super::pixel_buffer::PixelBuffer;
use super::{Format, ALPHA_MASK};
use crate::error::{ImageError, ImageResult};

const TIFF_HEADER_LEN: usize = 768;
const TGA_HEADER_LEN: usize = 18;
const TGA_MAX_CHUNK: usize = 128;

/// Fixed part of the TIFF header; everything past it up to 768 bytes is zero
#[rustfmt::skip]
const TIFF_HEADER: [u8; 128] = [
    77, 77, 0, 42, 0, 0, 0, 8, 0, 9, 0, 254, 0, 4, 0, 0, 0, 1, 0, 0,
    0, 0, 1, 0, 0, 3, 0, 0, 0, 1, 0, 0, 0, 0, 1, 1, 0, 3, 0, 0, 0, 1,
    0, 0, 0, 0, 1, 2, 0, 3, 0, 0, 0, 3, 0, 0, 0, 122, 1, 6, 0, 3, 0,
    0, 0, 1, 0, 2, 0, 0, 1, 17, 0, 4, 0, 0, 0, 1, 0, 0, 3, 0, 1, 21,
    0, 3, 0, 0, 0, 1, 0, 3, 0, 0, 1, 22, 0, 3, 0, 0, 0, 1, 0, 0, 0, 0,
    1, 23, 0, 4, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 8, 0, 8, 0, 8,
];

/// Header offsets that carry width, height and byte count
const TIFF_VARIABLE: [usize; 10] = [30, 31, 42, 43, 102, 103, 114, 115, 116, 117];

/// Output encodings supported by [`PixelBuffer::save`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Tiff,
    Tga,
    Png,
    Jpeg,
}

impl ImageKind {
    /// Pick an encoding from a file name. Unknown or missing extensions
    /// fall back to TIFF with `.tif` appended to the path.
    pub fn for_path(path: &Path) -> (ImageKind, PathBuf) {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" => (ImageKind::Jpeg, path.to_path_buf()),
            "png" => (ImageKind::Png, path.to_path_buf()),
            "tga" => (ImageKind::Tga, path.to_path_buf()),
            "tif" | "tiff" => (ImageKind::Tiff, path.to_path_buf()),
            _ => {
                let mut name = path.as_os_str().to_os_string();
                name.push(".tif");
                (ImageKind::Tiff, PathBuf::from(name))
            },
        }
    }
}

// ============================================================================
// Saving
// ============================================================================

impl PixelBuffer {
    /// Write the image to `path`, choosing the encoding by extension.
    /// Returns the path actually written, which gains `.tif` when the
    /// extension is not recognised.
    pub fn save(&self, path: impl AsRef<Path>) -> ImageResult<PathBuf> {
        let (kind, path) = ImageKind::for_path(path.as_ref());
        let result = File::create(&path).map_err(ImageError::from).and_then(|file| {
            let mut out = BufWriter::with_capacity(16 * 1024, file);
            self.save_to(&mut out, kind)?;
            out.flush()?;
            Ok(())
        });
        match result {
            Ok(()) => {
                debug!("Saved {:?} image to {}", kind, path.display());
                Ok(path)
            },
            Err(e) => {
                error!("Could not write the image to {}: {}", path.display(), e);
                Err(e)
            },
        }
    }

    /// Encode the image into `out`
    pub fn save_to<W: Write>(&self, out: &mut W, kind: ImageKind) -> ImageResult<()> {
        match kind {
            ImageKind::Tiff => self.write_tiff(out),
            ImageKind::Tga => self.write_tga(out),
            ImageKind::Png => {
                let bytes = self.to_rgba_bytes();
                PngEncoder::new(out).write_image(&bytes, self.pixel_width, self.pixel_height, ExtendedColorType::Rgba8)?;
                Ok(())
            },
            ImageKind::Jpeg => {
                let bytes: Vec<u8> = self
                    .pixels
                    .iter()
                    .flat_map(|&p| [(p >> 16) as u8, (p >> 8) as u8, p as u8])
                    .collect();
                JpegEncoder::new_with_quality(out, 100).write_image(
                    &bytes,
                    self.pixel_width,
                    self.pixel_height,
                    ExtendedColorType::Rgb8,
                )?;
                Ok(())
            },
        }
    }

    /// RGBA byte order as the encoders expect; RGB and ALPHA are expanded
    fn to_rgba_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for &p in &self.pixels {
            let p = match self.format {
                Format::Rgb => p | ALPHA_MASK,
                Format::Argb => p,
                Format::Alpha => (p << 24) | 0x00FF_FFFF,
            };
            bytes.extend_from_slice(&[(p >> 16) as u8, (p >> 8) as u8, p as u8, (p >> 24) as u8]);
        }
        bytes
    }

    /// Uncompressed big-endian RGB TIFF; alpha is dropped
    fn write_tiff<W: Write>(&self, out: &mut W) -> ImageResult<()> {
        let width = self.pixel_width;
        let height = self.pixel_height;
        let count = width * height * 3;

        let mut header = [0u8; TIFF_HEADER_LEN];
        header[..TIFF_HEADER.len()].copy_from_slice(&TIFF_HEADER);
        header[30] = (width >> 8) as u8;
        header[31] = width as u8;
        header[42] = (height >> 8) as u8;
        header[43] = height as u8;
        header[102] = header[42];
        header[103] = header[43];
        header[114..118].copy_from_slice(&count.to_be_bytes());
        out.write_all(&header)?;

        let mut body = Vec::with_capacity(count as usize);
        for &p in &self.pixels {
            body.extend_from_slice(&[(p >> 16) as u8, (p >> 8) as u8, p as u8]);
        }
        out.write_all(&body)?;
        Ok(())
    }

    /// RLE-compressed TGA with a top-left origin.
    /// ALPHA writes 8-bit grayscale from the low byte, RGB 24-bit, ARGB 32-bit.
    fn write_tga<W: Write>(&self, out: &mut W) -> ImageResult<()> {
        let mut header = [0u8; TGA_HEADER_LEN];
        let (image_type, depth, descriptor) = match self.format {
            Format::Alpha => (0x0B, 8, 0x28),
            Format::Rgb => (0x0A, 24, 0x20),
            Format::Argb => (0x0A, 32, 0x28),
        };
        header[2] = image_type;
        header[16] = depth;
        header[17] = descriptor;
        header[12..14].copy_from_slice(&(self.pixel_width as u16).to_le_bytes());
        header[14..16].copy_from_slice(&(self.pixel_height as u16).to_le_bytes());

        let values: Vec<u32> = match self.format {
            Format::Alpha => self.pixels.iter().map(|p| p & 0xFF).collect(),
            _ => self.pixels.clone(),
        };
        let format = self.format;
        let mut body = Vec::with_capacity(values.len() * 4);
        for chunk in tga_chunks(&values) {
            match chunk {
                TgaChunk::Run { len, value } => {
                    body.push(0x80 | (len - 1) as u8);
                    push_tga_pixel(&mut body, value, format);
                },
                TgaChunk::Raw { start, len } => {
                    body.push((len - 1) as u8);
                    for &value in &values[start..start + len] {
                        push_tga_pixel(&mut body, value, format);
                    }
                },
            }
        }

        out.write_all(&header)?;
        out.write_all(&body)?;
        Ok(())
    }
}

#[inline]
fn push_tga_pixel(body: &mut Vec<u8>, value: u32, format: Format) {
    match format {
        Format::Alpha => body.push(value as u8),
        Format::Rgb => body.extend_from_slice(&[value as u8, (value >> 8) as u8, (value >> 16) as u8]),
        Format::Argb => body.extend_from_slice(&[
            value as u8,
            (value >> 8) as u8,
            (value >> 16) as u8,
            (value >> 24) as u8,
        ]),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum TgaChunk {
    Run { len: usize, value: u32 },
    Raw { start: usize, len: usize },
}

/// Split pixels into RLE packets of at most 128.
///
/// A run is only emitted when a different value (or the 128 limit) ends it;
/// a repeat that reaches the end of the image goes out as a raw packet. Raw
/// packets take at least three pixels when available and stop two short of a
/// repeat so the repeat can start a run.
fn tga_chunks(values: &[u32]) -> Vec<TgaChunk> {
    let len = values.len();
    let mut chunks = Vec::new();
    let mut index = 0;

    while index < len {
        let mut col = values[index];
        let mut rle = 1;
        let mut is_run = false;
        while index + rle < len {
            if col != values[index + rle] || rle == TGA_MAX_CHUNK {
                is_run = rle > 1;
                break;
            }
            rle += 1;
        }

        if is_run {
            chunks.push(TgaChunk::Run { len: rle, value: col });
        } else {
            rle = 1;
            while index + rle < len {
                let scan = values[index + rle];
                if (col != scan && rle < TGA_MAX_CHUNK) || rle < 3 {
                    col = scan;
                } else {
                    if col == scan {
                        rle -= 2;
                    }
                    break;
                }
                rle += 1;
            }
            chunks.push(TgaChunk::Raw { start: index, len: rle });
        }
        index += rle;
    }
    chunks
}

// ============================================================================
// Loading
// ============================================================================

/// Read a TIFF produced by [`PixelBuffer::save`]. Anything else is rejected.
pub fn load_tiff(tiff: &[u8]) -> ImageResult<PixelBuffer> {
    if tiff.len() < TIFF_HEADER_LEN {
        return Err(ImageError::UnsupportedTiff(format!("only {} bytes", tiff.len())));
    }
    if tiff[42] != tiff[102] || tiff[43] != tiff[103] {
        return Err(ImageError::UnsupportedTiff("height fields disagree".to_string()));
    }

    let width = u32::from(u16::from_be_bytes([tiff[30], tiff[31]]));
    let height = u32::from(u16::from_be_bytes([tiff[42], tiff[43]]));
    let count = u32::from_be_bytes([tiff[114], tiff[115], tiff[116], tiff[117]]);
    if count != width * height * 3 {
        return Err(ImageError::UnsupportedTiff(format!("{}x{}", width, height)));
    }

    for (i, (&actual, &expected)) in tiff.iter().zip(TIFF_HEADER.iter()).enumerate() {
        if !TIFF_VARIABLE.contains(&i) && actual != expected {
            return Err(ImageError::UnsupportedTiff(format!("header byte {}", i)));
        }
    }

    let data = &tiff[TIFF_HEADER_LEN..];
    if data.len() < count as usize {
        return Err(ImageError::UnsupportedTiff(format!("truncated at {} bytes", tiff.len())));
    }
    let pixels = data
        .chunks_exact(3)
        .take((width * height) as usize)
        .map(|c| ALPHA_MASK | (u32::from(c[0]) << 16) | (u32::from(c[1]) << 8) | u32::from(c[2]))
        .collect();
    PixelBuffer::from_pixels(width, height, Format::Rgb, pixels)
}

/// Decode an encoded image. TIFFs written by this crate are read directly,
/// everything else goes through the `image` crate.
pub fn decode(bytes: &[u8]) -> ImageResult<PixelBuffer> {
    if bytes.len() >= TIFF_HEADER_LEN && bytes[..4] == TIFF_HEADER[..4] {
        return load_tiff(bytes);
    }

    let decoded = image::load_from_memory(bytes)?;
    let format = if decoded.color().has_alpha() {
        Format::Argb
    } else {
        Format::Rgb
    };
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    let pixels = rgba
        .pixels()
        .map(|px| {
            let [r, g, b, a] = px.0;
            super::argb(a, r, g, b)
        })
        .collect();
    PixelBuffer::from_pixels(width, height, format, pixels)
}
