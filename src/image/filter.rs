//! Single-image filters
//!
//! All filters run in place over the backing store and mark the whole image
//! dirty when done.

use log::trace;

use super::pixel_buffer::PixelBuffer;
use super::{Format, ALPHA_MASK, BLUE_MASK, GREEN_MASK, RED_MASK, RGB_MASK};
use crate::error::{ImageError, ImageResult};

const MAX_BLUR_RADIUS: i32 = 248;

/// Filter kinds accepted by [`PixelBuffer::filter`] and [`PixelBuffer::filter_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    /// Gaussian-style blur; parameter is the radius (default 1)
    Blur,
    /// Luminance grayscale, alpha kept
    Gray,
    /// Invert color channels, alpha kept
    Invert,
    /// Reduce each channel to N levels; parameter required (2..=255)
    Posterize,
    /// Black or white by brightest channel; parameter is the cutoff (default 0.5)
    Threshold,
    /// Force full alpha and switch to RGB
    Opaque,
    /// Replace each pixel with its brightest 4-neighbour
    Erode,
    /// Replace each pixel with its darkest 4-neighbour
    Dilate,
}

impl Filter {
    pub fn name(self) -> &'static str {
        match self {
            Filter::Blur => "BLUR",
            Filter::Gray => "GRAY",
            Filter::Invert => "INVERT",
            Filter::Posterize => "POSTERIZE",
            Filter::Threshold => "THRESHOLD",
            Filter::Opaque => "OPAQUE",
            Filter::Erode => "ERODE",
            Filter::Dilate => "DILATE",
        }
    }
}

// ============================================================================
// Blur kernel
// ============================================================================

/// Triangular blur kernel plus a per-value multiplication table.
/// Rebuilt only when the effective radius changes.
#[derive(Debug, Clone)]
pub(crate) struct BlurKernel {
    radius: usize,
    weights: Vec<u32>,
    mult: Vec<[u32; 256]>,
}

impl BlurKernel {
    /// Effective radius for a requested blur amount
    pub fn radius_for(r: f32) -> usize {
        ((r * 3.5) as i32).clamp(1, MAX_BLUR_RADIUS) as usize
    }

    fn build(radius: usize) -> Self {
        let size = 1 + 2 * radius;
        let mut weights = vec![0u32; size];
        let mut mult = vec![[0u32; 256]; size];

        // Entries at distance `radius` stay zero
        for i in 1..radius {
            let k = ((radius - i) * (radius - i)) as u32;
            weights[radius + i] = k;
            weights[radius - i] = k;
        }
        weights[radius] = (radius * radius) as u32;

        for (row, &k) in mult.iter_mut().zip(&weights) {
            for (j, m) in row.iter_mut().enumerate() {
                *m = k * j as u32;
            }
        }

        Self {
            radius,
            weights,
            mult,
        }
    }

    #[inline]
    pub fn radius(&self) -> usize {
        self.radius
    }

    #[inline]
    pub fn weights(&self) -> &[u32] {
        &self.weights
    }
}

/// Channels a blur pass touches, by format
#[derive(Clone, Copy)]
enum BlurChannels {
    Low,
    Color,
    ColorAlpha,
}

impl BlurChannels {
    fn shifts(self) -> &'static [u32] {
        match self {
            BlurChannels::Low => &[0],
            BlurChannels::Color => &[16, 8, 0],
            BlurChannels::ColorAlpha => &[24, 16, 8, 0],
        }
    }
}

/// Two-pass separable blur with kernel normalisation at the edges
fn blur_pass(pixels: &mut [u32], width: usize, height: usize, kernel: &BlurKernel, channels: BlurChannels) {
    let radius = kernel.radius as isize;
    let size = kernel.weights.len();
    let shifts = channels.shifts();
    let count = shifts.len();

    // Horizontal: pixels -> planes (one plane per channel)
    let mut planes = vec![0u32; pixels.len() * count];
    for y in 0..height {
        let row = y * width;
        for x in 0..width {
            let start = x as isize - radius;
            let (k0, mut read) = if start < 0 { ((-start) as usize, 0) } else { (0, start as usize) };

            let mut sums = [0u64; 4];
            let mut weight = 0u64;
            for k in k0..size {
                if read >= width {
                    break;
                }
                let c = pixels[row + read];
                for (sum, &shift) in sums.iter_mut().zip(shifts) {
                    *sum += u64::from(kernel.mult[k][((c >> shift) & 0xFF) as usize]);
                }
                weight += u64::from(kernel.weights[k]);
                read += 1;
            }
            for (ch, sum) in sums.iter().take(count).enumerate() {
                planes[ch * pixels.len() + row + x] = (sum / weight) as u32;
            }
        }
    }

    // Vertical: planes -> pixels
    for y in 0..height {
        let start = y as isize - radius;
        let (k0, first_row) = if start < 0 { ((-start) as usize, 0) } else { (0, start as usize) };
        for x in 0..width {
            let mut sums = [0u64; 4];
            let mut weight = 0u64;
            let mut ri = first_row;
            for k in k0..size {
                if ri >= height {
                    break;
                }
                let idx = ri * width + x;
                for (ch, sum) in sums.iter_mut().take(count).enumerate() {
                    *sum += u64::from(kernel.mult[k][planes[ch * pixels.len() + idx] as usize]);
                }
                weight += u64::from(kernel.weights[k]);
                ri += 1;
            }

            let mut out = match channels {
                BlurChannels::Low => 0,
                BlurChannels::Color => ALPHA_MASK,
                BlurChannels::ColorAlpha => 0,
            };
            for (&shift, sum) in shifts.iter().zip(sums) {
                out |= ((sum / weight) as u32) << shift;
            }
            pixels[y * width + x] = out;
        }
    }
}

// ============================================================================
// Per-pixel helpers
// ============================================================================

/// Unshifted luminance, 77R + 151G + 28B
#[inline]
fn luminance(c: u32) -> u32 {
    77 * ((c >> 16) & 0xFF) + 151 * ((c >> 8) & 0xFF) + 28 * (c & 0xFF)
}

#[inline]
fn posterize_channel(v: u32, levels: u32) -> u32 {
    (((v * levels) >> 8) * 255) / (levels - 1)
}

// ============================================================================
// Filters
// ============================================================================

impl PixelBuffer {
    /// Apply a parameterless filter.
    /// `Blur` uses radius 1 and `Threshold` a cutoff of 0.5.
    pub fn filter(&mut self, kind: Filter) -> ImageResult<()> {
        match kind {
            Filter::Blur => return self.filter_with(Filter::Blur, 1.0),
            Filter::Threshold => return self.filter_with(Filter::Threshold, 0.5),
            Filter::Posterize => return Err(ImageError::MissingFilterParam(kind.name())),
            Filter::Gray => self.gray(),
            Filter::Invert => {
                for p in &mut self.pixels {
                    *p ^= RGB_MASK;
                }
            },
            Filter::Opaque => {
                for p in &mut self.pixels {
                    *p |= ALPHA_MASK;
                }
                self.format = Format::Rgb;
            },
            Filter::Erode => self.morph(|candidate, best| candidate > best),
            Filter::Dilate => self.morph(|candidate, best| candidate < best),
        }
        self.update_pixels();
        Ok(())
    }

    /// Apply a filter that takes a parameter
    pub fn filter_with(&mut self, kind: Filter, param: f32) -> ImageResult<()> {
        match kind {
            Filter::Blur => self.blur(param),
            Filter::Posterize => {
                let levels = param as i32;
                if !(2..=255).contains(&levels) {
                    return Err(ImageError::PosterizeLevels(levels));
                }
                self.posterize(levels as u32);
            },
            Filter::Threshold => self.threshold(param),
            Filter::Gray | Filter::Invert | Filter::Opaque | Filter::Erode | Filter::Dilate => {
                return Err(ImageError::UnexpectedFilterParam(kind.name()));
            },
        }
        self.update_pixels();
        Ok(())
    }

    fn gray(&mut self) {
        if self.format == Format::Alpha {
            // Alpha-only images become an opaque grayscale of the inverted alpha
            for p in &mut self.pixels {
                let col = 255 - (*p & 0xFF);
                *p = ALPHA_MASK | (col << 16) | (col << 8) | col;
            }
            self.format = Format::Rgb;
        } else {
            for p in &mut self.pixels {
                let lum = luminance(*p) >> 8;
                *p = (*p & ALPHA_MASK) | (lum << 16) | (lum << 8) | lum;
            }
        }
    }

    fn posterize(&mut self, levels: u32) {
        for p in &mut self.pixels {
            let r = posterize_channel((*p & RED_MASK) >> 16, levels);
            let g = posterize_channel((*p & GREEN_MASK) >> 8, levels);
            let b = posterize_channel(*p & BLUE_MASK, levels);
            *p = (*p & ALPHA_MASK) | (r << 16) | (g << 8) | b;
        }
    }

    fn threshold(&mut self, cutoff: f32) {
        let thresh = (cutoff * 255.0) as i32;
        for p in &mut self.pixels {
            let max = ((*p >> 16) & 0xFF).max((*p >> 8) & 0xFF).max(*p & 0xFF) as i32;
            let color = if max < thresh { 0 } else { RGB_MASK };
            *p = (*p & ALPHA_MASK) | color;
        }
    }

    fn blur(&mut self, r: f32) {
        let radius = BlurKernel::radius_for(r);
        if self.blur_kernel.as_ref().map(BlurKernel::radius) != Some(radius) {
            trace!("Building blur kernel for radius {}", radius);
            self.blur_kernel = Some(BlurKernel::build(radius));
        }
        let channels = match self.format {
            Format::Alpha => BlurChannels::Low,
            Format::Rgb => BlurChannels::Color,
            Format::Argb => BlurChannels::ColorAlpha,
        };
        let (width, height) = (self.pixel_width as usize, self.pixel_height as usize);
        if let Some(kernel) = self.blur_kernel.as_ref() {
            blur_pass(&mut self.pixels, width, height, kernel, channels);
        }
    }

    /// Single 4-neighbour pass picking the neighbour `better` prefers by luminance.
    /// Left/right/down clamp to the pixel itself at the edges; up clamps to index 0.
    fn morph(&mut self, better: impl Fn(u32, u32) -> bool) {
        let width = self.pixel_width as usize;
        let len = self.pixels.len();
        if width == 0 {
            return;
        }
        let src = &self.pixels;
        let mut out = vec![0u32; len];

        for (idx, slot) in out.iter_mut().enumerate() {
            let row_start = idx - idx % width;
            let row_end = row_start + width;
            let left = if idx > row_start { idx - 1 } else { idx };
            let right = if idx + 1 < row_end { idx + 1 } else { idx };
            let up = idx.saturating_sub(width);
            let down = if idx + width < len { idx + width } else { idx };

            let mut best = src[idx];
            let mut best_lum = luminance(best);
            for n in [left, right, up, down] {
                let lum = luminance(src[n]);
                if better(lum, best_lum) {
                    best = src[n];
                    best_lum = lum;
                }
            }
            *slot = best;
        }
        self.pixels = out;
    }

    /// Effective radius of the cached blur kernel, if one has been built
    pub fn blur_kernel_radius(&self) -> Option<usize> {
        self.blur_kernel.as_ref().map(BlurKernel::radius)
    }
}
