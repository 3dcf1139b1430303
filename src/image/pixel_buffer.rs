use log::debug;

use super::blend::BlendMode;
use super::filter::BlurKernel;
use super::resample::{blit_resize, Source, Span, Target};
use super::{Format, ALPHA_MASK, RGB_MASK};
use crate::error::{ImageError, ImageResult};

// ============================================================================
// Dirty region
// ============================================================================

/// Half-open rectangle of pixels touched since the consumer last cleared it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRegion {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl DirtyRegion {
    #[inline]
    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }
}

/// Overlap test used to decide whether a self-blend needs a snapshot.
/// Rectangles are inclusive of their end coordinates here.
fn rects_intersect(s: Span, d: Span) -> bool {
    let sw = s.x2 - s.x1 + 1;
    let sh = s.y2 - s.y1 + 1;
    let mut dw = d.x2 - d.x1 + 1;
    let mut dh = d.y2 - d.y1 + 1;

    if d.x1 < s.x1 {
        dw += d.x1 - s.x1;
        dw = dw.min(sw);
    } else {
        dw = dw.min(sw + s.x1 - d.x1);
    }
    if d.y1 < s.y1 {
        dh += d.y1 - s.y1;
        dh = dh.min(sh);
    } else {
        dh = dh.min(sh + s.y1 - d.y1);
    }
    dw > 0 && dh > 0
}

// ============================================================================
// PixelBuffer
// ============================================================================

/// Packed-ARGB raster with a format tag and a dirty region.
///
/// Coordinates passed to the pixel-level methods are backing-store pixels,
/// so on a buffer with density 2 a 100x100 image spans 0..200 on each axis.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub(super) pixels: Vec<u32>,
    pub(super) width: u32,
    pub(super) height: u32,
    pub(super) density: u32,
    pub(super) pixel_width: u32,
    pub(super) pixel_height: u32,
    pub(super) format: Format,
    pub(super) dirty: Option<DirtyRegion>,
    pub(super) blur_kernel: Option<BlurKernel>,
}

impl PixelBuffer {
    /// Create a zeroed buffer. RGB buffers start opaque black.
    pub fn new(width: u32, height: u32, format: Format) -> Self {
        Self::with_density(width, height, format, 1)
    }

    /// Create a buffer whose backing store is `density` times larger per axis
    pub fn with_density(width: u32, height: u32, format: Format, density: u32) -> Self {
        let density = density.max(1);
        let pixel_width = width * density;
        let pixel_height = height * density;
        let fill = if format == Format::Rgb { ALPHA_MASK } else { 0 };
        Self {
            pixels: vec![fill; (pixel_width * pixel_height) as usize],
            width,
            height,
            density,
            pixel_width,
            pixel_height,
            format,
            dirty: None,
            blur_kernel: None,
        }
    }

    /// Wrap existing pixels. The length must be exactly `width * height`.
    pub fn from_pixels(width: u32, height: u32, format: Format, pixels: Vec<u32>) -> ImageResult<Self> {
        let expected = (width * height) as usize;
        if pixels.len() != expected {
            return Err(ImageError::PixelCountMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            pixels,
            width,
            height,
            density: 1,
            pixel_width: width,
            pixel_height: height,
            format,
            dirty: None,
            blur_kernel: None,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn pixel_width(&self) -> u32 {
        self.pixel_width
    }

    #[inline]
    pub fn pixel_height(&self) -> u32 {
        self.pixel_height
    }

    #[inline]
    pub fn pixel_density(&self) -> u32 {
        self.density
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    #[inline]
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Direct access to the backing store.
    /// Call `update_pixels()` afterwards so the change is picked up.
    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    /// Check if backing-store coordinates are within bounds
    #[inline]
    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.pixel_width as i32 && y >= 0 && y < self.pixel_height as i32
    }

    #[inline]
    fn pixel_index(&self, x: i32, y: i32) -> usize {
        y as usize * self.pixel_width as usize + x as usize
    }

    /// Overwrite every pixel with `color` and mark everything dirty
    pub fn fill(&mut self, color: u32) {
        let color = if self.format == Format::Rgb { color | ALPHA_MASK } else { color };
        self.pixels.fill(color);
        self.update_pixels();
    }

    // ========================================================================
    // Dirty region
    // ========================================================================

    /// Mark the whole image as modified
    pub fn update_pixels(&mut self) {
        self.update_pixels_region(0, 0, self.pixel_width as i32, self.pixel_height as i32);
    }

    /// Grow the dirty region to include `(x, y, w, h)`, clamped to the image.
    /// Regions with nothing on the image leave it unchanged.
    pub fn update_pixels_region(&mut self, x: i32, y: i32, w: i32, h: i32) {
        let x1 = x.max(0);
        let y1 = y.max(0);
        let x2 = x.saturating_add(w).min(self.pixel_width as i32);
        let y2 = y.saturating_add(h).min(self.pixel_height as i32);
        if x1 >= x2 || y1 >= y2 {
            return;
        }

        match self.dirty.as_mut() {
            None => self.dirty = Some(DirtyRegion { x1, y1, x2, y2 }),
            Some(region) => {
                region.x1 = region.x1.min(x1);
                region.y1 = region.y1.min(y1);
                region.x2 = region.x2.max(x2);
                region.y2 = region.y2.max(y2);
            },
        }
    }

    #[inline]
    pub fn is_modified(&self) -> bool {
        self.dirty.is_some()
    }

    #[inline]
    pub fn modified_region(&self) -> Option<DirtyRegion> {
        self.dirty
    }

    /// Called by the consumer once it has picked up the changes
    pub fn clear_modified(&mut self) {
        self.dirty = None;
    }

    // ========================================================================
    // Get / Set
    // ========================================================================

    /// Read one pixel as ARGB. Out of bounds reads return 0.
    /// RGB pixels come back opaque, ALPHA pixels as white with that alpha.
    pub fn get(&self, x: i32, y: i32) -> u32 {
        if !self.in_bounds(x, y) {
            return 0;
        }
        let p = self.pixels[self.pixel_index(x, y)];
        match self.format {
            Format::Rgb => p | ALPHA_MASK,
            Format::Argb => p,
            Format::Alpha => (p << 24) | RGB_MASK,
        }
    }

    /// Copy a region into a new buffer of exactly `w x h`.
    /// Parts of the region outside this image stay transparent; cropping an
    /// RGB image yields ARGB so those parts can be told apart.
    pub fn get_region(&self, x: i32, y: i32, w: i32, h: i32) -> PixelBuffer {
        let target_w = w.max(0);
        let target_h = h.max(0);
        let (mut x, mut y, mut w, mut h) = (x, y, w, h);
        let mut target_x = 0;
        let mut target_y = 0;
        let mut cropped = false;

        if x < 0 {
            w += x;
            target_x = -x;
            cropped = true;
            x = 0;
        }
        if y < 0 {
            h += y;
            target_y = -y;
            cropped = true;
            y = 0;
        }
        if x + w > self.pixel_width as i32 {
            w = self.pixel_width as i32 - x;
            cropped = true;
        }
        if y + h > self.pixel_height as i32 {
            h = self.pixel_height as i32 - y;
            cropped = true;
        }

        let format = if cropped && self.format == Format::Rgb {
            Format::Argb
        } else {
            self.format
        };
        let mut target = PixelBuffer::new(target_w as u32, target_h as u32, format);

        if w > 0 && h > 0 {
            let tw = target_w as usize;
            for row in 0..h as usize {
                let src = self.pixel_index(x, y + row as i32);
                let dst = (target_y as usize + row) * tw + target_x as usize;
                target.pixels[dst..dst + w as usize].copy_from_slice(&self.pixels[src..src + w as usize]);
            }
        }
        target
    }

    /// Copy of the whole image
    pub fn get_all(&self) -> PixelBuffer {
        self.get_region(0, 0, self.pixel_width as i32, self.pixel_height as i32)
    }

    /// Overwrite one pixel. Out of bounds writes are ignored.
    pub fn set(&mut self, x: i32, y: i32, color: u32) {
        if !self.in_bounds(x, y) {
            return;
        }
        let idx = self.pixel_index(x, y);
        self.pixels[idx] = color;
        self.update_pixels_region(x, y, 1, 1);
    }

    /// Overwrite a block with `src` placed at `(x, y)`, clipped, no blending
    pub fn set_image(&mut self, x: i32, y: i32, src: &PixelBuffer) -> ImageResult<()> {
        if src.format == Format::Alpha {
            return Err(ImageError::SetUnsupportedFormat(src.format));
        }

        let (mut x, mut y) = (x, y);
        let mut sx = 0;
        let mut sy = 0;
        let mut sw = src.pixel_width as i32;
        let mut sh = src.pixel_height as i32;

        if x < 0 {
            sx -= x;
            sw += x;
            x = 0;
        }
        if y < 0 {
            sy -= y;
            sh += y;
            y = 0;
        }
        sw = sw.min(self.pixel_width as i32 - x);
        sh = sh.min(self.pixel_height as i32 - y);
        if sw <= 0 || sh <= 0 {
            return Ok(());
        }

        for row in 0..sh {
            let from = src.pixel_index(sx, sy + row);
            let to = self.pixel_index(x, y + row);
            self.pixels[to..to + sw as usize].copy_from_slice(&src.pixels[from..from + sw as usize]);
        }
        self.update_pixels_region(x, y, sw, sh);
        Ok(())
    }

    // ========================================================================
    // Alpha
    // ========================================================================

    /// Replace the alpha channel with the low byte of each mask value
    pub fn mask(&mut self, alpha: &[u32]) -> ImageResult<()> {
        if alpha.len() != self.pixels.len() {
            return Err(ImageError::MaskSizeMismatch {
                expected: self.pixels.len(),
                actual: alpha.len(),
            });
        }
        for (p, &a) in self.pixels.iter_mut().zip(alpha) {
            *p = ((a & 0xFF) << 24) | (*p & RGB_MASK);
        }
        self.format = Format::Argb;
        self.update_pixels();
        Ok(())
    }

    /// Mask with the blue channel of another image of the same size
    pub fn mask_image(&mut self, mask: &PixelBuffer) -> ImageResult<()> {
        self.mask(&mask.pixels)
    }

    /// Switch to ARGB if any pixel is not fully opaque
    pub fn check_alpha(&mut self) {
        if self.pixels.iter().any(|&p| p & ALPHA_MASK != ALPHA_MASK) {
            self.format = Format::Argb;
        }
    }

    // ========================================================================
    // Copy / Blend
    // ========================================================================

    /// Copy a region of `src` into a region of this image, resizing as needed
    pub fn copy(&mut self, src: &PixelBuffer, sx: i32, sy: i32, sw: i32, sh: i32, dx: i32, dy: i32, dw: i32, dh: i32) {
        self.blend(src, sx, sy, sw, sh, dx, dy, dw, dh, BlendMode::Replace);
    }

    /// Copy one region of this image onto another
    pub fn copy_within(&mut self, sx: i32, sy: i32, sw: i32, sh: i32, dx: i32, dy: i32, dw: i32, dh: i32) {
        self.blend_within(sx, sy, sw, sh, dx, dy, dw, dh, BlendMode::Replace);
    }

    /// Resample a region of `src` into a region of this image under `mode`
    pub fn blend(
        &mut self,
        src: &PixelBuffer,
        sx: i32,
        sy: i32,
        sw: i32,
        sh: i32,
        dx: i32,
        dy: i32,
        dw: i32,
        dh: i32,
        mode: BlendMode,
    ) {
        let source = Source {
            pixels: &src.pixels,
            width: src.pixel_width as i32,
            height: src.pixel_height as i32,
        };
        self.blit_from(&source, Span::from_size(sx, sy, sw, sh), Span::from_size(dx, dy, dw, dh), mode);
    }

    /// Blend one region of this image onto another.
    /// Overlapping regions are read from a snapshot of the source region.
    pub fn blend_within(&mut self, sx: i32, sy: i32, sw: i32, sh: i32, dx: i32, dy: i32, dw: i32, dh: i32, mode: BlendMode) {
        let src_span = Span::from_size(sx, sy, sw, sh);
        let dst_span = Span::from_size(dx, dy, dw, dh);

        if rects_intersect(src_span, dst_span) {
            let snapshot = self.get_region(sx, sy, sw, sh);
            let source = Source {
                pixels: &snapshot.pixels,
                width: snapshot.pixel_width as i32,
                height: snapshot.pixel_height as i32,
            };
            self.blit_from(&source, Span::from_size(0, 0, sw, sh), dst_span, mode);
        } else {
            let pixels = self.pixels.clone();
            let source = Source {
                pixels: &pixels,
                width: self.pixel_width as i32,
                height: self.pixel_height as i32,
            };
            self.blit_from(&source, src_span, dst_span, mode);
        }
    }

    fn blit_from(&mut self, source: &Source<'_>, src_span: Span, dst_span: Span, mode: BlendMode) {
        let mut target = Target {
            width: self.pixel_width as i32,
            height: self.pixel_height as i32,
            pixels: &mut self.pixels,
        };
        if blit_resize(source, src_span, &mut target, dst_span, mode).is_some() {
            self.update_pixels();
        }
    }

    // ========================================================================
    // Resize
    // ========================================================================

    /// Resample to a new logical size. A zero on one axis keeps the aspect ratio.
    pub fn resize(&mut self, w: i32, h: i32) -> ImageResult<()> {
        if w <= 0 && h <= 0 {
            return Err(ImageError::InvalidResize(w, h));
        }
        let (w, h) = if w <= 0 {
            (((self.width as f32) * (h as f32 / self.height as f32)) as i32, h)
        } else if h <= 0 {
            (w, ((self.height as f32) * (w as f32 / self.width as f32)) as i32)
        } else {
            (w, h)
        };
        let (w, h) = (w.max(1) as u32, h.max(1) as u32);
        debug!("Resizing {}x{} image to {}x{}", self.width, self.height, w, h);

        let mut resized = PixelBuffer::with_density(w, h, self.format, self.density);
        let source = Source {
            pixels: &self.pixels,
            width: self.pixel_width as i32,
            height: self.pixel_height as i32,
        };
        let src_span = Span::from_size(0, 0, source.width, source.height);
        let dst_span = Span::from_size(0, 0, resized.pixel_width as i32, resized.pixel_height as i32);
        let mut target = Target {
            width: resized.pixel_width as i32,
            height: resized.pixel_height as i32,
            pixels: &mut resized.pixels,
        };
        blit_resize(&source, src_span, &mut target, dst_span, BlendMode::Replace);

        resized.blur_kernel = self.blur_kernel.take();
        *self = resized;
        self.update_pixels();
        Ok(())
    }
}

impl PartialEq for PixelBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.density == other.density
            && self.format == other.format
            && self.pixels == other.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque(v: u32) -> u32 {
        0xFF00_0000 | (v << 16) | (v << 8) | v
    }

    fn ramp(w: u32, h: u32) -> PixelBuffer {
        let pixels = (0..w * h).map(|i| opaque(i * 7 % 256)).collect();
        PixelBuffer::from_pixels(w, h, Format::Argb, pixels).unwrap()
    }

    #[test]
    fn test_new_buffer_dimensions() {
        let img = PixelBuffer::with_density(10, 5, Format::Rgb, 2);
        assert_eq!((img.width(), img.height()), (10, 5));
        assert_eq!((img.pixel_width(), img.pixel_height()), (20, 10));
        assert_eq!(img.pixels().len(), 200);
        assert!(img.pixels().iter().all(|&p| p == ALPHA_MASK));
        assert!(!img.is_modified());
    }

    #[test]
    fn test_from_pixels_checks_length() {
        assert!(matches!(
            PixelBuffer::from_pixels(2, 2, Format::Argb, vec![0; 3]),
            Err(ImageError::PixelCountMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_get_by_format() {
        let rgb = PixelBuffer::from_pixels(1, 1, Format::Rgb, vec![0x0012_3456]).unwrap();
        assert_eq!(rgb.get(0, 0), 0xFF12_3456);
        let argb = PixelBuffer::from_pixels(1, 1, Format::Argb, vec![0x0012_3456]).unwrap();
        assert_eq!(argb.get(0, 0), 0x0012_3456);
        let alpha = PixelBuffer::from_pixels(1, 1, Format::Alpha, vec![0x80]).unwrap();
        assert_eq!(alpha.get(0, 0), 0x80FF_FFFF);
    }

    #[test]
    fn test_out_of_bounds_access_is_tolerated() {
        let mut img = ramp(3, 3);
        assert_eq!(img.get(-1, 0), 0);
        assert_eq!(img.get(0, 3), 0);
        let before = img.pixels().to_vec();
        img.set(3, 0, 0xFFFF_FFFF);
        img.set(0, -1, 0xFFFF_FFFF);
        assert_eq!(img.pixels(), before.as_slice());
        assert!(!img.is_modified());
    }

    #[test]
    fn test_get_region_inside() {
        let img = ramp(4, 4);
        let sub = img.get_region(1, 1, 2, 2);
        assert_eq!((sub.width(), sub.height()), (2, 2));
        assert_eq!(sub.get(0, 0), img.get(1, 1));
        assert_eq!(sub.get(1, 1), img.get(2, 2));
        assert_eq!(sub.format(), Format::Argb);
    }

    #[test]
    fn test_get_region_cropped_rgb_becomes_argb() {
        let img = PixelBuffer::from_pixels(2, 2, Format::Rgb, vec![0xFF11_1111; 4]).unwrap();
        let sub = img.get_region(-1, -1, 3, 3);
        assert_eq!(sub.format(), Format::Argb);
        assert_eq!((sub.width(), sub.height()), (3, 3));
        assert_eq!(sub.get(0, 0), 0);
        assert_eq!(sub.get(2, 0), 0);
        assert_eq!(sub.get(1, 1), 0xFF11_1111);
        assert_eq!(sub.get(2, 2), 0xFF11_1111);

        let whole = img.get_all();
        assert_eq!(whole.format(), Format::Rgb);
        assert_eq!(whole, img);
    }

    #[test]
    fn test_set_image_clips() {
        let mut dst = PixelBuffer::new(3, 3, Format::Argb);
        let src = PixelBuffer::from_pixels(2, 2, Format::Argb, vec![1, 2, 3, 4]).unwrap();
        dst.set_image(-1, 2, &src).unwrap();
        assert_eq!(dst.get(0, 2), 2);
        assert_eq!(dst.get(1, 2), 0);
        let region = dst.modified_region().unwrap();
        assert_eq!((region.x1, region.y1, region.x2, region.y2), (0, 2, 1, 3));

        // Fully outside: no-op
        let mut untouched = PixelBuffer::new(3, 3, Format::Argb);
        untouched.set_image(5, 5, &src).unwrap();
        assert!(!untouched.is_modified());
    }

    #[test]
    fn test_set_image_rejects_alpha_source() {
        let mut dst = PixelBuffer::new(2, 2, Format::Argb);
        let src = PixelBuffer::new(1, 1, Format::Alpha);
        assert!(matches!(
            dst.set_image(0, 0, &src),
            Err(ImageError::SetUnsupportedFormat(Format::Alpha))
        ));
    }

    #[test]
    fn test_dirty_region_is_bounding_union() {
        let mut img = PixelBuffer::new(10, 10, Format::Argb);
        img.set(2, 3, 1);
        assert_eq!(img.modified_region(), Some(DirtyRegion { x1: 2, y1: 3, x2: 3, y2: 4 }));
        img.set(7, 1, 1);
        assert_eq!(img.modified_region(), Some(DirtyRegion { x1: 2, y1: 1, x2: 8, y2: 4 }));
        img.update_pixels_region(4, 2, 1, 1);
        assert_eq!(img.modified_region(), Some(DirtyRegion { x1: 2, y1: 1, x2: 8, y2: 4 }));
        img.update_pixels_region(-5, 8, 30, 5);
        assert_eq!(img.modified_region(), Some(DirtyRegion { x1: 0, y1: 1, x2: 10, y2: 10 }));
        img.update_pixels();
        assert_eq!(img.modified_region(), Some(DirtyRegion { x1: 0, y1: 0, x2: 10, y2: 10 }));
        img.clear_modified();
        assert_eq!(img.modified_region(), None);
    }

    #[test]
    fn test_off_image_region_is_not_recorded() {
        let mut img = PixelBuffer::new(4, 4, Format::Argb);
        img.update_pixels_region(10, 10, 3, 3);
        assert!(!img.is_modified());
        img.update_pixels_region(-8, 1, 2, 2);
        assert!(!img.is_modified());

        img.update_pixels_region(i32::MAX - 1, 0, 10, 10);
        assert!(!img.is_modified());

        img.update_pixels_region(1, 1, 1, 1);
        img.update_pixels_region(20, 20, 1, 1);
        assert_eq!(img.modified_region(), Some(DirtyRegion { x1: 1, y1: 1, x2: 2, y2: 2 }));
    }

    #[test]
    fn test_mask_sets_alpha_from_blue() {
        let mut img = PixelBuffer::from_pixels(2, 1, Format::Rgb, vec![0xFF12_3456, 0xFFAB_CDEF]).unwrap();
        let mask = PixelBuffer::from_pixels(2, 1, Format::Argb, vec![0xFF00_0080, 0x1234_5600]).unwrap();
        img.mask_image(&mask).unwrap();
        assert_eq!(img.format(), Format::Argb);
        assert_eq!(img.pixels(), &[0x8012_3456, 0x00AB_CDEF]);
    }

    #[test]
    fn test_mask_size_mismatch() {
        let mut img = PixelBuffer::new(2, 2, Format::Argb);
        assert!(matches!(
            img.mask(&[0; 3]),
            Err(ImageError::MaskSizeMismatch { expected: 4, actual: 3 })
        ));
        assert_eq!(img.format(), Format::Argb);
    }

    #[test]
    fn test_check_alpha_promotes_format() {
        let mut img = PixelBuffer::from_pixels(2, 1, Format::Rgb, vec![0xFF00_0000, 0xFF00_0000]).unwrap();
        img.check_alpha();
        assert_eq!(img.format(), Format::Rgb);
        img.pixels_mut()[1] = 0x7F00_0000;
        img.check_alpha();
        assert_eq!(img.format(), Format::Argb);
    }

    #[test]
    fn test_multiply_white_half_alpha_on_black() {
        let mut dst = PixelBuffer::from_pixels(4, 4, Format::Argb, vec![0xFF00_0000; 16]).unwrap();
        let src = PixelBuffer::from_pixels(4, 4, Format::Argb, vec![0x80FF_FFFF; 16]).unwrap();
        dst.blend(&src, 0, 0, 4, 4, 0, 0, 4, 4, BlendMode::Multiply);
        assert!(dst.pixels().iter().all(|&p| p == 0xFF00_0000));
    }

    #[test]
    fn test_replace_yields_source_regardless_of_destination() {
        let src = ramp(4, 4);
        for background in [0, 0xFFFF_FFFF, 0x1234_5678] {
            let mut dst = PixelBuffer::from_pixels(6, 6, Format::Argb, vec![background; 36]).unwrap();
            dst.copy(&src, 0, 0, 4, 4, 1, 2, 4, 4);
            assert_eq!(dst.get_region(1, 2, 4, 4).pixels(), src.pixels());
        }
    }

    #[test]
    fn test_self_blend_matches_fresh_copy() {
        for mode in [BlendMode::Replace, BlendMode::Blend, BlendMode::Add, BlendMode::Difference] {
            let mut img = ramp(8, 8);
            let snapshot = img.clone();
            let mut expected = img.clone();
            expected.blend(&snapshot, 0, 0, 5, 5, 2, 1, 5, 5, mode);

            img.blend_within(0, 0, 5, 5, 2, 1, 5, 5, mode);
            assert_eq!(img.pixels(), expected.pixels(), "{:?}", mode);
        }
    }

    #[test]
    fn test_self_copy_disjoint_regions() {
        let mut img = ramp(8, 2);
        let expected: Vec<u32> = (0..4).map(|x| img.get(x, 0)).collect();
        img.copy_within(0, 0, 4, 1, 4, 1, 4, 1);
        let got: Vec<u32> = (4..8).map(|x| img.get(x, 1)).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_blend_marks_dirty_only_when_written() {
        let mut dst = PixelBuffer::new(4, 4, Format::Argb);
        let src = ramp(2, 2);
        dst.blend(&src, 0, 0, 2, 2, 10, 10, 2, 2, BlendMode::Blend);
        assert!(!dst.is_modified());
        dst.blend(&src, 0, 0, 2, 2, 1, 1, 2, 2, BlendMode::Blend);
        assert!(dst.is_modified());
    }

    #[test]
    fn test_resize_keeps_aspect_on_zero_axis() {
        let mut img = ramp(8, 4);
        img.resize(4, 0).unwrap();
        assert_eq!((img.width(), img.height()), (4, 2));
        assert_eq!(img.pixels().len(), 8);
        img.resize(0, 6).unwrap();
        assert_eq!((img.width(), img.height()), (12, 6));
        assert!(img.is_modified());
    }

    #[test]
    fn test_resize_rejects_nonpositive() {
        let mut img = ramp(2, 2);
        assert!(matches!(img.resize(0, 0), Err(ImageError::InvalidResize(0, 0))));
        assert!(matches!(img.resize(-3, 0), Err(ImageError::InvalidResize(-3, 0))));
        assert_eq!(img.width(), 2);
    }

    #[test]
    fn test_resize_flat_image_stays_flat() {
        let mut img = PixelBuffer::from_pixels(3, 3, Format::Argb, vec![0xC040_8020; 9]).unwrap();
        img.resize(7, 5).unwrap();
        assert!(img.pixels().iter().all(|&p| p == 0xC040_8020));
    }

    #[test]
    fn test_fill_keeps_rgb_opaque() {
        let mut img = PixelBuffer::new(2, 2, Format::Rgb);
        img.fill(0x0010_2030);
        assert!(img.pixels().iter().all(|&p| p == 0xFF10_2030));
        assert!(img.is_modified());
    }
}
