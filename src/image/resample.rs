//! Fixed-point bilinear blitter
//!
//! Source coordinates advance in 17.15 fixed point. Scale factors are
//! computed in f32 and truncated, so a stretch never reads past the source
//! rectangle. Each destination pixel is the four-texel bilinear mix of the
//! source, then combined with the existing pixel by the blend mode.

use super::blend::{blend_color, BlendMode};

const PRECISION_BITS: u32 = 15;
const PRECISION: i64 = 1 << PRECISION_BITS;
const PRECISION_MAX: i64 = PRECISION - 1;

/// Half-open rectangle `[x1, x2) x [y1, y2)` in backing-store pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Span {
    pub fn from_size(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x.saturating_add(w),
            y2: y.saturating_add(h),
        }
    }
}

/// Read-only view of a source raster
pub(crate) struct Source<'a> {
    pub pixels: &'a [u32],
    pub width: i32,
    pub height: i32,
}

/// Writable view of a destination raster
pub(crate) struct Target<'a> {
    pub pixels: &'a mut [u32],
    pub width: i32,
    pub height: i32,
}

// ============================================================================
// Bilinear sampler
// ============================================================================

/// Walks the source in fixed point; one instance per blit
struct Sampler<'a> {
    src: &'a [u32],
    iw: usize,
    iw1: usize,
    ih1: usize,
    // Row state, refreshed per scanline
    v1: usize,
    v2: usize,
    if_v: i64,
}

impl<'a> Sampler<'a> {
    fn new(src: &Source<'a>) -> Self {
        Self {
            src: src.pixels,
            iw: src.width as usize,
            iw1: (src.width - 1) as usize,
            ih1: (src.height - 1) as usize,
            v1: 0,
            v2: 0,
            if_v: PRECISION,
        }
    }

    #[inline]
    fn scanline(&mut self, y_offset: i64) {
        let row = ((y_offset >> PRECISION_BITS) as usize).min(self.ih1);
        let frac_v = y_offset & PRECISION_MAX;
        self.if_v = PRECISION - frac_v;
        self.v1 = row * self.iw;
        self.v2 = (row + 1).min(self.ih1) * self.iw;
    }

    #[inline]
    fn sample(&self, x_offset: i64) -> u32 {
        let frac_u = x_offset & PRECISION_MAX;
        let if_u = PRECISION - frac_u;
        let ul = (if_u * self.if_v) >> PRECISION_BITS;
        let ll = if_u - ul;
        let ur = self.if_v - ul;
        let lr = PRECISION - ul - ll - ur;

        let u1 = ((x_offset >> PRECISION_BITS) as usize).min(self.iw1);
        let u2 = (u1 + 1).min(self.iw1);

        let c_ul = self.src[self.v1 + u1];
        let c_ur = self.src[self.v1 + u2];
        let c_ll = self.src[self.v2 + u1];
        let c_lr = self.src[self.v2 + u2];

        let mut out = 0u32;
        for shift in [24, 16, 8, 0] {
            let ch = |c: u32| i64::from((c >> shift) & 0xFF);
            let sum = ul * ch(c_ul) + ll * ch(c_ll) + ur * ch(c_ur) + lr * ch(c_lr);
            out |= (((sum >> PRECISION_BITS) as u32) & 0xFF) << shift;
        }
        out
    }
}

// ============================================================================
// Blit
// ============================================================================

/// Resample `src_span` of `src` into `dst_span` of `dst`, combining with `mode`.
///
/// The source span is clipped to the source image. The destination span is
/// clipped to the target; pixels cut off the left or top edge advance the
/// source offset so the visible part lines up with the unclipped mapping.
/// Returns the destination rectangle actually written, if any.
pub(crate) fn blit_resize(
    src: &Source<'_>,
    src_span: Span,
    dst: &mut Target<'_>,
    dst_span: Span,
    mode: BlendMode,
) -> Option<Span> {
    let sx1 = src_span.x1.max(0);
    let sy1 = src_span.y1.max(0);
    let sx2 = src_span.x2.min(src.width);
    let sy2 = src_span.y2.min(src.height);

    let src_w = sx2 - sx1;
    let src_h = sy2 - sy1;
    let mut dest_w = dst_span.x2.saturating_sub(dst_span.x1);
    let mut dest_h = dst_span.y2.saturating_sub(dst_span.y1);
    let mut dest_x1 = dst_span.x1;
    let mut dest_y1 = dst_span.y1;

    if dest_w <= 0
        || dest_h <= 0
        || src_w <= 0
        || src_h <= 0
        || dest_x1 >= dst.width
        || dest_y1 >= dst.height
        || sx1 >= src.width
        || sy1 >= src.height
    {
        return None;
    }

    let dx = (src_w as f32 / dest_w as f32 * PRECISION as f32) as i64;
    let dy = (src_h as f32 / dest_h as f32 * PRECISION as f32) as i64;

    let mut x_offset = i64::from(sx1) * PRECISION;
    let mut y_offset = i64::from(sy1) * PRECISION;
    if dest_x1 < 0 {
        x_offset += i64::from(-dest_x1) * dx;
        dest_w += dest_x1;
        dest_x1 = 0;
    }
    if dest_y1 < 0 {
        y_offset += i64::from(-dest_y1) * dy;
        dest_h += dest_y1;
        dest_y1 = 0;
    }

    dest_w = dest_w.min(dst.width - dest_x1);
    dest_h = dest_h.min(dst.height - dest_y1);
    if dest_w <= 0 || dest_h <= 0 {
        return None;
    }

    let mut sampler = Sampler::new(src);
    let stride = dst.width as usize;
    let mut row_start = dest_y1 as usize * stride + dest_x1 as usize;

    for _ in 0..dest_h {
        sampler.scanline(y_offset);
        let row = &mut dst.pixels[row_start..row_start + dest_w as usize];
        let mut sx = x_offset;
        if mode == BlendMode::Replace {
            for px in row.iter_mut() {
                *px = sampler.sample(sx);
                sx += dx;
            }
        } else {
            for px in row.iter_mut() {
                *px = blend_color(*px, sampler.sample(sx), mode);
                sx += dx;
            }
        }
        row_start += stride;
        y_offset += dy;
    }

    Some(Span::from_size(dest_x1, dest_y1, dest_w, dest_h))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blit(
        src: &[u32],
        sw: i32,
        sh: i32,
        src_span: Span,
        dst: &mut [u32],
        dw: i32,
        dh: i32,
        dst_span: Span,
        mode: BlendMode,
    ) -> Option<Span> {
        let source = Source {
            pixels: src,
            width: sw,
            height: sh,
        };
        let mut target = Target {
            pixels: dst,
            width: dw,
            height: dh,
        };
        blit_resize(&source, src_span, &mut target, dst_span, mode)
    }

    #[test]
    fn test_span_saturates_near_i32_max() {
        let span = Span::from_size(i32::MAX - 2, 5, 10, i32::MAX);
        assert_eq!((span.x2, span.y2), (i32::MAX, i32::MAX));

        let src = vec![0xFF00_00FF; 4];
        let mut dst = vec![0u32; 4];
        let written = blit(
            &src,
            2,
            2,
            Span::from_size(0, 0, 2, 2),
            &mut dst,
            2,
            2,
            Span::from_size(i32::MAX - 1, 0, i32::MAX, 2),
            BlendMode::Replace,
        );
        assert_eq!(written, None);
        assert!(dst.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_identity_copy_is_exact() {
        let src: Vec<u32> = (0..16).map(|i| 0xFF00_0000 | (i * 0x0F0F0F)).collect();
        let mut dst = vec![0u32; 16];
        let span = Span::from_size(0, 0, 4, 4);
        let written = blit(&src, 4, 4, span, &mut dst, 4, 4, span, BlendMode::Replace);
        assert_eq!(written, Some(span));
        assert_eq!(dst, src);
    }

    #[test]
    fn test_replace_copy_twice_is_idempotent() {
        let src: Vec<u32> = (0..12).map(|i| 0x8000_0000 | (i * 0x111111)).collect();
        let mut dst = vec![0xFF12_3456u32; 25];
        let s = Span::from_size(0, 0, 4, 3);
        let d = Span::from_size(1, 1, 4, 3);
        blit(&src, 4, 3, s, &mut dst, 5, 5, d, BlendMode::Replace);
        let once = dst.clone();
        blit(&src, 4, 3, s, &mut dst, 5, 5, d, BlendMode::Replace);
        assert_eq!(dst, once);
    }

    #[test]
    fn test_upscale_interpolates_between_texels() {
        // Two texels, black and white, stretched to four
        let src = [0xFF00_0000, 0xFFFF_FFFF];
        let mut dst = vec![0u32; 4];
        blit(
            &src,
            2,
            1,
            Span::from_size(0, 0, 2, 1),
            &mut dst,
            4,
            1,
            Span::from_size(0, 0, 4, 1),
            BlendMode::Replace,
        );
        // Offsets 0, 0.5, 1.0, 1.5 -> the last two clamp to the white texel
        assert_eq!(dst[0], 0xFF00_0000);
        assert_eq!(dst[1] & 0xFF, 127);
        assert_eq!(dst[2], 0xFFFF_FFFF);
        assert_eq!(dst[3], 0xFFFF_FFFF);
    }

    #[test]
    fn test_downscale_samples_every_other_texel() {
        let src: Vec<u32> = (0..8).map(|i| 0xFF00_0000 | (i * 10)).collect();
        let mut dst = vec![0u32; 4];
        blit(
            &src,
            8,
            1,
            Span::from_size(0, 0, 8, 1),
            &mut dst,
            4,
            1,
            Span::from_size(0, 0, 4, 1),
            BlendMode::Replace,
        );
        let blues: Vec<u32> = dst.iter().map(|p| p & 0xFF).collect();
        assert_eq!(blues, vec![0, 20, 40, 60]);
    }

    #[test]
    fn test_negative_destination_is_clipped_and_offset() {
        let src: Vec<u32> = (0..4).map(|i| 0xFF00_0000 | i).collect();
        let mut dst = vec![0u32; 4];
        let written = blit(
            &src,
            4,
            1,
            Span::from_size(0, 0, 4, 1),
            &mut dst,
            4,
            1,
            Span::from_size(-2, 0, 4, 1),
            BlendMode::Replace,
        );
        assert_eq!(written, Some(Span::from_size(0, 0, 2, 1)));
        assert_eq!(dst, vec![0xFF00_0002, 0xFF00_0003, 0, 0]);
    }

    #[test]
    fn test_source_origin_is_honoured_when_destination_clipped() {
        let src: Vec<u32> = (0..6).map(|i| 0xFF00_0000 | i).collect();
        let mut dst = vec![0u32; 2];
        blit(
            &src,
            6,
            1,
            Span::from_size(2, 0, 3, 1),
            &mut dst,
            2,
            1,
            Span::from_size(-1, 0, 3, 1),
            BlendMode::Replace,
        );
        assert_eq!(dst, vec![0xFF00_0003, 0xFF00_0004]);
    }

    #[test]
    fn test_empty_or_offscreen_regions_write_nothing() {
        let src = [0xFFFF_FFFFu32; 4];
        let mut dst = vec![0u32; 4];
        let full = Span::from_size(0, 0, 2, 2);
        assert_eq!(
            blit(&src, 2, 2, Span::from_size(0, 0, 0, 2), &mut dst, 2, 2, full, BlendMode::Blend),
            None
        );
        assert_eq!(
            blit(&src, 2, 2, full, &mut dst, 2, 2, Span::from_size(2, 0, 2, 2), BlendMode::Blend),
            None
        );
        assert_eq!(
            blit(&src, 2, 2, Span::from_size(5, 5, 2, 2), &mut dst, 2, 2, full, BlendMode::Blend),
            None
        );
        assert_eq!(
            blit(&src, 2, 2, full, &mut dst, 2, 2, Span::from_size(-4, 0, 2, 2), BlendMode::Blend),
            None
        );
        assert!(dst.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_blend_mode_is_applied_per_pixel() {
        let src = [0xFFFF_FFFFu32; 4];
        let mut dst = vec![0xFF00_0000u32; 4];
        let span = Span::from_size(0, 0, 2, 2);
        blit(&src, 2, 2, span, &mut dst, 2, 2, span, BlendMode::Multiply);
        assert!(dst.iter().all(|&p| p == 0xFF00_0000));
        blit(&src, 2, 2, span, &mut dst, 2, 2, span, BlendMode::Screen);
        assert!(dst.iter().all(|&p| p == 0xFFFF_FFFF));
    }
}
