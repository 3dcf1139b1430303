//! Blend-mode arithmetic
//!
//! Every mode uses the source alpha to interpolate between the destination
//! and the fully applied result of the operation:
//!
//! `out = (dst * d_a + op(dst, src) * s_a) >> 8`
//!
//! with `s_a = a + (a >= 127)` and `d_a = 256 - s_a`. Dividing by 256 is much
//! cheaper than dividing by 255, so one alpha step is left out between 126
//! and 127. That keeps 0, 127 (exact half mix) and 255 landing exactly.
//!
//! Output alpha accumulates: `min(dst_a + src_a, 255)`. This is not Porter-Duff
//! "over" and repeated blends do not converge the way "over" would.
//!
//! The rounding constants (`+ 1`, `>> 7`, `32640`) are hand-tuned so channel
//! extremes come out exact. Don't simplify them.

/// Compositing mode for `blend()` / `copy()` / `blend_color()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// O = S, alpha included, no interpolation
    Replace,
    /// Linear interpolation from D to S by source alpha
    Blend,
    /// O = min(D + S, 255)
    Add,
    /// O = max(D - S, 0)
    Subtract,
    /// O = max(D, S)
    Lightest,
    /// O = min(D, S)
    Darkest,
    /// O = |D - S|
    Difference,
    /// O = D + S - 2DS
    Exclusion,
    /// O = DS
    Multiply,
    /// O = D + S - DS
    Screen,
    /// O = 2DS for D < 0.5, 2(D + S - DS) - 1 otherwise
    Overlay,
    /// Overlay with the arguments swapped
    HardLight,
    /// O = 2DS + D² - 2D²S (Pegtop)
    SoftLight,
    /// O = D / (1 - S)
    Dodge,
    /// O = 1 - (1 - D) / S
    Burn,
}

impl BlendMode {
    pub const ALL: [BlendMode; 15] = [
        BlendMode::Replace,
        BlendMode::Blend,
        BlendMode::Add,
        BlendMode::Subtract,
        BlendMode::Lightest,
        BlendMode::Darkest,
        BlendMode::Difference,
        BlendMode::Exclusion,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::HardLight,
        BlendMode::SoftLight,
        BlendMode::Dodge,
        BlendMode::Burn,
    ];

    /// Name as used in sketch code (`REPLACE`, `HARD_LIGHT`, ...)
    pub fn name(self) -> &'static str {
        match self {
            BlendMode::Replace => "REPLACE",
            BlendMode::Blend => "BLEND",
            BlendMode::Add => "ADD",
            BlendMode::Subtract => "SUBTRACT",
            BlendMode::Lightest => "LIGHTEST",
            BlendMode::Darkest => "DARKEST",
            BlendMode::Difference => "DIFFERENCE",
            BlendMode::Exclusion => "EXCLUSION",
            BlendMode::Multiply => "MULTIPLY",
            BlendMode::Screen => "SCREEN",
            BlendMode::Overlay => "OVERLAY",
            BlendMode::HardLight => "HARD_LIGHT",
            BlendMode::SoftLight => "SOFT_LIGHT",
            BlendMode::Dodge => "DODGE",
            BlendMode::Burn => "BURN",
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

const CHANNEL_SHIFTS: [u32; 3] = [16, 8, 0];

/// Source alpha weight, with 127 promoted to an exact half (128)
#[inline]
fn source_weight(a: u32) -> u32 {
    a + u32::from(a >= 0x7F)
}

/// Accumulating output alpha
#[inline]
fn accumulate_alpha(dst: u32, a: u32) -> u32 {
    ((dst >> 24) + a).min(0xFF) << 24
}

/// Apply a per-channel operation and interpolate toward it by source alpha
#[inline]
fn interpolate(dst: u32, src: u32, op: impl Fn(u32, u32) -> u32) -> u32 {
    let a = src >> 24;
    let s_a = source_weight(a);
    let d_a = 0x100 - s_a;

    let mut out = accumulate_alpha(dst, a);
    for shift in CHANNEL_SHIFTS {
        let d = (dst >> shift) & 0xFF;
        let s = (src >> shift) & 0xFF;
        let result = op(d, s);
        out |= (((d * d_a + result * s_a) >> 8) & 0xFF) << shift;
    }
    out
}

/// Scale the source by alpha and combine without interpolation (add/subtract pin)
#[inline]
fn pin(dst: u32, src: u32, op: impl Fn(u32, u32) -> u32) -> u32 {
    let a = src >> 24;
    let s_a = source_weight(a);

    let mut out = accumulate_alpha(dst, a);
    for shift in CHANNEL_SHIFTS {
        let d = (dst >> shift) & 0xFF;
        let s = (((src >> shift) & 0xFF) * s_a) >> 8;
        out |= (op(d, s) & 0xFF) << shift;
    }
    out
}

/// 2DS below the midpoint, 2(D + S - DS) - 1 above it
#[inline]
fn overlay_channel(d: u32, s: u32) -> u32 {
    if d < 0x80 {
        (d * (s + 1)) >> 7
    } else {
        (32640 - (0x100 - s) * (0xFF - d)) >> 7
    }
}

#[inline]
fn soft_light_channel(d: u32, s: u32) -> u32 {
    let d1 = d + u32::from(s < 0x7F);
    let value = ((s * d) << 9) + 0xFF * d1 * (d1 + 1) - ((s * d1 * d1) << 1);
    (value >> 16).min(0xFF)
}

#[inline]
fn dodge_channel(d: u32, s: u32) -> u32 {
    ((d << 8) / (0x100 - s)).min(0xFF)
}

/// Each channel divides by its own source channel
#[inline]
fn burn_channel(d: u32, s: u32) -> u32 {
    0xFF - (((0xFF - d) << 8) / (1 + s)).min(0xFF)
}

// ============================================================================
// Modes
// ============================================================================

/// Combine two packed ARGB colors under `mode`.
/// `dst` is the existing color, `src` the incoming one.
pub fn blend_color(dst: u32, src: u32, mode: BlendMode) -> u32 {
    match mode {
        BlendMode::Replace => src,
        BlendMode::Blend => interpolate(dst, src, |_, s| s),
        BlendMode::Add => pin(dst, src, |d, s| (d + s).min(0xFF)),
        BlendMode::Subtract => pin(dst, src, u32::saturating_sub),
        BlendMode::Lightest => interpolate(dst, src, u32::max),
        BlendMode::Darkest => interpolate(dst, src, u32::min),
        BlendMode::Difference => interpolate(dst, src, |d, s| d.abs_diff(s)),
        BlendMode::Exclusion => interpolate(dst, src, |d, s| {
            let f = d + u32::from(d >= 0x7F);
            (d + s).saturating_sub(((s * f) >> 7) & 0x1FF)
        }),
        BlendMode::Multiply => interpolate(dst, src, |d, s| (s * (d + 1)) >> 8),
        BlendMode::Screen => interpolate(dst, src, |d, s| d + s - ((s * (d + 1)) >> 8)),
        BlendMode::Overlay => interpolate(dst, src, overlay_channel),
        BlendMode::HardLight => interpolate(dst, src, |d, s| overlay_channel(s, d)),
        BlendMode::SoftLight => interpolate(dst, src, soft_light_channel),
        BlendMode::Dodge => interpolate(dst, src, dodge_channel),
        BlendMode::Burn => interpolate(dst, src, burn_channel),
    }
}
