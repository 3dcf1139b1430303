//! Perlin-style value noise
//!
//! A 4096-entry table of random values sampled on a wrapped lattice and
//! blended with cosine easing. Octaves double the frequency and scale the
//! amplitude by the falloff, starting at 0.5. Output lies in `[0, 1)` for the
//! default falloff.

use std::f32::consts::PI;

use crate::random::Random;

const YWRAPB: u32 = 4;
const YWRAP: usize = 1 << YWRAPB;
const ZWRAPB: u32 = 8;
const ZWRAP: usize = 1 << ZWRAPB;
const SIZE: usize = 4095;

pub const DEFAULT_OCTAVES: u32 = 4;
pub const DEFAULT_FALLOFF: f32 = 0.5;

/// Cosine ease on `[0, 1)`
#[inline]
fn ease(t: f32) -> f32 {
    0.5 * (1.0 - (t * PI).cos())
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

#[derive(Debug, Clone)]
pub struct Noise {
    seed: u64,
    table: Option<Box<[f32]>>,
    octaves: u32,
    falloff: f32,
}

impl Noise {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            table: None,
            octaves: DEFAULT_OCTAVES,
            falloff: DEFAULT_FALLOFF,
        }
    }

    /// Reseed; the lattice is rebuilt on the next sample
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
        self.table = None;
    }

    /// Set the octave count and amplitude falloff. Non-positive values keep
    /// the current setting.
    pub fn detail(&mut self, octaves: i32, falloff: f32) {
        if octaves > 0 {
            self.octaves = octaves as u32;
        }
        if falloff > 0.0 {
            self.falloff = falloff;
        }
    }

    #[inline]
    pub fn octaves(&self) -> u32 {
        self.octaves
    }

    #[inline]
    pub fn falloff(&self) -> f32 {
        self.falloff
    }

    fn table(&mut self) -> &[f32] {
        let seed = self.seed;
        self.table.get_or_insert_with(|| {
            let mut rng = Random::new(seed);
            (0..=SIZE).map(|_| rng.next_f32()).collect()
        })
    }

    pub fn noise1(&mut self, x: f32) -> f32 {
        self.noise3(x, 0.0, 0.0)
    }

    pub fn noise2(&mut self, x: f32, y: f32) -> f32 {
        self.noise3(x, y, 0.0)
    }

    /// Sample at `(x, y, z)`. Negative coordinates mirror their positive
    /// counterparts.
    pub fn noise3(&mut self, x: f32, y: f32, z: f32) -> f32 {
        let octaves = self.octaves;
        let falloff = self.falloff;
        let table = self.table();

        let (x, y, z) = (x.abs(), y.abs(), z.abs());
        let (mut xi, mut yi, mut zi) = (x as usize, y as usize, z as usize);
        let (mut xf, mut yf, mut zf) = (x - xi as f32, y - yi as f32, z - zi as f32);

        let at = |i: usize| table[i & SIZE];
        let mut r = 0.0;
        let mut amp = 0.5;

        for _ in 0..octaves {
            let mut of = xi
                .wrapping_add(yi.wrapping_shl(YWRAPB))
                .wrapping_add(zi.wrapping_shl(ZWRAPB));
            let rxf = ease(xf);
            let ryf = ease(yf);

            let mut n1 = lerp(at(of), at(of.wrapping_add(1)), rxf);
            let mut n2 = lerp(at(of.wrapping_add(YWRAP)), at(of.wrapping_add(YWRAP + 1)), rxf);
            n1 = lerp(n1, n2, ryf);

            of = of.wrapping_add(ZWRAP);
            n2 = lerp(at(of), at(of.wrapping_add(1)), rxf);
            let n3 = lerp(at(of.wrapping_add(YWRAP)), at(of.wrapping_add(YWRAP + 1)), rxf);
            n2 = lerp(n2, n3, ryf);

            n1 = lerp(n1, n2, ease(zf));
            r += n1 * amp;
            amp *= falloff;

            xi = xi.wrapping_shl(1);
            xf *= 2.0;
            yi = yi.wrapping_shl(1);
            yf *= 2.0;
            zi = zi.wrapping_shl(1);
            zf *= 2.0;
            if xf >= 1.0 {
                xi = xi.wrapping_add(1);
                xf -= 1.0;
            }
            if yf >= 1.0 {
                yi = yi.wrapping_add(1);
                yf -= 1.0;
            }
            if zf >= 1.0 {
                zi = zi.wrapping_add(1);
                zf -= 1.0;
            }
        }
        r
    }
}

impl Default for Noise {
    fn default() -> Self {
        Self::new(0)
    }
}
