//! pixelsketch
//!
//! A software pixel compositing engine and a cooperative frame scheduler for
//! creative-coding sketches.
//!
//! - [`image`]: `PixelBuffer`, blend modes, the fixed-point resampler,
//!   filters and file codecs
//! - [`sketch`]: `SketchLoop`, the per-frame scheduler with its event queue,
//!   hook registry and frame pacing
//! - [`loader`]: synchronous and bounded asynchronous image loading
//! - [`random`] and [`noise`]: per-sketch seeded generators

pub mod config;
pub mod error;
pub mod image;
pub mod loader;
pub mod noise;
pub mod random;
pub mod sketch;

pub use config::SketchConfig;
pub use error::{ImageError, ImageResult, SketchError, SketchResult};
pub use self::image::{BlendMode, Filter, Format, PixelBuffer};
pub use sketch::{Context, Sketch, SketchLoop};
