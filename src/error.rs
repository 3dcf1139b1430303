//! Error types for the image engine and the sketch scheduler
//!
//! Configuration errors (programmer mistakes in a sketch) are returned
//! immediately and never auto-corrected. Resource errors (missing files,
//! unreadable images) are logged by the caller and surface as `Err` so the
//! sketch can decide whether to carry on.

use thiserror::Error;

use crate::image::Format;
use crate::sketch::HookKind;

/// Errors raised by [`PixelBuffer`](crate::image::PixelBuffer) operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ImageError {
    /// `mask()` was handed a mask whose pixel count differs from the image.
    #[error("mask has {actual} pixels but the image has {expected}; sizes must match")]
    MaskSizeMismatch { expected: usize, actual: usize },

    /// Pixel data handed to a constructor does not fill the image exactly.
    #[error("expected {expected} pixels, got {actual}")]
    PixelCountMismatch { expected: usize, actual: usize },

    /// A filter that takes no parameter was called with one.
    #[error("use filter({0}) instead of filter({0}, param)")]
    UnexpectedFilterParam(&'static str),

    /// A filter that needs a parameter was called without one.
    #[error("use filter({0}, param) instead of filter({0})")]
    MissingFilterParam(&'static str),

    /// Posterize levels outside 2..=255.
    #[error("levels must be between 2 and 255 for filter(POSTERIZE, levels), got {0}")]
    PosterizeLevels(i32),

    /// `set_image()` does not blend, so an ALPHA source makes no sense.
    #[error("set() not available for {0:?} images")]
    SetUnsupportedFormat(Format),

    /// `resize()` needs at least one positive dimension.
    #[error("width or height must be > 0 for resize, got {0}x{1}")]
    InvalidResize(i32, i32),

    /// The TIFF reader only understands files produced by the TIFF writer.
    #[error("can only read TIFF files written by this library ({0})")]
    UnsupportedTiff(String),

    /// The file source has nothing under this name.
    #[error("the file \"{0}\" is missing or inaccessible")]
    NotFound(String),

    /// An asynchronous load ended without producing an image.
    #[error("image load failed: {0}")]
    LoadFailed(String),

    /// Failure inside the PNG/JPEG codec.
    #[error("image codec failed: {0}")]
    Codec(#[from] ::image::ImageError),

    /// Underlying read/write failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the sketch scheduler's hook registry.
#[derive(Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum SketchError {
    /// The receiver already has a handler for this hook kind.
    #[error("{receiver} is already registered for {kind:?}")]
    AlreadyRegistered { kind: HookKind, receiver: String },

    /// The handler's shape does not match what the hook kind calls.
    #[error("{receiver} has no {kind:?} handler with signature {expected}")]
    SignatureMismatch {
        kind: HookKind,
        receiver: String,
        expected: &'static str,
    },

    /// Nothing has ever been registered for this hook kind.
    #[error("no registered handlers for {0:?}; nothing to unregister")]
    NotRegistered(HookKind),
}

pub type ImageResult<T, E = ImageError> = std::result::Result<T, E>;
pub type SketchResult<T, E = SketchError> = std::result::Result<T, E>;
