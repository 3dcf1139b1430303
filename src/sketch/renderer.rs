//! Renderer and host capabilities the scheduler drives
//!
//! The scheduler only needs to open and close frames, ask whether the
//! renderer is busy restoring its state, and negotiate `no_loop()`. Everything
//! a sketch draws goes through the canvas, a [`PixelBuffer`].

use std::collections::HashSet;

use log::{debug, info};

use crate::image::{Format, PixelBuffer};

pub trait Renderer {
    fn begin_frame(&mut self);

    fn end_frame(&mut self);

    /// True while the renderer rebuilds its state after a resume. The
    /// scheduler then runs an empty frame instead of `draw()`.
    fn is_restoring_state(&self) -> bool {
        false
    }

    /// The host has resumed the sketch; rebuild whatever a pause may have
    /// discarded
    fn restore_state(&mut self) {}

    /// Called from `no_loop()`. Return true to defer the stop until the
    /// current frame has reached the screen; the scheduler then stops on the
    /// next frame after an empty begin/end pass.
    fn request_no_loop(&mut self) -> bool {
        false
    }

    fn resize(&mut self, width: u32, height: u32);

    fn canvas(&self) -> &PixelBuffer;

    fn canvas_mut(&mut self) -> &mut PixelBuffer;
}

/// Renderer that draws straight into an owned ARGB canvas
#[derive(Debug)]
pub struct SoftwareRenderer {
    canvas: PixelBuffer,
    in_frame: bool,
    restoring: bool,
    defer_no_loop: bool,
    frames: u64,
}

impl SoftwareRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_density(width, height, 1)
    }

    pub fn with_density(width: u32, height: u32, density: u32) -> Self {
        Self {
            canvas: PixelBuffer::with_density(width, height, Format::Argb, density),
            in_frame: false,
            restoring: false,
            defer_no_loop: false,
            frames: 0,
        }
    }

    /// Defer `no_loop()` by one frame, the way a double-buffered GPU
    /// surface must
    pub fn defer_no_loop(mut self, defer: bool) -> Self {
        self.defer_no_loop = defer;
        self
    }

    /// Enter state restoration; cleared when the next frame ends
    pub fn begin_restore(&mut self) {
        self.restoring = true;
    }

    #[inline]
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// Completed begin/end pairs
    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Fill the whole canvas
    pub fn background(&mut self, color: u32) {
        self.canvas.fill(color);
    }
}

impl Renderer for SoftwareRenderer {
    fn begin_frame(&mut self) {
        self.in_frame = true;
    }

    fn end_frame(&mut self) {
        self.in_frame = false;
        self.restoring = false;
        self.frames += 1;
    }

    fn is_restoring_state(&self) -> bool {
        self.restoring
    }

    fn restore_state(&mut self) {
        self.begin_restore();
    }

    fn request_no_loop(&mut self) -> bool {
        self.defer_no_loop
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == self.canvas.width() && height == self.canvas.height() {
            return;
        }
        debug!("canvas resized to {width}x{height}");
        self.canvas = PixelBuffer::with_density(
            width,
            height,
            self.canvas.format(),
            self.canvas.pixel_density(),
        );
    }

    fn canvas(&self) -> &PixelBuffer {
        &self.canvas
    }

    fn canvas_mut(&mut self) -> &mut PixelBuffer {
        &mut self.canvas
    }
}

// ============================================================================
// Host
// ============================================================================

/// Services the embedding platform provides
pub trait Host {
    /// Ask the user for a batch of permissions. The answer comes back later
    /// through `SketchLoop::on_permissions_result`.
    fn request_permissions(&mut self, names: &[String]);

    fn has_permission(&self, name: &str) -> bool;

    /// Close the activity or window hosting the sketch
    fn finish(&mut self);

    fn display_width(&self) -> u32;

    fn display_height(&self) -> u32;

    fn display_density(&self) -> f32 {
        1.0
    }
}

/// Host with no platform behind it
///
/// Permission requests are recorded, grants are set explicitly.
#[derive(Debug, Default)]
pub struct HeadlessHost {
    width: u32,
    height: u32,
    granted: HashSet<String>,
    requests: Vec<Vec<String>>,
    finished: bool,
}

impl HeadlessHost {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn grant(&mut self, name: impl Into<String>) {
        self.granted.insert(name.into());
    }

    /// Every batch passed to `request_permissions`, oldest first
    pub fn permission_requests(&self) -> &[Vec<String>] {
        &self.requests
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Host for HeadlessHost {
    fn request_permissions(&mut self, names: &[String]) {
        info!("permission request: {}", names.join(", "));
        self.requests.push(names.to_vec());
    }

    fn has_permission(&self, name: &str) -> bool {
        self.granted.contains(name)
    }

    fn finish(&mut self) {
        self.finished = true;
    }

    fn display_width(&self) -> u32 {
        self.width
    }

    fn display_height(&self) -> u32 {
        self.height
    }
}
