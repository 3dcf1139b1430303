//! Painter - the demo sketch
//!
//! Paints a soft brush wherever the mouse is held down, compositing it with
//! the selected blend mode over a noise background.
//!
//! Keys:
//! - `1`..`0`, `-`, `=`, `[`, `]`, `\`: pick one of the 15 blend modes
//! - `b` blur, `g` gray, `i` invert, `p` posterize, `t` threshold,
//!   `e` erode, `d` dilate
//! - `s`: save a PNG snapshot
//! - `r`: new background
//! - space: pause or resume drawing
//! - mouse wheel: brush size

use std::sync::Arc;

use log::{info, warn};
use pixelsketch::image::{argb, Filter};
use pixelsketch::loader::{AsyncImageLoader, DirectorySource, ImageRequest};
use pixelsketch::sketch::{Context, KeyEvent, MouseEvent, Sketch};
use pixelsketch::{BlendMode, Format, PixelBuffer};

const MODE_KEYS: [char; 15] = ['1', '2', '3', '4', '5', '6', '7', '8', '9', '0', '-', '=', '[', ']', '\\'];

const MIN_BRUSH: u32 = 4;
const MAX_BRUSH: u32 = 256;

pub struct Painter {
    loader: AsyncImageLoader,
    pending: Option<ImageRequest>,
    stamp: Option<PixelBuffer>,
    brush: PixelBuffer,
    brush_size: u32,
    color: u32,
    mode: BlendMode,
    snapshots: u32,
}

impl Painter {
    pub fn new(data_dir: &str) -> Self {
        let brush_size = 48;
        Self {
            loader: AsyncImageLoader::new(Arc::new(DirectorySource::new(data_dir))),
            pending: None,
            stamp: None,
            brush: radial_brush(brush_size, 0x00ff_b040),
            brush_size,
            color: 0x00ff_b040,
            mode: BlendMode::Blend,
            snapshots: 0,
        }
    }

    fn paint_background(&self, ctx: &mut Context<'_>) {
        let (w, h) = {
            let canvas = ctx.canvas();
            (canvas.pixel_width() as usize, canvas.pixel_height() as usize)
        };
        let scale = 0.006;
        let mut pixels = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                let n = ctx.noise().noise2(x as f32 * scale, y as f32 * scale);
                let v = (n * 255.0) as u8;
                pixels.push(argb(255, v / 3, v / 2, v));
            }
        }
        let canvas = ctx.canvas();
        canvas.pixels_mut().copy_from_slice(&pixels);
        canvas.update_pixels();
    }

    fn poll_stamp(&mut self) {
        let Some(request) = self.pending.take() else {
            return;
        };
        match request.try_take() {
            Ok(Ok(image)) => {
                info!("brush stamp loaded: {}x{}", image.width(), image.height());
                self.stamp = Some(image);
            },
            Ok(Err(e)) => warn!("no brush stamp, using the radial brush: {e}"),
            Err(request) => self.pending = Some(request),
        }
    }

    fn set_brush_size(&mut self, size: u32) {
        self.brush_size = size.clamp(MIN_BRUSH, MAX_BRUSH);
        self.brush = radial_brush(self.brush_size, self.color);
    }

    fn apply(&mut self, ctx: &mut Context<'_>, filter: Filter, param: Option<f32>) {
        let canvas = ctx.canvas();
        let result = match param {
            Some(p) => canvas.filter_with(filter, p),
            None => canvas.filter(filter),
        };
        match result {
            Ok(()) => info!("applied {}", filter.name()),
            Err(e) => warn!("{} failed: {e}", filter.name()),
        }
    }
}

impl Sketch for Painter {
    fn setup(&mut self, ctx: &mut Context<'_>) {
        self.paint_background(ctx);
        self.pending = Some(self.loader.request_image("brush.png"));
        info!("painting with {}", self.mode.name());
    }

    fn draw(&mut self, ctx: &mut Context<'_>) {
        self.poll_stamp();
        if !ctx.mouse_pressed() {
            return;
        }

        let density = ctx.canvas().pixel_density() as f32;
        let (mx, my) = (ctx.mouse_x() * density, ctx.mouse_y() * density);
        let size = (self.brush_size as f32 * density) as i32;
        let (dx, dy) = (mx as i32 - size / 2, my as i32 - size / 2);

        let brush = self.stamp.as_ref().unwrap_or(&self.brush);
        let (bw, bh) = (brush.pixel_width() as i32, brush.pixel_height() as i32);
        ctx.canvas().blend(brush, 0, 0, bw, bh, dx, dy, size, size, self.mode);
    }

    fn mouse_wheel(&mut self, _ctx: &mut Context<'_>, event: &MouseEvent) {
        let step = 4 * event.count.unsigned_abs();
        let size = if event.count < 0 {
            self.brush_size + step
        } else {
            self.brush_size.saturating_sub(step)
        };
        self.set_brush_size(size);
    }

    fn mouse_pressed(&mut self, ctx: &mut Context<'_>, _event: &MouseEvent) {
        let hue = ctx.random().range_i32(0, 0x00ff_ffff) as u32;
        self.color = hue | 0x0040_4040;
        self.brush = radial_brush(self.brush_size, self.color);
    }

    fn key_pressed(&mut self, ctx: &mut Context<'_>, event: &KeyEvent) {
        let Some(key) = event.key else {
            return;
        };

        if let Some(i) = MODE_KEYS.iter().position(|&k| k == key) {
            self.mode = BlendMode::ALL[i];
            info!("blend mode: {}", self.mode.name());
            return;
        }

        match key {
            'b' => self.apply(ctx, Filter::Blur, Some(2.0)),
            'g' => self.apply(ctx, Filter::Gray, None),
            'i' => self.apply(ctx, Filter::Invert, None),
            'p' => self.apply(ctx, Filter::Posterize, Some(4.0)),
            't' => self.apply(ctx, Filter::Threshold, None),
            'e' => self.apply(ctx, Filter::Erode, None),
            'd' => self.apply(ctx, Filter::Dilate, None),
            's' => {
                self.snapshots += 1;
                let name = format!("pixelsketch-{:04}.png", self.snapshots);
                match ctx.canvas().save(&name) {
                    Ok(path) => info!("saved {}", path.display()),
                    Err(e) => warn!("save failed: {e}"),
                }
            },
            'r' => {
                let seed = ctx.random().next_u64();
                ctx.noise().set_seed(seed);
                self.paint_background(ctx);
                ctx.redraw();
            },
            ' ' => {
                if ctx.is_looping() {
                    ctx.no_loop();
                } else {
                    ctx.start_loop();
                }
            },
            _ => {},
        }
    }

    fn back_pressed(&mut self, _ctx: &mut Context<'_>) -> bool {
        false
    }

    fn pause(&mut self, _ctx: &mut Context<'_>) {
        info!("paused");
    }

    fn resume(&mut self, _ctx: &mut Context<'_>) {
        info!("resumed");
    }

    fn dispose(&mut self, ctx: &mut Context<'_>) {
        info!("painter closed after {} frames", ctx.frame_count());
    }
}

/// Round brush with alpha falling off toward the edge
fn radial_brush(size: u32, rgb: u32) -> PixelBuffer {
    let mut brush = PixelBuffer::new(size, size, Format::Argb);
    let r = size as f32 / 2.0;
    for y in 0..size as i32 {
        for x in 0..size as i32 {
            let dx = x as f32 + 0.5 - r;
            let dy = y as f32 + 0.5 - r;
            let d = (dx * dx + dy * dy).sqrt() / r;
            let a = ((1.0 - d).max(0.0) * 255.0) as u32;
            brush.set(x, y, (a << 24) | (rgb & 0x00ff_ffff));
        }
    }
    brush
}
