mod demo;
mod display;

use std::cell::RefCell;
use std::rc::Rc;

use display::{Display, HostEvent, RenderTarget};
use log::{info, warn};
use pixelsketch::sketch::{
    self, AnimationControl, FrameTimer, HeadlessHost, Hook, HookKind, Renderer, SoftwareRenderer,
};
use pixelsketch::{SketchConfig, SketchLoop};

/// Frames between stats lines in the log
const STATS_INTERVAL: u64 = 300;

/// Parse command line arguments into a run configuration.
/// `--config` is read first; the other flags override it.
fn parse_args() -> SketchConfig {
    let args: Vec<String> = std::env::args().collect();

    let mut config = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|path| {
            SketchConfig::load(path).unwrap_or_else(|e| {
                warn!("could not load config {path}: {e}");
                SketchConfig::default()
            })
        })
        .unwrap_or_default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--no-vsync" => config.vsync = false,
            "--config" => i += 1,
            "--width" | "-w" => {
                if i + 1 < args.len() {
                    if let Ok(w) = args[i + 1].parse::<u32>() {
                        config.width = w;
                    }
                    i += 1;
                }
            },
            "--height" | "-h" => {
                if i + 1 < args.len() {
                    if let Ok(h) = args[i + 1].parse::<u32>() {
                        config.height = h;
                    }
                    i += 1;
                }
            },
            "--resolution" | "-r" => {
                if i + 1 < args.len() {
                    // Parse WxH format (e.g., 1280x720)
                    let parts: Vec<&str> = args[i + 1].split('x').collect();
                    if parts.len() == 2 {
                        if let (Ok(w), Ok(h)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>()) {
                            config.width = w;
                            config.height = h;
                        }
                    }
                    i += 1;
                }
            },
            "--density" => {
                if i + 1 < args.len() {
                    if let Ok(d) = args[i + 1].parse::<u32>() {
                        config.pixel_density = d.max(1);
                    }
                    i += 1;
                }
            },
            "--fps" => {
                if i + 1 < args.len() {
                    if let Ok(fps) = args[i + 1].parse::<f32>() {
                        config.frame_rate = fps;
                    }
                    i += 1;
                }
            },
            "--seed" => {
                if i + 1 < args.len() {
                    if let Ok(seed) = args[i + 1].parse::<u64>() {
                        config.random_seed = Some(seed);
                        config.noise_seed = Some(seed);
                    }
                    i += 1;
                }
            },
            "--help" => {
                let defaults = SketchConfig::default();
                println!("Usage: pixelsketch [OPTIONS]");
                println!();
                println!("Options:");
                println!("  --config PATH         Load settings from a JSON file");
                println!("  --width W, -w W       Set window width (default: {})", defaults.width);
                println!("  --height H, -h H      Set window height (default: {})", defaults.height);
                println!("  --resolution WxH, -r WxH  Set resolution (e.g., 1280x720)");
                println!("  --density N           Backing-store pixels per window pixel (default: 1)");
                println!("  --fps N               Target frame rate (default: {})", defaults.frame_rate);
                println!("  --seed N              Seed random and noise for a repeatable run");
                println!("  --no-vsync            Disable VSync");
                println!("  --help                Show this help message");
                std::process::exit(0);
            },
            _ => {},
        }
        i += 1;
    }

    config
}

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = parse_args();
    let (width, height, density) = (config.width, config.height, config.pixel_density);
    info!("starting {width}x{height} @{density}x, {} fps target", config.frame_rate);

    let (mut display, texture_creator) =
        Display::with_options("pixelsketch", width, height, config.vsync)?;
    let mut target = RenderTarget::with_size(&texture_creator, width * density, height * density)?;

    let renderer = SoftwareRenderer::with_density(width, height, density);
    let host = HeadlessHost::new(display.width(), display.height());
    let painter = demo::Painter::new(&config.data_dir);
    let mut sketch_loop = SketchLoop::from_config(painter, host, &config).with_renderer(renderer);
    sketch_loop.surface_changed(width, height);

    // Frame timing with 60 sample rolling window
    let timer = Rc::new(RefCell::new(FrameTimer::new(60)));
    let post_timer = Rc::clone(&timer);
    sketch_loop
        .register(
            HookKind::Post,
            "frame-timer",
            Hook::lifecycle(move || {
                post_timer.borrow_mut().tick();
            }),
        )
        .map_err(|e| e.to_string())?;

    let control = AnimationControl::new();
    let mut result = Ok(());
    let mut iterations: u64 = 0;

    sketch::run(&mut sketch_loop, &control, |sl| {
        for event in display.poll_events() {
            match event {
                HostEvent::Quit => return false,
                HostEvent::Pause => sl.on_pause(),
                HostEvent::Resume => sl.on_resume(),
                HostEvent::Input(input) => sl.post_event(input),
            }
        }
        sl.pump();

        if let Some(renderer) = sl.renderer() {
            if let Err(e) = display.present(&mut target, renderer.canvas()) {
                result = Err(e);
                return false;
            }
        }

        iterations += 1;
        if iterations % STATS_INTERVAL == 0 {
            let timer = timer.borrow();
            let (min_fps, max_fps) = timer.min_max_fps();
            info!(
                "frame {}: {:.1} fps (sketch {:.1}), {:.2} ms avg, min {:.1} max {:.1}",
                sl.frame_count(),
                timer.average_fps(),
                sl.frame_rate(),
                timer.avg_frame_time_ms(),
                min_fps,
                max_fps
            );
        }
        true
    });

    sketch_loop.on_destroy();

    let (p1, p50, p99) = timer.borrow().percentiles_ms();
    info!("frame times: p1 {p1:.2} ms, p50 {p50:.2} ms, p99 {p99:.2} ms");
    result
}
