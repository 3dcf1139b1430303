//! SDL2 window host
//!
//! Presents a sketch canvas through a streaming texture and translates SDL
//! input into sketch events.

use pixelsketch::sketch::{
    Event as SketchEvent, KeyAction, KeyCode, KeyEvent, Modifiers, MouseAction,
    MouseButton as SketchButton, MouseEvent, TouchAction, TouchEvent, TouchPointer,
};
use pixelsketch::PixelBuffer;
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::{Keycode, Mod, Scancode};
use sdl2::mouse::{MouseButton, MouseState};
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, Texture, TextureCreator};
use sdl2::video::{Window, WindowContext};
use sdl2::EventPump;

pub struct Display {
    canvas: Canvas<Window>,
    event_pump: EventPump,
    width: u32,
    height: u32,
    last_mouse: (f32, f32),
}

pub struct RenderTarget<'a> {
    texture: Texture<'a>,
    width: u32,
    height: u32,
}

/// What the window reports to the host loop
#[derive(Debug, Clone)]
pub enum HostEvent {
    Quit,
    Pause,
    Resume,
    Input(SketchEvent),
}

impl Display {
    /// Create display with custom resolution and VSync settings
    /// vsync=true: locked to monitor refresh (typically 60fps)
    /// vsync=false: paced by the sketch frame rate only
    pub fn with_options(
        title: &str,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<(Self, TextureCreator<WindowContext>), String> {
        // Touch is turned into mouse events by the sketch queue itself
        sdl2::hint::set("SDL_TOUCH_MOUSE_EVENTS", "0");

        let sdl_context = sdl2::init()?;
        let video_subsystem = sdl_context.video()?;

        let window = video_subsystem
            .window(title, width, height)
            .position_centered()
            .build()
            .map_err(|e| e.to_string())?;

        let mut canvas_builder = window.into_canvas().accelerated();
        if vsync {
            canvas_builder = canvas_builder.present_vsync();
        }
        let canvas = canvas_builder.build().map_err(|e| e.to_string())?;

        let texture_creator = canvas.texture_creator();
        let event_pump = sdl_context.event_pump()?;

        Ok((
            Self {
                canvas,
                event_pump,
                width,
                height,
                last_mouse: (0.0, 0.0),
            },
            texture_creator,
        ))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Upload the canvas backing store and flip
    pub fn present(&mut self, target: &mut RenderTarget, canvas: &PixelBuffer) -> Result<(), String> {
        let width = canvas.pixel_width().min(target.width) as usize;
        let rows = canvas.pixel_height().min(target.height) as usize;
        let src_stride = canvas.pixel_width() as usize;
        let pixels = canvas.pixels();

        target.texture.with_lock(None, |bytes, pitch| {
            for (y, row) in bytes.chunks_mut(pitch).take(rows).enumerate() {
                let src = &pixels[y * src_stride..y * src_stride + width];
                for (dst, &p) in row.chunks_exact_mut(4).zip(src) {
                    dst.copy_from_slice(&p.to_ne_bytes());
                }
            }
        })?;

        self.canvas.copy(&target.texture, None, None)?;
        self.canvas.present();
        Ok(())
    }

    pub fn poll_events(&mut self) -> Vec<HostEvent> {
        let mut events = Vec::new();
        let (w, h) = (self.width as f32, self.height as f32);

        for event in self.event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => events.push(HostEvent::Quit),
                Event::Window { win_event, .. } => match win_event {
                    WindowEvent::FocusLost => events.push(HostEvent::Pause),
                    WindowEvent::FocusGained => events.push(HostEvent::Resume),
                    WindowEvent::Enter => events.push(mouse(MouseAction::Enter, self.last_mouse, SketchButton::None)),
                    WindowEvent::Leave => events.push(mouse(MouseAction::Exit, self.last_mouse, SketchButton::None)),
                    _ => {},
                },
                Event::KeyDown {
                    keycode: Some(k),
                    scancode,
                    keymod,
                    repeat,
                    ..
                } => {
                    let mut key = key_event(KeyAction::Press, k, scancode, keymod);
                    key.is_auto_repeat = repeat;
                    events.push(HostEvent::Input(key.into()));
                },
                Event::KeyUp {
                    keycode: Some(k),
                    scancode,
                    keymod,
                    ..
                } => events.push(HostEvent::Input(key_event(KeyAction::Release, k, scancode, keymod).into())),
                Event::TextInput { text, .. } => {
                    for c in text.chars() {
                        let typed = KeyEvent::new(KeyAction::Type, Some(c), KeyCode::None);
                        events.push(HostEvent::Input(typed.into()));
                    }
                },
                Event::MouseMotion { x, y, mousestate, .. } => {
                    self.last_mouse = (x as f32, y as f32);
                    let action = if any_button(mousestate) {
                        MouseAction::Drag
                    } else {
                        MouseAction::Move
                    };
                    events.push(mouse(action, self.last_mouse, SketchButton::None));
                },
                Event::MouseButtonDown { x, y, mouse_btn, .. } => {
                    if let Some(button) = map_mouse_button(mouse_btn) {
                        self.last_mouse = (x as f32, y as f32);
                        events.push(mouse(MouseAction::Press, self.last_mouse, button));
                    }
                },
                Event::MouseButtonUp {
                    x, y, mouse_btn, clicks, ..
                } => {
                    if let Some(button) = map_mouse_button(mouse_btn) {
                        self.last_mouse = (x as f32, y as f32);
                        events.push(mouse(MouseAction::Release, self.last_mouse, button));
                        let (x, y) = self.last_mouse;
                        let click = MouseEvent {
                            count: i32::from(clicks),
                            ..MouseEvent::new(MouseAction::Click, x, y, button)
                        };
                        events.push(HostEvent::Input(click.into()));
                    }
                },
                Event::MouseWheel { y, .. } => {
                    // SDL counts away from the user as positive
                    let wheel = MouseEvent::wheel(self.last_mouse.0, self.last_mouse.1, -y);
                    events.push(HostEvent::Input(wheel.into()));
                },
                Event::FingerDown {
                    finger_id, x, y, pressure, ..
                } => events.push(touch(TouchAction::Start, finger_id, x * w, y * h, pressure)),
                Event::FingerMotion {
                    finger_id, x, y, pressure, ..
                } => events.push(touch(TouchAction::Move, finger_id, x * w, y * h, pressure)),
                Event::FingerUp {
                    finger_id, x, y, pressure, ..
                } => events.push(touch(TouchAction::End, finger_id, x * w, y * h, pressure)),
                _ => {},
            }
        }

        events
    }
}

impl<'a> RenderTarget<'a> {
    /// Create render target with custom resolution
    pub fn with_size(
        texture_creator: &'a TextureCreator<WindowContext>,
        width: u32,
        height: u32,
    ) -> Result<Self, String> {
        let texture = texture_creator
            .create_texture_streaming(PixelFormatEnum::ARGB8888, width, height)
            .map_err(|e| e.to_string())?;
        Ok(Self {
            texture,
            width,
            height,
        })
    }
}

fn mouse(action: MouseAction, (x, y): (f32, f32), button: SketchButton) -> HostEvent {
    HostEvent::Input(MouseEvent::new(action, x, y, button).into())
}

fn touch(action: TouchAction, finger_id: i64, x: f32, y: f32, pressure: f32) -> HostEvent {
    let pointer = TouchPointer {
        id: finger_id as i32,
        x,
        y,
        size: 1.0,
        pressure,
    };
    HostEvent::Input(TouchEvent::new(action, vec![pointer]).into())
}

fn any_button(state: MouseState) -> bool {
    state.left() || state.right() || state.middle()
}

fn map_mouse_button(btn: MouseButton) -> Option<SketchButton> {
    match btn {
        MouseButton::Left => Some(SketchButton::Left),
        MouseButton::Right => Some(SketchButton::Right),
        MouseButton::Middle => Some(SketchButton::Center),
        _ => None,
    }
}

fn key_event(action: KeyAction, k: Keycode, scancode: Option<Scancode>, keymod: Mod) -> KeyEvent {
    let code = match k {
        Keycode::Escape | Keycode::AcBack => KeyCode::Back,
        Keycode::Menu | Keycode::Application => KeyCode::Menu,
        Keycode::Up => KeyCode::Up,
        Keycode::Down => KeyCode::Down,
        Keycode::Left => KeyCode::Left,
        Keycode::Right => KeyCode::Right,
        Keycode::LShift | Keycode::RShift => KeyCode::Shift,
        Keycode::LCtrl | Keycode::RCtrl => KeyCode::Control,
        Keycode::LAlt | Keycode::RAlt => KeyCode::Alt,
        _ => KeyCode::None,
    };
    let key = if code == KeyCode::None { key_char(k) } else { None };
    let code = match (code, key) {
        (KeyCode::None, None) => scancode.map_or(KeyCode::None, |s| KeyCode::Other(s as i32)),
        (code, _) => code,
    };

    let mut modifiers = Modifiers::NONE;
    if keymod.intersects(Mod::LSHIFTMOD | Mod::RSHIFTMOD) {
        modifiers = modifiers | Modifiers::SHIFT;
    }
    if keymod.intersects(Mod::LCTRLMOD | Mod::RCTRLMOD) {
        modifiers = modifiers | Modifiers::CTRL;
    }
    if keymod.intersects(Mod::LALTMOD | Mod::RALTMOD) {
        modifiers = modifiers | Modifiers::ALT;
    }
    if keymod.intersects(Mod::LGUIMOD | Mod::RGUIMOD) {
        modifiers = modifiers | Modifiers::META;
    }

    KeyEvent {
        modifiers,
        ..KeyEvent::new(action, key, code)
    }
}

/// Printable character for a key, from its SDL name
fn key_char(k: Keycode) -> Option<char> {
    if k == Keycode::Space {
        return Some(' ');
    }
    let name = k.name();
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c.to_ascii_lowercase()),
        _ => None,
    }
}
