//! Sketch scheduler
//!
//! A host drives [`SketchLoop::handle_draw`] once per frame and forwards
//! input and lifecycle callbacks; the loop turns them into calls on a
//! user [`Sketch`]. Input events are queued and dispatched after `draw()`.

mod animation;
mod event;
mod registry;
mod renderer;
mod scheduler;

pub use animation::{run, AnimationControl, AnimationThread, FramePacer, FrameTimer, Pace};
pub use event::{
    Event, EventQueue, EventSender, KeyAction, KeyCode, KeyEvent, Modifiers, MouseAction,
    MouseButton, MouseEvent, TouchAction, TouchEvent, TouchPointer,
};
pub use registry::{Hook, HookKind, Registry};
pub use renderer::{HeadlessHost, Host, Renderer, SoftwareRenderer};
pub use scheduler::{Context, Sketch, SketchLoop};
