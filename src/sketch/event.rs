//! Input events and the shared event queue
//!
//! Hosts post events from whatever thread receives them. The scheduler
//! drains the queue on its own thread, after the user's `draw()`, in the
//! order the events arrived.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// ============================================================================
// Modifiers & buttons
// ============================================================================

/// Modifier keys held while an event fired (bit set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Self = Self(0);
    pub const SHIFT: Self = Self(1);
    pub const CTRL: Self = Self(1 << 1);
    pub const META: Self = Self(1 << 2);
    pub const ALT: Self = Self(1 << 3);

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MouseButton {
    #[default]
    None,
    Left,
    Center,
    Right,
}

// ============================================================================
// Mouse
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseAction {
    Press,
    Release,
    Click,
    Drag,
    Move,
    Enter,
    Exit,
    Wheel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MouseEvent {
    pub action: MouseAction,
    pub x: f32,
    pub y: f32,
    pub button: MouseButton,
    pub modifiers: Modifiers,
    /// Click count, or wheel steps (negative is away from the user)
    pub count: i32,
}

impl MouseEvent {
    pub fn new(action: MouseAction, x: f32, y: f32, button: MouseButton) -> Self {
        Self {
            action,
            x,
            y,
            button,
            modifiers: Modifiers::NONE,
            count: 1,
        }
    }

    pub fn wheel(x: f32, y: f32, steps: i32) -> Self {
        Self {
            count: steps,
            ..Self::new(MouseAction::Wheel, x, y, MouseButton::None)
        }
    }

    /// Press, drag and move carry a new pointer position
    #[inline]
    pub fn moves_pointer(&self) -> bool {
        matches!(
            self.action,
            MouseAction::Press | MouseAction::Drag | MouseAction::Move
        )
    }
}

// ============================================================================
// Keyboard
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    Press,
    Release,
    Type,
}

/// Key codes for keys without a character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyCode {
    #[default]
    None,
    Back,
    Menu,
    Up,
    Down,
    Left,
    Right,
    Shift,
    Control,
    Alt,
    Other(i32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    pub action: KeyAction,
    /// Typed character, `None` for coded keys
    pub key: Option<char>,
    pub key_code: KeyCode,
    pub modifiers: Modifiers,
    pub is_auto_repeat: bool,
}

impl KeyEvent {
    pub fn new(action: KeyAction, key: Option<char>, key_code: KeyCode) -> Self {
        Self {
            action,
            key,
            key_code,
            modifiers: Modifiers::NONE,
            is_auto_repeat: false,
        }
    }

    pub fn back(action: KeyAction) -> Self {
        Self::new(action, None, KeyCode::Back)
    }

    #[inline]
    pub fn is_back(&self) -> bool {
        self.key_code == KeyCode::Back
    }
}

// ============================================================================
// Touch
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchAction {
    Start,
    End,
    Cancel,
    Move,
}

/// One finger of a touch event
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TouchPointer {
    pub id: i32,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub pressure: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TouchEvent {
    pub action: TouchAction,
    /// Active pointers; the first one is the primary pointer
    pub pointers: Vec<TouchPointer>,
    pub modifiers: Modifiers,
}

impl TouchEvent {
    pub fn new(action: TouchAction, pointers: Vec<TouchPointer>) -> Self {
        Self {
            action,
            pointers,
            modifiers: Modifiers::NONE,
        }
    }

    /// Single-finger event at `(x, y)`
    pub fn single(action: TouchAction, x: f32, y: f32) -> Self {
        Self::new(
            action,
            vec![TouchPointer {
                id: 0,
                x,
                y,
                size: 1.0,
                pressure: 1.0,
            }],
        )
    }

    #[inline]
    pub fn primary(&self) -> Option<&TouchPointer> {
        self.pointers.first()
    }

    /// Mouse events a touch screen host emits alongside this touch event
    ///
    /// Start presses, move drags, and end releases then clicks, all with the
    /// left button at the primary pointer. Cancel emits nothing.
    pub fn emulated_mouse(&self) -> Vec<MouseEvent> {
        let Some(p) = self.primary() else {
            return Vec::new();
        };
        let mouse = |action| MouseEvent {
            modifiers: self.modifiers,
            ..MouseEvent::new(action, p.x, p.y, MouseButton::Left)
        };
        match self.action {
            TouchAction::Start => vec![mouse(MouseAction::Press)],
            TouchAction::Move => vec![mouse(MouseAction::Drag)],
            TouchAction::End => vec![mouse(MouseAction::Release), mouse(MouseAction::Click)],
            TouchAction::Cancel => Vec::new(),
        }
    }
}

// ============================================================================
// Queue
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Mouse(MouseEvent),
    Key(KeyEvent),
    Touch(TouchEvent),
}

impl From<MouseEvent> for Event {
    fn from(e: MouseEvent) -> Self {
        Self::Mouse(e)
    }
}

impl From<KeyEvent> for Event {
    fn from(e: KeyEvent) -> Self {
        Self::Key(e)
    }
}

impl From<TouchEvent> for Event {
    fn from(e: TouchEvent) -> Self {
        Self::Touch(e)
    }
}

/// Unbounded FIFO shared between the host threads and the scheduler
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Arc<Mutex<VecDeque<Event>>>,
    touch_emulates_mouse: bool,
}

impl EventQueue {
    pub fn new(touch_emulates_mouse: bool) -> Self {
        Self {
            events: Arc::default(),
            touch_emulates_mouse,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Event>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an event; a touch event is followed by its emulated mouse events
    pub fn push(&self, event: Event) {
        let mut events = self.lock();
        if let (true, Event::Touch(touch)) = (self.touch_emulates_mouse, &event) {
            let mouse = touch.emulated_mouse();
            events.push_back(event);
            events.extend(mouse.into_iter().map(Event::Mouse));
        } else {
            events.push_back(event);
        }
    }

    pub fn pop(&self) -> Option<Event> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Cloneable handle for posting events from other threads
///
/// Events sent this way wait in the queue until the scheduler's thread
/// drains it, either inside `handle_draw` or in `pump`.
#[derive(Debug, Clone)]
pub struct EventSender {
    queue: EventQueue,
    back_press: Arc<AtomicBool>,
}

impl EventSender {
    pub(crate) fn new(queue: EventQueue, back_press: Arc<AtomicBool>) -> Self {
        Self { queue, back_press }
    }

    pub fn post(&self, event: impl Into<Event>) {
        self.queue.push(event.into());
    }

    /// Latch a back-button press; processed once at the end of the next frame
    pub fn back_pressed(&self) {
        self.back_press.store(true, Ordering::Release);
    }
}
