//! Typed hook registry
//!
//! Libraries attach behaviour to a sketch by registering closures against a
//! hook kind. Each kind calls its handlers with a fixed shape, and a receiver
//! may hold at most one handler per kind. Handlers run in registration order.

use std::collections::HashMap;
use std::fmt;

use log::debug;

use super::event::{KeyEvent, MouseEvent, TouchEvent};
use super::renderer::Renderer;
use crate::error::{SketchError, SketchResult};

/// The points in the sketch lifecycle a handler can attach to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Before `draw()`, drawing allowed
    Pre,
    /// After `draw()` and event dispatch, drawing allowed
    Draw,
    /// After the frame has ended, no drawing
    Post,
    Pause,
    Resume,
    Dispose,
    MouseEvent,
    KeyEvent,
    TouchEvent,
    ActivityResult,
    NewIntent,
}

impl HookKind {
    /// Closure shape this kind calls
    pub fn signature(self) -> &'static str {
        match self {
            Self::Pre | Self::Draw => Hook::FRAME,
            Self::Post | Self::Pause | Self::Resume | Self::Dispose => Hook::LIFECYCLE,
            Self::MouseEvent => Hook::MOUSE,
            Self::KeyEvent => Hook::KEY,
            Self::TouchEvent => Hook::TOUCH,
            Self::ActivityResult => Hook::ACTIVITY_RESULT,
            Self::NewIntent => Hook::NEW_INTENT,
        }
    }
}

/// A registered handler
pub enum Hook {
    Frame(Box<dyn FnMut(&mut dyn Renderer)>),
    Lifecycle(Box<dyn FnMut()>),
    Mouse(Box<dyn FnMut(&MouseEvent)>),
    Key(Box<dyn FnMut(&KeyEvent)>),
    Touch(Box<dyn FnMut(&TouchEvent)>),
    /// `(request_code, result_code)`
    ActivityResult(Box<dyn FnMut(i32, i32)>),
    /// Intent action string
    NewIntent(Box<dyn FnMut(&str)>),
}

impl Hook {
    const FRAME: &'static str = "fn(&mut dyn Renderer)";
    const LIFECYCLE: &'static str = "fn()";
    const MOUSE: &'static str = "fn(&MouseEvent)";
    const KEY: &'static str = "fn(&KeyEvent)";
    const TOUCH: &'static str = "fn(&TouchEvent)";
    const ACTIVITY_RESULT: &'static str = "fn(i32, i32)";
    const NEW_INTENT: &'static str = "fn(&str)";

    pub fn frame(f: impl FnMut(&mut dyn Renderer) + 'static) -> Self {
        Self::Frame(Box::new(f))
    }

    pub fn lifecycle(f: impl FnMut() + 'static) -> Self {
        Self::Lifecycle(Box::new(f))
    }

    pub fn mouse(f: impl FnMut(&MouseEvent) + 'static) -> Self {
        Self::Mouse(Box::new(f))
    }

    pub fn key(f: impl FnMut(&KeyEvent) + 'static) -> Self {
        Self::Key(Box::new(f))
    }

    pub fn touch(f: impl FnMut(&TouchEvent) + 'static) -> Self {
        Self::Touch(Box::new(f))
    }

    pub fn activity_result(f: impl FnMut(i32, i32) + 'static) -> Self {
        Self::ActivityResult(Box::new(f))
    }

    pub fn new_intent(f: impl FnMut(&str) + 'static) -> Self {
        Self::NewIntent(Box::new(f))
    }

    pub fn signature(&self) -> &'static str {
        match self {
            Self::Frame(_) => Self::FRAME,
            Self::Lifecycle(_) => Self::LIFECYCLE,
            Self::Mouse(_) => Self::MOUSE,
            Self::Key(_) => Self::KEY,
            Self::Touch(_) => Self::TOUCH,
            Self::ActivityResult(_) => Self::ACTIVITY_RESULT,
            Self::NewIntent(_) => Self::NEW_INTENT,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.signature())
    }
}

/// Kind -> ordered `(receiver, handler)` list
#[derive(Debug, Default)]
pub struct Registry {
    table: HashMap<HookKind, Vec<(String, Hook)>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `hook` for `receiver` under `kind`.
    ///
    /// Fails if the receiver already has a handler for this kind, or if the
    /// handler's shape does not match what the kind calls.
    pub fn register(
        &mut self,
        kind: HookKind,
        receiver: impl Into<String>,
        hook: Hook,
    ) -> SketchResult<()> {
        let receiver = receiver.into();
        if hook.signature() != kind.signature() {
            return Err(SketchError::SignatureMismatch {
                kind,
                receiver,
                expected: kind.signature(),
            });
        }
        let entries = self.table.entry(kind).or_default();
        if entries.iter().any(|(r, _)| *r == receiver) {
            return Err(SketchError::AlreadyRegistered { kind, receiver });
        }
        debug!("registered {receiver} for {kind:?}");
        entries.push((receiver, hook));
        Ok(())
    }

    /// Detach `receiver` from `kind`.
    ///
    /// Fails only if nothing was ever registered for `kind`; an unknown
    /// receiver is ignored.
    pub fn unregister(&mut self, kind: HookKind, receiver: &str) -> SketchResult<()> {
        let entries = self
            .table
            .get_mut(&kind)
            .ok_or(SketchError::NotRegistered(kind))?;
        entries.retain(|(r, _)| r != receiver);
        Ok(())
    }

    pub fn len(&self, kind: HookKind) -> usize {
        self.table.get(&kind).map_or(0, Vec::len)
    }

    fn each(&mut self, kind: HookKind) -> impl Iterator<Item = &mut Hook> {
        self.table
            .get_mut(&kind)
            .into_iter()
            .flat_map(|entries| entries.iter_mut().map(|(_, hook)| hook))
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    pub(crate) fn run_frame(&mut self, kind: HookKind, renderer: &mut dyn Renderer) {
        for hook in self.each(kind) {
            if let Hook::Frame(f) = hook {
                f(renderer);
            }
        }
    }

    pub(crate) fn run_lifecycle(&mut self, kind: HookKind) {
        for hook in self.each(kind) {
            if let Hook::Lifecycle(f) = hook {
                f();
            }
        }
    }

    pub(crate) fn run_mouse(&mut self, event: &MouseEvent) {
        for hook in self.each(HookKind::MouseEvent) {
            if let Hook::Mouse(f) = hook {
                f(event);
            }
        }
    }

    pub(crate) fn run_key(&mut self, event: &KeyEvent) {
        for hook in self.each(HookKind::KeyEvent) {
            if let Hook::Key(f) = hook {
                f(event);
            }
        }
    }

    pub(crate) fn run_touch(&mut self, event: &TouchEvent) {
        for hook in self.each(HookKind::TouchEvent) {
            if let Hook::Touch(f) = hook {
                f(event);
            }
        }
    }

    pub(crate) fn run_activity_result(&mut self, request: i32, result: i32) {
        for hook in self.each(HookKind::ActivityResult) {
            if let Hook::ActivityResult(f) = hook {
                f(request, result);
            }
        }
    }

    pub(crate) fn run_new_intent(&mut self, action: &str) {
        for hook in self.each(HookKind::NewIntent) {
            if let Hook::NewIntent(f) = hook {
                f(action);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = Registry::new();
        registry
            .register(HookKind::Post, "lib", Hook::lifecycle(|| {}))
            .unwrap();
        let err = registry
            .register(HookKind::Post, "lib", Hook::lifecycle(|| {}))
            .unwrap_err();
        assert_eq!(
            err,
            SketchError::AlreadyRegistered {
                kind: HookKind::Post,
                receiver: "lib".into()
            }
        );
        // Same receiver under a different kind is fine
        registry
            .register(HookKind::Pause, "lib", Hook::lifecycle(|| {}))
            .unwrap();
    }

    #[test]
    fn test_signature_mismatch_fails() {
        let mut registry = Registry::new();
        let err = registry
            .register(HookKind::MouseEvent, "lib", Hook::key(|_| {}))
            .unwrap_err();
        assert!(matches!(
            err,
            SketchError::SignatureMismatch { kind: HookKind::MouseEvent, expected: "fn(&MouseEvent)", .. }
        ));
        assert_eq!(registry.len(HookKind::MouseEvent), 0);
    }

    #[test]
    fn test_unregister_policy_is_asymmetric() {
        let mut registry = Registry::new();
        assert_eq!(
            registry.unregister(HookKind::Dispose, "lib"),
            Err(SketchError::NotRegistered(HookKind::Dispose))
        );
        registry
            .register(HookKind::Dispose, "lib", Hook::lifecycle(|| {}))
            .unwrap();
        assert_eq!(registry.unregister(HookKind::Dispose, "other"), Ok(()));
        assert_eq!(registry.len(HookKind::Dispose), 1);
        assert_eq!(registry.unregister(HookKind::Dispose, "lib"), Ok(()));
        assert_eq!(registry.len(HookKind::Dispose), 0);
        // Kind stays known after its last receiver left
        assert_eq!(registry.unregister(HookKind::Dispose, "lib"), Ok(()));
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = Registry::new();
        for name in ["a", "b", "c"] {
            let log = Rc::clone(&log);
            registry
                .register(HookKind::Pause, name, Hook::lifecycle(move || log.borrow_mut().push(name)))
                .unwrap();
        }
        registry.unregister(HookKind::Pause, "b").unwrap();
        registry.run_lifecycle(HookKind::Pause);
        registry.run_lifecycle(HookKind::Resume);
        assert_eq!(*log.borrow(), vec!["a", "c"]);
    }

    #[test]
    fn test_event_hooks_receive_arguments() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut registry = Registry::new();
        let s = Rc::clone(&seen);
        registry
            .register(
                HookKind::ActivityResult,
                "lib",
                Hook::activity_result(move |req, res| s.borrow_mut().push(format!("{req}:{res}"))),
            )
            .unwrap();
        let s = Rc::clone(&seen);
        registry
            .register(
                HookKind::NewIntent,
                "lib",
                Hook::new_intent(move |action| s.borrow_mut().push(action.to_string())),
            )
            .unwrap();
        registry.run_activity_result(7, -1);
        registry.run_new_intent("VIEW");
        assert_eq!(*seen.borrow(), vec!["7:-1".to_string(), "VIEW".to_string()]);
    }
}
