//! Frame scheduler
//!
//! `SketchLoop` owns a user sketch, the renderer it draws into and the host
//! that embeds it. The host calls [`SketchLoop::handle_draw`] once per frame
//! from a single thread, and forwards lifecycle and input callbacks.
//! Input is queued and dispatched after the user's `draw()`, so handlers see
//! the frame that was just drawn and may draw for the next one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, trace};

use super::event::{
    Event, EventQueue, EventSender, KeyAction, KeyCode, KeyEvent, MouseAction, MouseButton,
    MouseEvent, TouchAction, TouchEvent, TouchPointer,
};
use super::registry::{Hook, HookKind, Registry};
use super::renderer::{HeadlessHost, Host, Renderer, SoftwareRenderer};
use crate::config::SketchConfig;
use crate::error::SketchResult;
use crate::image::PixelBuffer;
use crate::noise::Noise;
use crate::random::Random;

/// Weight of the newest frame in the frame-rate moving average
const FRAME_RATE_SMOOTHING: f32 = 0.1;

// ============================================================================
// Sketch
// ============================================================================

/// User code driven by the loop. Every method has an empty default.
#[allow(unused_variables)]
pub trait Sketch {
    /// Runs once, in place of `draw()`, on the first frame
    fn setup(&mut self, ctx: &mut Context<'_>) {}

    fn draw(&mut self, ctx: &mut Context<'_>) {}

    fn mouse_pressed(&mut self, ctx: &mut Context<'_>, event: &MouseEvent) {}
    fn mouse_released(&mut self, ctx: &mut Context<'_>, event: &MouseEvent) {}
    fn mouse_clicked(&mut self, ctx: &mut Context<'_>, event: &MouseEvent) {}
    fn mouse_dragged(&mut self, ctx: &mut Context<'_>, event: &MouseEvent) {}
    fn mouse_moved(&mut self, ctx: &mut Context<'_>, event: &MouseEvent) {}
    fn mouse_entered(&mut self, ctx: &mut Context<'_>, event: &MouseEvent) {}
    fn mouse_exited(&mut self, ctx: &mut Context<'_>, event: &MouseEvent) {}
    fn mouse_wheel(&mut self, ctx: &mut Context<'_>, event: &MouseEvent) {}

    fn key_pressed(&mut self, ctx: &mut Context<'_>, event: &KeyEvent) {}
    fn key_released(&mut self, ctx: &mut Context<'_>, event: &KeyEvent) {}
    fn key_typed(&mut self, ctx: &mut Context<'_>, event: &KeyEvent) {}

    fn touch_started(&mut self, ctx: &mut Context<'_>, event: &TouchEvent) {}
    fn touch_moved(&mut self, ctx: &mut Context<'_>, event: &TouchEvent) {}
    fn touch_ended(&mut self, ctx: &mut Context<'_>, event: &TouchEvent) {}
    fn touch_cancelled(&mut self, ctx: &mut Context<'_>, event: &TouchEvent) {}

    /// Return true to consume the back press. Unconsumed, it finishes the
    /// sketch.
    fn back_pressed(&mut self, ctx: &mut Context<'_>) -> bool {
        false
    }

    fn pause(&mut self, ctx: &mut Context<'_>) {}
    fn resume(&mut self, ctx: &mut Context<'_>) {}
    fn dispose(&mut self, ctx: &mut Context<'_>) {}

    fn on_activity_result(&mut self, ctx: &mut Context<'_>, request: i32, result: i32) {}
    fn on_new_intent(&mut self, ctx: &mut Context<'_>, action: &str) {}
    fn on_permission_result(&mut self, ctx: &mut Context<'_>, name: &str, granted: bool) {}
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug)]
struct LoopState {
    looping: bool,
    redraw: bool,
    requested_no_loop: bool,
    inside_draw: bool,
    frame_count: u64,
    frame_rate: f32,
    frame_rate_last: Option<Instant>,
    target_frame_rate: f32,
    layout_deferred: bool,
    surface_ready: bool,
    paused: bool,
    finished: bool,
    exit_requested: bool,
    pending_permissions: Vec<String>,
}

impl LoopState {
    fn new(target_frame_rate: f32) -> Self {
        Self {
            looping: true,
            // A sketch that stops looping in setup() still gets one draw()
            redraw: true,
            requested_no_loop: false,
            inside_draw: false,
            frame_count: 0,
            frame_rate: 60.0,
            frame_rate_last: None,
            target_frame_rate,
            layout_deferred: false,
            surface_ready: false,
            paused: false,
            finished: false,
            exit_requested: false,
            pending_permissions: Vec::new(),
        }
    }
}

/// Pointer, keyboard and touch state as of the last dispatched event
#[derive(Debug, Default)]
struct InputState {
    mouse: (f32, f32),
    /// Position after the previous press/drag/move was dispatched
    emouse: (f32, f32),
    /// Position at the start of this frame's `draw()`
    pmouse: (f32, f32),
    /// Position when the last `draw()` returned
    dmouse: (f32, f32),
    mouse_pressed: bool,
    mouse_button: MouseButton,
    key: Option<char>,
    key_code: KeyCode,
    key_pressed: bool,
    touches: Vec<TouchPointer>,
}

// ============================================================================
// Context
// ============================================================================

/// What a sketch can reach while one of its callbacks runs
pub struct Context<'a> {
    state: &'a mut LoopState,
    input: &'a InputState,
    renderer: &'a mut dyn Renderer,
    host: &'a dyn Host,
    random: &'a mut Random,
    noise: &'a mut Noise,
}

impl Context<'_> {
    /// Stop calling `draw()` every frame
    pub fn no_loop(&mut self) {
        if self.renderer.request_no_loop() {
            self.state.requested_no_loop = true;
        } else {
            self.state.looping = false;
        }
    }

    /// Resume calling `draw()` every frame
    pub fn start_loop(&mut self) {
        self.state.looping = true;
        self.state.requested_no_loop = false;
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.state.looping
    }

    /// Run `draw()` once more while not looping
    pub fn redraw(&mut self) {
        self.state.redraw = true;
    }

    /// Finish the sketch once the current frame completes
    pub fn exit(&mut self) {
        self.state.exit_requested = true;
    }

    /// Frames completed so far; 0 during `setup()`
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.state.frame_count
    }

    /// Smoothed frames per second actually achieved
    #[inline]
    pub fn frame_rate(&self) -> f32 {
        self.state.frame_rate
    }

    /// Ask the host to pace frames at `fps`
    pub fn set_frame_rate(&mut self, fps: f32) {
        if fps > 0.0 {
            self.state.target_frame_rate = fps;
        }
    }

    // ------------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------------

    #[inline]
    pub fn mouse_x(&self) -> f32 {
        self.input.mouse.0
    }

    #[inline]
    pub fn mouse_y(&self) -> f32 {
        self.input.mouse.1
    }

    /// Mouse position at the start of the previous frame's `draw()`
    #[inline]
    pub fn pmouse_x(&self) -> f32 {
        self.input.pmouse.0
    }

    #[inline]
    pub fn pmouse_y(&self) -> f32 {
        self.input.pmouse.1
    }

    /// Mouse position before the event being dispatched
    #[inline]
    pub fn previous_event_mouse(&self) -> (f32, f32) {
        self.input.emouse
    }

    #[inline]
    pub fn mouse_pressed(&self) -> bool {
        self.input.mouse_pressed
    }

    #[inline]
    pub fn mouse_button(&self) -> MouseButton {
        self.input.mouse_button
    }

    #[inline]
    pub fn key(&self) -> Option<char> {
        self.input.key
    }

    #[inline]
    pub fn key_code(&self) -> KeyCode {
        self.input.key_code
    }

    #[inline]
    pub fn key_pressed(&self) -> bool {
        self.input.key_pressed
    }

    #[inline]
    pub fn touches(&self) -> &[TouchPointer] {
        &self.input.touches
    }

    // ------------------------------------------------------------------------
    // Host services
    // ------------------------------------------------------------------------

    /// Queue a permission request; requests made during a frame go to the
    /// host together at the end of it
    pub fn request_permission(&mut self, name: &str) {
        if self.host.has_permission(name)
            || self.state.pending_permissions.iter().any(|p| p == name)
        {
            return;
        }
        self.state.pending_permissions.push(name.to_string());
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.host.has_permission(name)
    }

    pub fn display_width(&self) -> u32 {
        self.host.display_width()
    }

    pub fn display_height(&self) -> u32 {
        self.host.display_height()
    }

    // ------------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------------

    pub fn canvas(&mut self) -> &mut PixelBuffer {
        self.renderer.canvas_mut()
    }

    pub fn width(&self) -> u32 {
        self.renderer.canvas().width()
    }

    pub fn height(&self) -> u32 {
        self.renderer.canvas().height()
    }

    pub fn random(&mut self) -> &mut Random {
        self.random
    }

    pub fn noise(&mut self) -> &mut Noise {
        self.noise
    }
}

// ============================================================================
// SketchLoop
// ============================================================================

pub struct SketchLoop<S, R = SoftwareRenderer, H = HeadlessHost> {
    sketch: S,
    renderer: Option<R>,
    host: H,
    state: LoopState,
    input: InputState,
    registry: Registry,
    queue: EventQueue,
    back_press: Arc<AtomicBool>,
    random: Random,
    noise: Noise,
}

impl<S: Sketch, R: Renderer, H: Host> SketchLoop<S, R, H> {
    /// Loop with no renderer yet; frames are skipped until one is attached
    pub fn new(sketch: S, host: H) -> Self {
        Self::from_config(sketch, host, &SketchConfig::default())
    }

    pub fn from_config(sketch: S, host: H, config: &SketchConfig) -> Self {
        let random = config
            .random_seed
            .map_or_else(Random::from_time, Random::new);
        let noise = Noise::new(config.noise_seed.unwrap_or(0));
        let mut state = LoopState::new(config.frame_rate);
        state.layout_deferred = config.defer_layout;
        Self {
            sketch,
            renderer: None,
            host,
            state,
            input: InputState::default(),
            registry: Registry::new(),
            queue: EventQueue::new(config.touch_emulates_mouse),
            back_press: Arc::default(),
            random,
            noise,
        }
    }

    pub fn with_renderer(mut self, renderer: R) -> Self {
        self.set_renderer(renderer);
        self
    }

    pub fn set_renderer(&mut self, renderer: R) {
        self.renderer = Some(renderer);
    }

    /// Hold off drawing until the host reports the surface size
    pub fn defer_layout(mut self) -> Self {
        self.state.layout_deferred = true;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn sketch(&self) -> &S {
        &self.sketch
    }

    #[inline]
    pub fn sketch_mut(&mut self) -> &mut S {
        &mut self.sketch
    }

    #[inline]
    pub fn renderer(&self) -> Option<&R> {
        self.renderer.as_ref()
    }

    #[inline]
    pub fn renderer_mut(&mut self) -> Option<&mut R> {
        self.renderer.as_mut()
    }

    #[inline]
    pub fn host(&self) -> &H {
        &self.host
    }

    #[inline]
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.state.frame_count
    }

    #[inline]
    pub fn frame_rate(&self) -> f32 {
        self.state.frame_rate
    }

    #[inline]
    pub fn target_frame_rate(&self) -> f32 {
        self.state.target_frame_rate
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.state.looping
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state.finished
    }

    /// Handle for posting events and back presses from other threads
    pub fn sender(&self) -> EventSender {
        EventSender::new(self.queue.clone(), Arc::clone(&self.back_press))
    }

    // ========================================================================
    // Hooks
    // ========================================================================

    pub fn register(
        &mut self,
        kind: HookKind,
        receiver: impl Into<String>,
        hook: Hook,
    ) -> SketchResult<()> {
        self.registry.register(kind, receiver, hook)
    }

    pub fn unregister(&mut self, kind: HookKind, receiver: &str) -> SketchResult<()> {
        self.registry.unregister(kind, receiver)
    }

    // ========================================================================
    // Loop control from the host
    // ========================================================================

    pub fn redraw(&mut self) {
        self.state.redraw = true;
    }

    pub fn start_loop(&mut self) {
        self.state.looping = true;
    }

    /// Stop the sketch and ask the host to close it
    pub fn finish(&mut self) {
        if self.state.finished {
            return;
        }
        info!("finishing sketch after {} frames", self.state.frame_count);
        self.state.finished = true;
        self.state.looping = false;
        self.host.finish();
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Run one frame
    pub fn handle_draw(&mut self) {
        self.handle_draw_at(Instant::now());
    }

    /// Run one frame as if the clock read `now`
    ///
    /// # Panics
    /// Panics if called while a previous call is still running.
    pub fn handle_draw_at(&mut self, now: Instant) {
        if self.renderer.is_none() {
            return;
        }
        if self.state.layout_deferred && !self.state.surface_ready {
            return;
        }
        if self.state.paused {
            trace!("paused, frame skipped");
            return;
        }
        if !self.state.looping && !self.state.redraw {
            return;
        }
        if self.state.inside_draw {
            error!("handle_draw() called before finishing the previous frame");
            panic!("handle_draw() called before finishing the previous frame");
        }

        self.state.inside_draw = true;
        if self.handle_special_draw() {
            return;
        }

        if let Some(renderer) = self.renderer.as_mut() {
            renderer.begin_frame();
        }

        if self.state.frame_count == 0 {
            debug!("running setup()");
            self.with_sketch(|sketch, ctx| sketch.setup(ctx));
        } else {
            self.update_frame_rate(now);
            if let Some(renderer) = self.renderer.as_mut() {
                self.registry.run_frame(HookKind::Pre, renderer);
            }

            self.input.pmouse = self.input.dmouse;
            self.with_sketch(|sketch, ctx| sketch.draw(ctx));
            self.input.dmouse = self.input.mouse;

            self.dequeue_events();

            if let Some(renderer) = self.renderer.as_mut() {
                self.registry.run_frame(HookKind::Draw, renderer);
            }
            self.handle_permissions();
            self.handle_back_pressed();
            self.state.redraw = false;
        }

        if let Some(renderer) = self.renderer.as_mut() {
            renderer.end_frame();
        }
        self.state.inside_draw = false;

        if self.state.frame_count != 0 {
            self.registry.run_lifecycle(HookKind::Post);
        }
        self.state.frame_rate_last = Some(now);
        self.state.frame_count += 1;

        if self.state.exit_requested {
            self.finish();
        }
    }

    /// Frames that only flush the renderer: state restoration and a deferred
    /// `no_loop()`. Neither runs `draw()` nor counts as a frame.
    fn handle_special_draw(&mut self) -> bool {
        let Some(renderer) = self.renderer.as_mut() else {
            return false;
        };
        let handled = if renderer.is_restoring_state() {
            true
        } else if self.state.requested_no_loop {
            self.state.looping = false;
            self.state.requested_no_loop = false;
            true
        } else {
            false
        };
        if handled {
            trace!("special frame");
            renderer.begin_frame();
            renderer.end_frame();
            self.state.inside_draw = false;
        }
        handled
    }

    fn update_frame_rate(&mut self, now: Instant) {
        let Some(last) = self.state.frame_rate_last else {
            return;
        };
        let elapsed = now.saturating_duration_since(last).as_secs_f64();
        if elapsed > 0.0 {
            let instant = (1.0 / elapsed) as f32;
            self.state.frame_rate = self.state.frame_rate * (1.0 - FRAME_RATE_SMOOTHING)
                + instant * FRAME_RATE_SMOOTHING;
        }
    }

    fn handle_permissions(&mut self) {
        if self.state.pending_permissions.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.state.pending_permissions);
        debug!("requesting {} permission(s)", batch.len());
        self.host.request_permissions(&batch);
    }

    fn handle_back_pressed(&mut self) {
        if !self.back_press.swap(false, Ordering::AcqRel) {
            return;
        }
        let mut handled = false;
        self.with_sketch(|sketch, ctx| handled = sketch.back_pressed(ctx));
        if !handled {
            self.finish();
        }
    }

    /// Build a context and hand it to `f` with the sketch. Skipped while no
    /// renderer is attached.
    fn with_sketch(&mut self, f: impl FnOnce(&mut S, &mut Context<'_>)) -> bool {
        let Some(renderer) = self.renderer.as_mut() else {
            trace!("no renderer attached, sketch callback skipped");
            return false;
        };
        let mut ctx = Context {
            state: &mut self.state,
            input: &self.input,
            renderer,
            host: &self.host,
            random: &mut self.random,
            noise: &mut self.noise,
        };
        f(&mut self.sketch, &mut ctx);
        true
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Queue an event. While not looping it is dispatched immediately, since
    /// no frame will come along to drain the queue.
    pub fn post_event(&mut self, event: impl Into<Event>) {
        self.queue.push(event.into());
        if !self.state.looping {
            self.dequeue_events();
        }
    }

    /// Dispatch events sent from other threads while the loop is stopped
    pub fn pump(&mut self) {
        if !self.state.looping {
            self.dequeue_events();
            if self.back_press.load(Ordering::Acquire) {
                self.state.redraw = true;
            }
        }
    }

    fn dequeue_events(&mut self) {
        if self.renderer.is_none() {
            return;
        }
        while let Some(event) = self.queue.pop() {
            match event {
                Event::Mouse(e) => self.handle_mouse_event(&e),
                Event::Key(e) => self.handle_key_event(&e),
                Event::Touch(e) => self.handle_touch_event(&e),
            }
        }
    }

    fn handle_mouse_event(&mut self, event: &MouseEvent) {
        if event.moves_pointer() {
            self.input.mouse = (event.x, event.y);
        }
        match event.action {
            MouseAction::Press => {
                self.input.mouse_pressed = true;
                self.input.mouse_button = event.button;
            }
            MouseAction::Release => self.input.mouse_pressed = false,
            _ => {}
        }

        self.registry.run_mouse(event);
        self.with_sketch(|sketch, ctx| match event.action {
            MouseAction::Press => sketch.mouse_pressed(ctx, event),
            MouseAction::Release => sketch.mouse_released(ctx, event),
            MouseAction::Click => sketch.mouse_clicked(ctx, event),
            MouseAction::Drag => sketch.mouse_dragged(ctx, event),
            MouseAction::Move => sketch.mouse_moved(ctx, event),
            MouseAction::Enter => sketch.mouse_entered(ctx, event),
            MouseAction::Exit => sketch.mouse_exited(ctx, event),
            MouseAction::Wheel => sketch.mouse_wheel(ctx, event),
        });

        if event.moves_pointer() {
            self.input.emouse = self.input.mouse;
        }
    }

    fn handle_key_event(&mut self, event: &KeyEvent) {
        self.input.key = event.key;
        self.input.key_code = event.key_code;
        match event.action {
            KeyAction::Press => self.input.key_pressed = true,
            KeyAction::Release => self.input.key_pressed = false,
            KeyAction::Type => {}
        }

        self.registry.run_key(event);
        self.with_sketch(|sketch, ctx| match event.action {
            KeyAction::Press => sketch.key_pressed(ctx, event),
            KeyAction::Release => sketch.key_released(ctx, event),
            KeyAction::Type => sketch.key_typed(ctx, event),
        });

        if event.action == KeyAction::Press && event.is_back() {
            self.back_press.store(true, Ordering::Release);
            // a stopped loop still needs one frame to act on it
            self.state.redraw = true;
        }
    }

    fn handle_touch_event(&mut self, event: &TouchEvent) {
        self.input.touches.clone_from(&event.pointers);

        self.registry.run_touch(event);
        self.with_sketch(|sketch, ctx| match event.action {
            TouchAction::Start => sketch.touch_started(ctx, event),
            TouchAction::Move => sketch.touch_moved(ctx, event),
            TouchAction::End => sketch.touch_ended(ctx, event),
            TouchAction::Cancel => sketch.touch_cancelled(ctx, event),
        });
    }

    // ========================================================================
    // Host lifecycle
    // ========================================================================

    pub fn on_pause(&mut self) {
        debug!("pause");
        self.state.paused = true;
        self.registry.run_lifecycle(HookKind::Pause);
        self.with_sketch(|sketch, ctx| sketch.pause(ctx));
    }

    pub fn on_resume(&mut self) {
        debug!("resume");
        self.state.paused = false;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.restore_state();
        }
        self.registry.run_lifecycle(HookKind::Resume);
        self.with_sketch(|sketch, ctx| sketch.resume(ctx));
    }

    /// The host is tearing the sketch down
    pub fn on_destroy(&mut self) {
        debug!("destroy");
        self.state.finished = true;
        self.state.looping = false;
        self.registry.run_lifecycle(HookKind::Dispose);
        self.with_sketch(|sketch, ctx| sketch.dispose(ctx));
    }

    pub fn on_activity_result(&mut self, request: i32, result: i32) {
        self.registry.run_activity_result(request, result);
        self.with_sketch(|sketch, ctx| sketch.on_activity_result(ctx, request, result));
    }

    pub fn on_new_intent(&mut self, action: &str) {
        self.registry.run_new_intent(action);
        self.with_sketch(|sketch, ctx| sketch.on_new_intent(ctx, action));
    }

    pub fn on_permissions_result(&mut self, results: &[(String, bool)]) {
        for (name, granted) in results {
            if !granted {
                info!("permission {name} denied");
            }
            self.with_sketch(|sketch, ctx| sketch.on_permission_result(ctx, name, *granted));
        }
    }

    /// The host surface now has its final size
    pub fn surface_changed(&mut self, width: u32, height: u32) {
        debug!("surface changed to {width}x{height}");
        self.state.surface_ready = true;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.resize(width, height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Records every callback as a string
    #[derive(Default)]
    struct Recorder {
        log: Log,
        no_loop_in_setup: bool,
        no_loop_in_draw: bool,
        handle_back: bool,
        permissions: Vec<&'static str>,
        exit_on_frame: Option<u64>,
        draw_mouse: Vec<(f32, f32, f32, f32)>,
    }

    impl Recorder {
        fn push(&self, entry: impl Into<String>) {
            self.log.borrow_mut().push(entry.into());
        }
    }

    impl Sketch for Recorder {
        fn setup(&mut self, ctx: &mut Context<'_>) {
            self.push("setup");
            if self.no_loop_in_setup {
                ctx.no_loop();
            }
        }

        fn draw(&mut self, ctx: &mut Context<'_>) {
            self.push(format!("draw {}", ctx.frame_count()));
            self.draw_mouse
                .push((ctx.mouse_x(), ctx.mouse_y(), ctx.pmouse_x(), ctx.pmouse_y()));
            if self.no_loop_in_draw {
                ctx.no_loop();
            }
            for name in &self.permissions {
                ctx.request_permission(name);
            }
            if self.exit_on_frame == Some(ctx.frame_count()) {
                ctx.exit();
            }
        }

        fn mouse_pressed(&mut self, ctx: &mut Context<'_>, e: &MouseEvent) {
            assert!(ctx.mouse_pressed());
            self.push(format!("mouse_pressed {} {}", e.x, e.y));
        }

        fn mouse_released(&mut self, _ctx: &mut Context<'_>, _e: &MouseEvent) {
            self.push("mouse_released");
        }

        fn mouse_clicked(&mut self, _ctx: &mut Context<'_>, _e: &MouseEvent) {
            self.push("mouse_clicked");
        }

        fn mouse_moved(&mut self, ctx: &mut Context<'_>, e: &MouseEvent) {
            let (px, py) = ctx.previous_event_mouse();
            self.push(format!("mouse_moved {} {} from {px} {py}", e.x, e.y));
        }

        fn key_pressed(&mut self, ctx: &mut Context<'_>, _e: &KeyEvent) {
            self.push(format!("key_pressed {:?}", ctx.key()));
        }

        fn touch_started(&mut self, ctx: &mut Context<'_>, _e: &TouchEvent) {
            self.push(format!("touch_started {}", ctx.touches().len()));
        }

        fn back_pressed(&mut self, _ctx: &mut Context<'_>) -> bool {
            self.push("back_pressed");
            self.handle_back
        }

        fn pause(&mut self, _ctx: &mut Context<'_>) {
            self.push("pause");
        }

        fn dispose(&mut self, _ctx: &mut Context<'_>) {
            self.push("dispose");
        }

        fn on_permission_result(&mut self, _ctx: &mut Context<'_>, name: &str, granted: bool) {
            self.push(format!("permission {name} {granted}"));
        }
    }

    fn config() -> SketchConfig {
        SketchConfig {
            random_seed: Some(1),
            ..SketchConfig::default()
        }
    }

    fn sketch_loop(sketch: Recorder) -> SketchLoop<Recorder> {
        SketchLoop::from_config(sketch, HeadlessHost::new(100, 100), &config())
            .with_renderer(SoftwareRenderer::new(8, 8))
    }

    fn entries(log: &Log) -> Vec<String> {
        log.borrow().clone()
    }

    #[test_log::test]
    fn test_no_renderer_skips_frames() {
        let mut sl: SketchLoop<Recorder> =
            SketchLoop::new(Recorder::default(), HeadlessHost::new(1, 1));
        sl.handle_draw();
        assert_eq!(sl.frame_count(), 0);
        sl.set_renderer(SoftwareRenderer::new(2, 2));
        sl.handle_draw();
        assert_eq!(sl.frame_count(), 1);
    }

    #[test_log::test]
    fn test_setup_then_draw_with_frame_counts() {
        let recorder = Recorder::default();
        let log = Rc::clone(&recorder.log);
        let mut sl = sketch_loop(recorder);
        for _ in 0..3 {
            sl.handle_draw();
        }
        assert_eq!(entries(&log), vec!["setup", "draw 1", "draw 2"]);
        assert_eq!(sl.frame_count(), 3);
        assert_eq!(sl.renderer().unwrap().frames(), 3);
    }

    #[test_log::test]
    fn test_hook_order_within_a_frame() {
        let recorder = Recorder::default();
        let log = Rc::clone(&recorder.log);
        let mut sl = sketch_loop(recorder);
        for (kind, name) in [(HookKind::Pre, "pre"), (HookKind::Draw, "draw-hook")] {
            let log = Rc::clone(&log);
            sl.register(
                kind,
                "lib",
                Hook::frame(move |r| {
                    assert!(r.canvas().width() > 0);
                    log.borrow_mut().push(name.into());
                }),
            )
            .unwrap();
        }
        let post_log = Rc::clone(&log);
        sl.register(
            HookKind::Post,
            "lib",
            Hook::lifecycle(move || post_log.borrow_mut().push("post".into())),
        )
        .unwrap();

        sl.handle_draw();
        sl.handle_draw();
        assert_eq!(entries(&log), vec!["setup", "pre", "draw 1", "draw-hook", "post"]);
    }

    #[test_log::test]
    fn test_deferred_layout_waits_for_surface() {
        let mut sl = sketch_loop(Recorder::default()).defer_layout();
        sl.handle_draw();
        assert_eq!(sl.frame_count(), 0);
        sl.surface_changed(16, 12);
        sl.handle_draw();
        assert_eq!(sl.frame_count(), 1);
        assert_eq!(sl.renderer().unwrap().canvas().width(), 16);
    }

    #[test_log::test]
    fn test_no_loop_then_redraw_runs_one_frame() {
        let recorder = Recorder {
            no_loop_in_draw: true,
            ..Recorder::default()
        };
        let log = Rc::clone(&recorder.log);
        let mut sl = sketch_loop(recorder);
        sl.handle_draw();
        sl.handle_draw();
        assert!(!sl.is_looping());
        sl.handle_draw();
        sl.handle_draw();
        assert_eq!(sl.frame_count(), 2);

        sl.redraw();
        sl.handle_draw();
        sl.handle_draw();
        assert_eq!(entries(&log), vec!["setup", "draw 1", "draw 2"]);
        assert_eq!(sl.frame_count(), 3);
    }

    #[test_log::test]
    fn test_no_loop_in_setup_still_draws_once() {
        let recorder = Recorder {
            no_loop_in_setup: true,
            ..Recorder::default()
        };
        let log = Rc::clone(&recorder.log);
        let mut sl = sketch_loop(recorder);
        for _ in 0..4 {
            sl.handle_draw();
        }
        assert_eq!(entries(&log), vec!["setup", "draw 1"]);
    }

    #[test]
    #[should_panic(expected = "before finishing the previous frame")]
    fn test_reentrant_draw_is_fatal() {
        let mut sl = sketch_loop(Recorder::default());
        sl.state.inside_draw = true;
        sl.handle_draw();
    }

    #[test_log::test]
    fn test_restoring_state_consumes_one_empty_frame() {
        let recorder = Recorder::default();
        let log = Rc::clone(&recorder.log);
        let mut sl = sketch_loop(recorder);
        sl.handle_draw();
        sl.renderer_mut().unwrap().begin_restore();
        sl.handle_draw();
        assert_eq!(sl.frame_count(), 1);
        assert_eq!(sl.renderer().unwrap().frames(), 2);
        assert!(!sl.state.inside_draw);
        sl.handle_draw();
        assert_eq!(entries(&log), vec!["setup", "draw 1"]);
        assert_eq!(sl.frame_count(), 2);
    }

    #[test_log::test]
    fn test_deferred_no_loop_stops_after_flush_frame() {
        let recorder = Recorder {
            no_loop_in_draw: true,
            ..Recorder::default()
        };
        let log = Rc::clone(&recorder.log);
        let mut sl = SketchLoop::from_config(recorder, HeadlessHost::new(1, 1), &config())
            .with_renderer(SoftwareRenderer::new(2, 2).defer_no_loop(true));
        sl.handle_draw();
        sl.handle_draw();
        assert!(sl.is_looping());
        assert!(sl.state.requested_no_loop);

        sl.handle_draw();
        assert!(!sl.is_looping());
        assert!(!sl.state.requested_no_loop);
        assert_eq!(sl.frame_count(), 2);
        assert_eq!(sl.renderer().unwrap().frames(), 3);

        sl.handle_draw();
        assert_eq!(entries(&log), vec!["setup", "draw 1"]);
    }

    #[test_log::test]
    fn test_events_dispatch_after_draw_and_mouse_tracks() {
        let recorder = Recorder::default();
        let log = Rc::clone(&recorder.log);
        let mut sl = sketch_loop(recorder);
        sl.handle_draw();

        sl.post_event(MouseEvent::new(MouseAction::Move, 10.0, 20.0, MouseButton::None));
        sl.post_event(MouseEvent::new(MouseAction::Move, 30.0, 40.0, MouseButton::None));
        sl.handle_draw();
        sl.handle_draw();
        sl.handle_draw();

        assert_eq!(
            entries(&log),
            vec![
                "setup",
                "draw 1",
                "mouse_moved 10 20 from 0 0",
                "mouse_moved 30 40 from 10 20",
                "draw 2",
                "draw 3",
            ]
        );
        assert_eq!(
            sl.sketch().draw_mouse,
            vec![
                (0.0, 0.0, 0.0, 0.0),
                (30.0, 40.0, 0.0, 0.0),
                (30.0, 40.0, 30.0, 40.0),
            ]
        );
    }

    #[test_log::test]
    fn test_post_event_dispatches_immediately_when_not_looping() {
        let recorder = Recorder {
            no_loop_in_draw: true,
            ..Recorder::default()
        };
        let log = Rc::clone(&recorder.log);
        let mut sl = sketch_loop(recorder);
        sl.handle_draw();
        sl.handle_draw();
        sl.post_event(MouseEvent::new(MouseAction::Press, 3.0, 4.0, MouseButton::Left));
        assert_eq!(entries(&log).last().unwrap(), "mouse_pressed 3 4");
    }

    #[test_log::test]
    fn test_sender_events_wait_for_pump() {
        let recorder = Recorder {
            no_loop_in_setup: true,
            ..Recorder::default()
        };
        let log = Rc::clone(&recorder.log);
        let mut sl = sketch_loop(recorder);
        sl.handle_draw();
        sl.handle_draw();

        let sender = sl.sender();
        std::thread::spawn(move || {
            sender.post(KeyEvent::new(KeyAction::Press, Some('q'), KeyCode::None));
        })
        .join()
        .unwrap();
        assert_eq!(entries(&log).len(), 2);
        sl.pump();
        assert_eq!(entries(&log).last().unwrap(), "key_pressed Some('q')");
    }

    #[test_log::test]
    fn test_touch_emulates_mouse() {
        let recorder = Recorder::default();
        let log = Rc::clone(&recorder.log);
        let mut sl = sketch_loop(recorder);
        sl.handle_draw();
        sl.post_event(TouchEvent::single(TouchAction::Start, 5.0, 6.0));
        sl.post_event(TouchEvent::single(TouchAction::End, 5.0, 6.0));
        sl.handle_draw();
        assert_eq!(
            entries(&log)[2..],
            [
                "touch_started 1",
                "mouse_pressed 5 6",
                "mouse_released",
                "mouse_clicked",
            ]
        );
    }

    #[test_log::test]
    fn test_unhandled_back_press_finishes() {
        let mut sl = sketch_loop(Recorder::default());
        sl.handle_draw();
        sl.post_event(KeyEvent::back(KeyAction::Press));
        sl.handle_draw();
        assert!(sl.is_finished());
        assert!(sl.host().is_finished());
        assert!(entries(&sl.sketch().log).contains(&"back_pressed".to_string()));
    }

    #[test_log::test]
    fn test_back_press_wakes_a_stopped_loop() {
        let recorder = Recorder {
            no_loop_in_setup: true,
            ..Recorder::default()
        };
        let mut sl = sketch_loop(recorder);
        sl.handle_draw();
        sl.handle_draw();
        assert!(!sl.is_looping());

        sl.post_event(KeyEvent::back(KeyAction::Press));
        sl.handle_draw();
        assert!(sl.is_finished());
    }

    #[test_log::test]
    fn test_handled_back_press_keeps_running() {
        let recorder = Recorder {
            handle_back: true,
            ..Recorder::default()
        };
        let mut sl = sketch_loop(recorder);
        sl.handle_draw();
        sl.sender().back_pressed();
        sl.handle_draw();
        assert!(!sl.is_finished());
        // The latch is consumed
        sl.handle_draw();
        let presses = entries(&sl.sketch().log)
            .iter()
            .filter(|e| *e == "back_pressed")
            .count();
        assert_eq!(presses, 1);
    }

    #[test_log::test]
    fn test_permission_requests_are_batched_per_frame() {
        let recorder = Recorder {
            permissions: vec!["CAMERA", "INTERNET", "CAMERA", "RECORD_AUDIO"],
            ..Recorder::default()
        };
        let mut host = HeadlessHost::new(1, 1);
        host.grant("INTERNET");
        let mut sl = SketchLoop::from_config(recorder, host, &config())
            .with_renderer(SoftwareRenderer::new(1, 1));
        sl.handle_draw();
        sl.handle_draw();
        assert_eq!(
            sl.host().permission_requests(),
            &[vec!["CAMERA".to_string(), "RECORD_AUDIO".to_string()]]
        );

        sl.on_permissions_result(&[("CAMERA".into(), true), ("RECORD_AUDIO".into(), false)]);
        let log = entries(&sl.sketch().log);
        assert!(log.contains(&"permission CAMERA true".to_string()));
        assert!(log.contains(&"permission RECORD_AUDIO false".to_string()));
    }

    #[test_log::test]
    fn test_frame_rate_is_exponential_moving_average() {
        let mut sl = sketch_loop(Recorder::default());
        let t0 = Instant::now();
        sl.handle_draw_at(t0);
        assert_eq!(sl.frame_rate(), 60.0);
        sl.handle_draw_at(t0 + Duration::from_millis(10));
        // 0.9 * 60 + 0.1 * 100
        assert!((sl.frame_rate() - 64.0).abs() < 1e-3);
        // A zero-length frame leaves the average alone
        sl.handle_draw_at(t0 + Duration::from_millis(10));
        assert!((sl.frame_rate() - 64.0).abs() < 1e-3);
    }

    #[test_log::test]
    fn test_exit_finishes_after_the_frame() {
        let recorder = Recorder {
            exit_on_frame: Some(2),
            ..Recorder::default()
        };
        let mut sl = sketch_loop(recorder);
        sl.handle_draw();
        sl.handle_draw();
        assert!(!sl.is_finished());
        sl.handle_draw();
        assert!(sl.is_finished());
        assert_eq!(sl.frame_count(), 3);
        sl.handle_draw();
        assert_eq!(sl.frame_count(), 3);
    }

    #[test_log::test]
    fn test_lifecycle_runs_hooks_before_sketch() {
        let recorder = Recorder::default();
        let log = Rc::clone(&recorder.log);
        let mut sl = sketch_loop(recorder);
        for kind in [HookKind::Pause, HookKind::Dispose] {
            let log = Rc::clone(&log);
            sl.register(
                kind,
                "lib",
                Hook::lifecycle(move || log.borrow_mut().push(format!("{kind:?} hook"))),
            )
            .unwrap();
        }
        sl.on_pause();
        assert!(sl.is_paused());
        sl.on_destroy();
        assert!(sl.is_finished());
        assert_eq!(
            entries(&log),
            vec!["Pause hook", "pause", "Dispose hook", "dispose"]
        );
    }

    #[test_log::test]
    fn test_pause_stops_frames_until_resume() {
        let mut sl = sketch_loop(Recorder::default());
        sl.handle_draw();
        sl.handle_draw();
        assert_eq!(sl.frame_count(), 2);

        sl.on_pause();
        sl.handle_draw();
        sl.handle_draw();
        assert_eq!(sl.frame_count(), 2);
        let draws = entries(&sl.sketch().log).iter().filter(|e| e.starts_with("draw")).count();
        assert_eq!(draws, 1);

        sl.on_resume();
        // The first frame after a resume only restores the renderer
        sl.handle_draw();
        assert_eq!(sl.frame_count(), 2);
        assert!(!sl.renderer().unwrap().is_restoring_state());
        sl.handle_draw();
        assert_eq!(sl.frame_count(), 3);
    }

    #[test_log::test]
    fn test_activity_result_and_intent_reach_hooks() {
        let seen: Log = Rc::default();
        let mut sl = sketch_loop(Recorder::default());
        let s = Rc::clone(&seen);
        sl.register(
            HookKind::ActivityResult,
            "lib",
            Hook::activity_result(move |req, res| s.borrow_mut().push(format!("{req}/{res}"))),
        )
        .unwrap();
        let s = Rc::clone(&seen);
        sl.register(
            HookKind::NewIntent,
            "lib",
            Hook::new_intent(move |a| s.borrow_mut().push(a.to_string())),
        )
        .unwrap();
        sl.on_activity_result(1, 2);
        sl.on_new_intent("MAIN");
        assert_eq!(entries(&seen), vec!["1/2", "MAIN"]);
    }
}
