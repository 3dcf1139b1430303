//! Frame pacing
//!
//! [`FramePacer`] sleeps away whatever is left of each frame period and
//! carries oversleep into the next frame. When frames run long it yields to
//! other threads every few frames instead of sleeping. [`run`] drives a
//! `SketchLoop` with it; [`AnimationThread`] does the same on a dedicated
//! thread that can be paused, resumed and stopped from elsewhere.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info};

use super::renderer::{Host, Renderer};
use super::scheduler::{Sketch, SketchLoop};

/// Frames in a row without sleeping before the pacer yields
const NO_DELAYS_PER_YIELD: u32 = 15;

// ============================================================================
// Pacer
// ============================================================================

/// What the pacer wants the thread to do after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    Sleep(Duration),
    Continue,
    Yield,
}

#[derive(Debug)]
pub struct FramePacer {
    period: Duration,
    over_sleep: Duration,
    no_delays: u32,
    before: Instant,
}

impl FramePacer {
    pub fn new(frame_rate: f32) -> Self {
        Self {
            period: period_for(frame_rate),
            over_sleep: Duration::ZERO,
            no_delays: 0,
            before: Instant::now(),
        }
    }

    pub fn set_frame_rate(&mut self, frame_rate: f32) {
        self.period = period_for(frame_rate);
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Decide what to do after a frame that took `elapsed`
    pub fn plan(&mut self, elapsed: Duration) -> Pace {
        match self
            .period
            .checked_sub(elapsed)
            .and_then(|left| left.checked_sub(self.over_sleep))
            .filter(|d| !d.is_zero())
        {
            Some(sleep) => {
                self.no_delays = 0;
                Pace::Sleep(sleep)
            }
            None => {
                self.over_sleep = Duration::ZERO;
                self.no_delays += 1;
                if self.no_delays > NO_DELAYS_PER_YIELD {
                    self.no_delays = 0;
                    Pace::Yield
                } else {
                    Pace::Continue
                }
            }
        }
    }

    /// Record how long a planned sleep really took
    pub fn slept(&mut self, planned: Duration, actual: Duration) {
        self.over_sleep = actual.saturating_sub(planned);
    }

    /// Wait out the rest of the current frame
    pub fn wait(&mut self) {
        let after = Instant::now();
        match self.plan(after - self.before) {
            Pace::Sleep(d) => {
                thread::sleep(d);
                self.slept(d, after.elapsed());
            }
            Pace::Yield => thread::yield_now(),
            Pace::Continue => {}
        }
        self.before = Instant::now();
    }
}

fn period_for(frame_rate: f32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(frame_rate.max(1.0)))
}

// ============================================================================
// Control
// ============================================================================

#[derive(Debug, Default)]
struct ControlState {
    paused: bool,
    stopped: bool,
}

/// Pause/resume/stop switch shared with the animation thread
#[derive(Debug, Clone, Default)]
pub struct AnimationControl {
    inner: Arc<(Mutex<ControlState>, Condvar)>,
}

impl AnimationControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pause(&self) {
        self.lock().paused = true;
    }

    pub fn resume(&self) {
        self.lock().paused = false;
        self.inner.1.notify_all();
    }

    pub fn stop(&self) {
        self.lock().stopped = true;
        self.inner.1.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Block while paused. Returns false once stopped.
    pub fn wait_while_paused(&self) -> bool {
        let guard = self.lock();
        let guard = self
            .inner
            .1
            .wait_while(guard, |s| s.paused && !s.stopped)
            .unwrap_or_else(PoisonError::into_inner);
        !guard.stopped
    }
}

/// Drive `sketch_loop` until it finishes, `control` stops it, or `on_frame`
/// returns false. `on_frame` runs after every frame, on this thread.
pub fn run<S, R, H>(
    sketch_loop: &mut SketchLoop<S, R, H>,
    control: &AnimationControl,
    mut on_frame: impl FnMut(&mut SketchLoop<S, R, H>) -> bool,
) where
    S: Sketch,
    R: Renderer,
    H: Host,
{
    let mut pacer = FramePacer::new(sketch_loop.target_frame_rate());
    while !sketch_loop.is_finished() {
        if !control.wait_while_paused() {
            break;
        }
        sketch_loop.handle_draw();
        if !on_frame(sketch_loop) {
            break;
        }
        pacer.set_frame_rate(sketch_loop.target_frame_rate());
        pacer.wait();
    }
    debug!("animation stopped after {} frames", sketch_loop.frame_count());
}

/// Named thread that builds a sketch loop and runs it
#[derive(Debug)]
pub struct AnimationThread {
    control: AnimationControl,
    handle: Option<JoinHandle<()>>,
}

impl AnimationThread {
    /// Spawn the thread. The loop is built on it by `build`, so the sketch,
    /// renderer and host need not be `Send`.
    pub fn spawn<F, S, R, H>(build: F) -> io::Result<Self>
    where
        F: FnOnce() -> SketchLoop<S, R, H> + Send + 'static,
        S: Sketch + 'static,
        R: Renderer + 'static,
        H: Host + 'static,
    {
        let control = AnimationControl::new();
        let thread_control = control.clone();
        let handle = thread::Builder::new()
            .name("Animation Thread".into())
            .spawn(move || {
                let mut sketch_loop = build();
                run(&mut sketch_loop, &thread_control, |_| true);
                sketch_loop.on_destroy();
            })?;
        info!("animation thread started");
        Ok(Self {
            control,
            handle: Some(handle),
        })
    }

    #[inline]
    pub fn control(&self) -> &AnimationControl {
        &self.control
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the loop and wait for the thread to exit
    pub fn stop(mut self) -> thread::Result<()> {
        self.control.stop();
        self.join_inner()
    }

    /// Wait for the sketch to finish on its own
    pub fn join(mut self) -> thread::Result<()> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> thread::Result<()> {
        self.handle.take().map_or(Ok(()), JoinHandle::join)
    }
}

impl Drop for AnimationThread {
    fn drop(&mut self) {
        self.control.stop();
        if self.join_inner().is_err() {
            error!("animation thread panicked");
        }
    }
}

// ============================================================================
// Frame timing statistics
// ============================================================================

/// Rolling window of frame times
#[derive(Debug)]
pub struct FrameTimer {
    frame_times: VecDeque<f32>,
    last_frame: Instant,
    sample_count: usize,
}

impl FrameTimer {
    pub fn new(sample_count: usize) -> Self {
        Self {
            frame_times: VecDeque::with_capacity(sample_count),
            last_frame: Instant::now(),
            sample_count: sample_count.max(1),
        }
    }

    /// Record a frame ending now. Returns `(delta_time, average_fps)`.
    pub fn tick(&mut self) -> (f32, f32) {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.record(dt);
        (dt, self.average_fps())
    }

    pub fn record(&mut self, dt: f32) {
        self.frame_times.push_back(dt);
        if self.frame_times.len() > self.sample_count {
            self.frame_times.pop_front();
        }
    }

    fn mean(&self) -> f32 {
        self.frame_times.iter().sum::<f32>() / self.frame_times.len().max(1) as f32
    }

    pub fn average_fps(&self) -> f32 {
        let avg = self.mean();
        if avg > 0.0 {
            1.0 / avg
        } else {
            0.0
        }
    }

    pub fn avg_frame_time_ms(&self) -> f32 {
        self.mean() * 1000.0
    }

    /// `(min_fps, max_fps)` over the window
    pub fn min_max_fps(&self) -> (f32, f32) {
        if self.frame_times.is_empty() {
            return (0.0, 0.0);
        }
        let min_dt = self.frame_times.iter().copied().fold(f32::INFINITY, f32::min);
        let max_dt = self.frame_times.iter().copied().fold(0.0, f32::max);
        let fps = |dt: f32| if dt > 0.0 { 1.0 / dt } else { 0.0 };
        (fps(max_dt), fps(min_dt))
    }

    /// 1st, 50th and 99th percentile frame times in milliseconds
    pub fn percentiles_ms(&self) -> (f32, f32, f32) {
        if self.frame_times.is_empty() {
            return (0.0, 0.0, 0.0);
        }
        let mut sorted: Vec<f32> = self.frame_times.iter().copied().collect();
        sorted.sort_by(f32::total_cmp);
        let len = sorted.len();
        let p1 = (len as f32 * 0.01).floor() as usize;
        let p99 = ((len as f32 * 0.99).floor() as usize).min(len - 1);
        (sorted[p1] * 1000.0, sorted[len / 2] * 1000.0, sorted[p99] * 1000.0)
    }

    pub fn len(&self) -> usize {
        self.frame_times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_times.is_empty()
    }
}
