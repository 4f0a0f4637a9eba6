//! Pattern replay.
//!
//! Walks a loaded recording with real sleeps, reproducing the recorded
//! cadence: straight-line strokes are rebuilt by subdividing each recorded
//! move, holds replay their recorded durations, pauses sleep theirs.
//! Playback is gated on window focus and can be cancelled from another
//! thread; time spent waiting for focus does not count against the
//! recorded offsets.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use mimic_core::config::{self, ReplayConfig};
use mimic_core::error::Result;
use mimic_core::events::{Event, MoveMetrics};
use mimic_core::store::PatternStore;

use crate::driver::InputDriver;
use crate::focus::FocusProbe;

/// Playback tunables, mirroring the `[replay]` config section.
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Poll interval while waiting for the target window to regain focus.
    pub focus_check_interval: Duration,
    /// Hold used when a release event carries no recorded duration.
    pub hold_fallback: Duration,
    /// Speed multiplier; 2.0 halves every wait.
    pub speed: f64,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            focus_check_interval: Duration::from_millis(100),
            hold_fallback: Duration::from_millis(100),
            speed: 1.0,
        }
    }
}

impl ReplayOptions {
    pub fn from_config(config: &ReplayConfig) -> Self {
        Self {
            focus_check_interval: config::secs(config.focus_check_interval),
            hold_fallback: Duration::from_millis(config.hold_fallback_ms),
            speed: config.speed,
        }
    }
}

/// How a playback run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Every event was driven.
    Completed,
    /// A stop request interrupted the run.
    Cancelled,
    /// Nothing was driven: no events loaded, or the target window never
    /// had focus to begin with.
    Skipped,
    /// The input driver failed and the run ended early.
    Failed,
}

/// Cancellation handle, cloneable across threads. Once stopped, the
/// engine stays stopped; later `play` calls return immediately.
#[derive(Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct ReplayEngine {
    driver: Box<dyn InputDriver>,
    focus: Box<dyn FocusProbe>,
    options: ReplayOptions,
    events: Vec<Event>,
    cancel: Arc<AtomicBool>,
    /// Pointer position as driven so far; glides interpolate from here.
    position: Option<(i32, i32)>,
}

impl ReplayEngine {
    pub fn new(
        driver: Box<dyn InputDriver>,
        focus: Box<dyn FocusProbe>,
        options: ReplayOptions,
    ) -> Self {
        Self {
            driver,
            focus,
            options,
            events: Vec::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            position: None,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.cancel.clone())
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Load an artifact for playback. On failure the previously loaded
    /// sequence stays untouched.
    pub fn load(&mut self, store: &PatternStore, path: &Path) -> Result<usize> {
        let recording = store.load(path)?;
        debug!(
            "loaded {} events from {}",
            recording.events.len(),
            path.display()
        );
        self.events = recording.events;
        Ok(self.events.len())
    }

    /// Play the loaded sequence from the top. Requires at least one event
    /// and initial focus; otherwise nothing is driven. Driver errors end
    /// the run early but never escape as panics or process exits.
    pub fn play(&mut self) -> ReplayOutcome {
        if self.events.is_empty() {
            warn!("nothing loaded, skipping replay");
            return ReplayOutcome::Skipped;
        }
        if !self.focus.is_focused() {
            warn!("target window not focused, skipping replay");
            return ReplayOutcome::Skipped;
        }

        let speed = normalize_speed(self.options.speed);
        let mut clock = ReplayClock::new(speed);
        let events = self.events.clone();
        let total = events.len();

        info!("replaying {} events", total);
        for (index, event) in events.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                info!("replay cancelled at event {}/{}", index, total);
                return ReplayOutcome::Cancelled;
            }
            if !self.wait_for_focus(&mut clock) {
                info!("replay cancelled while waiting for focus ({}/{})", index, total);
                return ReplayOutcome::Cancelled;
            }
            if let Err(e) = self.step(event, &mut clock) {
                warn!("replay aborted at event {}/{}: {}", index, total, e);
                return ReplayOutcome::Failed;
            }
        }
        info!("replay complete ({} events)", total);
        ReplayOutcome::Completed
    }

    /// Block until the target window has focus again, crediting the wait
    /// to the clock so recorded offsets stay meaningful. Returns false if
    /// a stop request arrived while waiting.
    fn wait_for_focus(&mut self, clock: &mut ReplayClock) -> bool {
        if self.focus.is_focused() {
            return true;
        }
        debug!("target window lost focus, holding replay");
        let wait_started = Instant::now();
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                clock.credit(wait_started.elapsed());
                return false;
            }
            thread::sleep(self.options.focus_check_interval);
            if self.focus.is_focused() {
                clock.credit(wait_started.elapsed());
                debug!("focus regained, resuming");
                return true;
            }
        }
    }

    fn step(&mut self, event: &Event, clock: &mut ReplayClock) -> Result<()> {
        match event {
            Event::MouseMove {
                x,
                y,
                time_offset_ms,
                metrics,
            } => {
                clock.sleep_until(*time_offset_ms);
                self.glide_to(*x, *y, Some(metrics), clock)?;
            }
            Event::MouseButton {
                pressed: true,
                x,
                y,
                button,
                time_offset_ms,
                ..
            } => {
                clock.sleep_until(*time_offset_ms);
                self.glide_to(*x, *y, None, clock)?;
                self.driver.button(*button, true)?;
            }
            Event::MouseButton {
                pressed: false,
                button,
                hold_duration_ms,
                ..
            } => {
                // The release is timed off the hold, not the offset.
                thread::sleep(clock.scaled(self.hold(*hold_duration_ms)));
                self.driver.button(*button, false)?;
            }
            Event::Key {
                pressed: true,
                key,
                time_offset_ms,
                ..
            } => {
                clock.sleep_until(*time_offset_ms);
                self.driver.key(key, true)?;
            }
            Event::Key {
                pressed: false,
                key,
                hold_duration_ms,
                ..
            } => {
                thread::sleep(clock.scaled(self.hold(*hold_duration_ms)));
                self.driver.key(key, false)?;
            }
            Event::Pause { duration_ms, .. } => {
                thread::sleep(clock.scaled(Duration::from_millis(*duration_ms)));
            }
        }
        Ok(())
    }

    fn hold(&self, recorded: Option<u64>) -> Duration {
        recorded
            .map(Duration::from_millis)
            .unwrap_or(self.options.hold_fallback)
    }

    /// Drive the pointer to (x, y). With metrics and a known current
    /// position the recorded stroke is rebuilt: the straight line is cut
    /// into steps two pixels apart, spaced evenly over the recorded dt.
    /// The final step always lands exactly on the recorded endpoint.
    fn glide_to(
        &mut self,
        x: i32,
        y: i32,
        metrics: Option<&MoveMetrics>,
        clock: &ReplayClock,
    ) -> Result<()> {
        let stroke = metrics
            .filter(|m| m.distance > 0.0 && m.speed > 0.0)
            .zip(self.position);

        if let Some((m, (fx, fy))) = stroke {
            let steps = (m.distance / 2.0).floor().max(1.0) as u32;
            // dt is unchecked artifact data; out-of-range values glide
            // instantly instead of panicking.
            let step_time = clock.scaled(
                Duration::try_from_secs_f64(m.dt.max(0.0) / f64::from(steps))
                    .unwrap_or(Duration::ZERO),
            );
            for i in 1..=steps {
                if self.cancel.load(Ordering::SeqCst) {
                    // The outer loop reports the cancellation.
                    return Ok(());
                }
                let progress = f64::from(i) / f64::from(steps);
                let ix = (f64::from(fx) + m.dx * progress).round() as i32;
                let iy = (f64::from(fy) + m.dy * progress).round() as i32;
                self.driver.move_to(ix, iy)?;
                thread::sleep(step_time);
            }
        }

        self.driver.move_to(x, y)?;
        self.position = Some((x, y));
        Ok(())
    }
}

/// Playback clock. Offsets are honored against time actually spent
/// playing; focus waits are credited back.
struct ReplayClock {
    started: Instant,
    credit: Duration,
    speed: f64,
}

impl ReplayClock {
    fn new(speed: f64) -> Self {
        Self {
            started: Instant::now(),
            credit: Duration::ZERO,
            speed,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed().saturating_sub(self.credit)
    }

    fn credit(&mut self, waited: Duration) {
        self.credit += waited;
    }

    fn scaled(&self, duration: Duration) -> Duration {
        if self.speed == 1.0 {
            duration
        } else {
            // An extreme speed can scale past Duration's range; fall back
            // to the recorded timing.
            Duration::try_from_secs_f64(duration.as_secs_f64() / self.speed)
                .unwrap_or(duration)
        }
    }

    /// Sleep off whatever remains until the recorded offset is due.
    fn sleep_until(&self, offset_ms: u64) {
        let target = self.scaled(Duration::from_millis(offset_ms));
        let elapsed = self.elapsed();
        if target > elapsed {
            thread::sleep(target - elapsed);
        }
    }
}

fn normalize_speed(speed: f64) -> f64 {
    if speed.is_finite() && speed > 0.0 {
        speed
    } else {
        1.0
    }
}
