//! Capture session state machine.
//!
//! Turns raw input notifications into the structured event stream: idle
//! gaps become explicit pause events, pointer moves get movement metrics,
//! presses and releases get matched up into hold durations. The whole
//! thing is pure state over caller-supplied instants, so it can be driven
//! by the OS hook in production and by synthetic clocks in tests.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use mimic_core::events::{Event, MouseButton, MoveMetrics};

/// Identity of a held control. Keys are named by strings, so a key that
/// happens to be called "left" must never collide with the left mouse
/// button in the press bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PressSource {
    Button(MouseButton),
    Key(String),
}

/// One active recording session.
///
/// Every notification runs the pause check first, then appends its own
/// event, so offsets in the produced stream are non-decreasing as long as
/// the supplied instants are.
pub struct CaptureSession {
    start: Instant,
    pause_threshold: Duration,
    last_event_at: Option<Instant>,
    last_mouse_pos: Option<(i32, i32)>,
    last_move_at: Option<Instant>,
    press_times: HashMap<PressSource, Instant>,
    events: Vec<Event>,
}

impl CaptureSession {
    pub fn new(start: Instant, pause_threshold: Duration) -> Self {
        Self {
            start,
            pause_threshold,
            last_event_at: None,
            last_mouse_pos: None,
            last_move_at: None,
            press_times: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// Everything recorded so far, in arrival order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Record a pointer move. Returns the appended events, pause first
    /// when one fired.
    pub fn mouse_moved(&mut self, x: i32, y: i32, now: Instant) -> Vec<Event> {
        let mut produced = Vec::with_capacity(2);
        if let Some(pause) = self.check_pause(now) {
            produced.push(pause);
        }

        // Metrics measure from the last known pointer position, which a
        // click may have set; dt still spans back to the last move. A move
        // with no prior position reports all-zero deltas.
        let metrics = match self.last_mouse_pos {
            Some((px, py)) => {
                let dx = f64::from(x - px);
                let dy = f64::from(y - py);
                let distance = dx.hypot(dy);
                let dt = self
                    .last_move_at
                    .map(|at| now.saturating_duration_since(at).as_secs_f64())
                    .unwrap_or(0.0);
                let speed = if dt > 1e-6 { distance / dt } else { 0.0 };
                MoveMetrics {
                    dt,
                    distance,
                    speed,
                    angle: dy.atan2(dx).to_degrees(),
                    dx,
                    dy,
                }
            }
            None => MoveMetrics::default(),
        };

        produced.push(Event::MouseMove {
            x,
            y,
            time_offset_ms: self.offset_ms(now),
            metrics,
        });

        self.last_mouse_pos = Some((x, y));
        self.last_move_at = Some(now);
        self.events.extend_from_slice(&produced);
        produced
    }

    /// Record a button transition. A press remembers its instant; the
    /// matching release reports the elapsed hold.
    pub fn button_changed(
        &mut self,
        button: MouseButton,
        pressed: bool,
        x: i32,
        y: i32,
        now: Instant,
    ) -> Vec<Event> {
        let mut produced = Vec::with_capacity(2);
        if let Some(pause) = self.check_pause(now) {
            produced.push(pause);
        }

        let hold_duration_ms = if pressed {
            self.press_times.insert(PressSource::Button(button), now);
            None
        } else {
            Some(self.pop_hold(PressSource::Button(button), now))
        };

        produced.push(Event::MouseButton {
            pressed,
            x,
            y,
            button,
            time_offset_ms: self.offset_ms(now),
            hold_duration_ms,
        });
        // The click pins the pointer position; the move clock stays put so
        // the next move's dt is still move-to-move.
        self.last_mouse_pos = Some((x, y));
        self.events.extend_from_slice(&produced);
        produced
    }

    /// Record a key transition.
    pub fn key_changed(&mut self, key: &str, pressed: bool, now: Instant) -> Vec<Event> {
        let mut produced = Vec::with_capacity(2);
        if let Some(pause) = self.check_pause(now) {
            produced.push(pause);
        }

        let hold_duration_ms = if pressed {
            self.press_times.insert(PressSource::Key(key.to_string()), now);
            None
        } else {
            Some(self.pop_hold(PressSource::Key(key.to_string()), now))
        };

        produced.push(Event::Key {
            pressed,
            key: key.to_string(),
            time_offset_ms: self.offset_ms(now),
            hold_duration_ms,
        });
        self.events.extend_from_slice(&produced);
        produced
    }

    /// Final pause check at stop time, so trailing stillness makes it into
    /// the recording. Returns the pause if one was appended.
    pub fn finish(&mut self, now: Instant) -> Option<Event> {
        let pause = self.check_pause(now)?;
        self.events.push(pause.clone());
        Some(pause)
    }

    /// Shared by every event kind: if the gap since the previous event
    /// crossed the threshold, synthesize one pause anchored at the
    /// previous event's offset. The very first notification only arms the
    /// clock.
    fn check_pause(&mut self, now: Instant) -> Option<Event> {
        let previous = match self.last_event_at {
            Some(at) => at,
            None => {
                self.last_event_at = Some(now);
                return None;
            }
        };
        self.last_event_at = Some(now);

        let gap = now.saturating_duration_since(previous);
        if gap < self.pause_threshold {
            return None;
        }

        let (x, y) = self.last_mouse_pos.unwrap_or((0, 0));
        Some(Event::Pause {
            time_offset_ms: self.offset_ms(previous),
            duration_ms: round_ms(gap),
            x,
            y,
        })
    }

    fn pop_hold(&mut self, source: PressSource, now: Instant) -> u64 {
        // A release with no matched press (held across session start)
        // reports a zero hold.
        let pressed_at = self.press_times.remove(&source).unwrap_or(now);
        round_ms(now.saturating_duration_since(pressed_at))
    }

    fn offset_ms(&self, at: Instant) -> u64 {
        round_ms(at.saturating_duration_since(self.start))
    }
}

fn round_ms(duration: Duration) -> u64 {
    (duration.as_secs_f64() * 1000.0).round() as u64
}
