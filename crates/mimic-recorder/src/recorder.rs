//! Recording orchestration.
//!
//! Two worker threads run while a recording is live: the consumer, which
//! owns the capture session and drains raw input from the hook channel,
//! and the segmenter poller, which watches the action queue. Stop is one
//! atomic flag both loops observe. On stop the consumer waits the poller
//! out, runs a final pause check, finalizes whatever action is still
//! buffered, and saves an unsegmented session under a generic name.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, info};

use mimic_core::action::ActionQueue;
use mimic_core::config::{self, Config};
use mimic_core::events::MouseButton;
use mimic_core::store::PatternStore;
use mimic_core::Result;

use crate::segment::{ActionSegmenter, SegmentState};
use crate::session::CaptureSession;

/// Worker loop tick; stop latency is bounded by this.
const TICK: Duration = Duration::from_millis(50);

/// Raw input notification from the OS hook, timestamped on arrival.
#[derive(Debug, Clone)]
pub enum RawInput {
    MouseMove {
        x: i32,
        y: i32,
        at: Instant,
    },
    MouseButton {
        button: MouseButton,
        pressed: bool,
        x: i32,
        y: i32,
        at: Instant,
    },
    Key {
        key: String,
        pressed: bool,
        at: Instant,
    },
}

/// Recorder knobs distilled from [`Config`].
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub pause_threshold: Duration,
    pub action_check_interval: Duration,
    pub patterns_dir: PathBuf,
    pub queue_path: PathBuf,
    /// Raw input channel capacity; bursts beyond it are dropped by the
    /// hook rather than blocking the callback.
    pub max_buffer: usize,
}

impl RecorderConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pause_threshold: config::secs(config.recording.pause_threshold),
            action_check_interval: config::secs(config.recording.action_check_interval),
            patterns_dir: config.paths.patterns_directory.clone(),
            queue_path: config.paths.suggested_actions.clone(),
            max_buffer: 10_000,
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What a finished recording session produced.
#[derive(Debug, Default)]
pub struct RecordingSummary {
    /// Events captured across the whole session, pauses included.
    pub total_events: usize,
    /// Artifacts written, segment finalizations and final saves alike.
    pub artifacts: Vec<PathBuf>,
}

/// Owns a live recording session.
pub struct RecordingHandle {
    stop: Arc<AtomicBool>,
    threads: Vec<thread::JoinHandle<()>>,
    summary_rx: Receiver<RecordingSummary>,
}

impl RecordingHandle {
    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Relaxed)
    }

    /// Signal stop and join the workers. The consumer performs the final
    /// pause check and save before it exits, so the summary is complete
    /// when this returns.
    pub fn stop(self) -> RecordingSummary {
        self.stop.store(true, Ordering::SeqCst);
        for handle in self.threads {
            let _ = handle.join();
        }
        self.summary_rx.try_recv().unwrap_or_default()
    }
}

pub struct Recorder {
    config: RecorderConfig,
}

impl Recorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self { config }
    }

    /// Spawn the consumer and segmenter over `raw_rx`. The OS hook feeding
    /// the channel is started separately by the platform layer; tests feed
    /// the channel directly.
    pub fn start(&self, raw_rx: Receiver<RawInput>) -> Result<RecordingHandle> {
        let store = Arc::new(PatternStore::new(&self.config.patterns_dir)?);
        let stop = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(Mutex::new(SegmentState::new()));
        let (summary_tx, summary_rx) = bounded(1);

        info!(
            "recording started (patterns: {}, queue: {})",
            self.config.patterns_dir.display(),
            self.config.queue_path.display()
        );

        let poller = {
            let stop = stop.clone();
            let shared = shared.clone();
            let store = store.clone();
            let segmenter = ActionSegmenter::new(
                ActionQueue::new(&self.config.queue_path),
                self.config.action_check_interval,
            );
            thread::spawn(move || run_segmenter(segmenter, stop, shared, store))
        };
        let consumer = {
            let stop = stop.clone();
            let pause_threshold = self.config.pause_threshold;
            thread::spawn(move || {
                run_consumer(raw_rx, stop, shared, store, pause_threshold, poller, summary_tx)
            })
        };

        Ok(RecordingHandle {
            stop,
            threads: vec![consumer],
            summary_rx,
        })
    }
}

fn run_consumer(
    rx: Receiver<RawInput>,
    stop: Arc<AtomicBool>,
    shared: Arc<Mutex<SegmentState>>,
    store: Arc<PatternStore>,
    pause_threshold: Duration,
    poller: thread::JoinHandle<()>,
    summary_tx: Sender<RecordingSummary>,
) {
    let mut session = CaptureSession::new(Instant::now(), pause_threshold);

    while !stop.load(Ordering::Relaxed) {
        match rx.recv_timeout(TICK) {
            Ok(raw) => ingest(&mut session, &shared, raw),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    // Whatever arrived before the stop still belongs to the session.
    while let Ok(raw) = rx.try_recv() {
        ingest(&mut session, &shared, raw);
    }
    // The poller may be mid-finalize; wait it out so the final take
    // below sees every saved path.
    let _ = poller.join();

    if let Some(pause) = session.finish(Instant::now()) {
        let mut state = shared.lock();
        if state.current_action.is_some() {
            state.buffer.push(pause);
        }
    }

    let (action, buffer, mut artifacts) = {
        let mut state = shared.lock();
        (
            state.current_action.take(),
            std::mem::take(&mut state.buffer),
            std::mem::take(&mut state.saved),
        )
    };

    if let Some(action) = action {
        if let Some(path) = store.save(&action, &buffer) {
            artifacts.push(path);
        }
    } else if !session.events().is_empty() {
        // No action was ever named; keep the whole session under a
        // generic name so nothing recorded is lost.
        let name = format!("recording_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"));
        if let Some(path) = store.save(&name, session.events()) {
            artifacts.push(path);
        }
    }

    let summary = RecordingSummary {
        total_events: session.event_count(),
        artifacts,
    };
    info!(
        "recording stopped ({} events, {} artifacts)",
        summary.total_events,
        summary.artifacts.len()
    );
    let _ = summary_tx.try_send(summary);
}

fn ingest(session: &mut CaptureSession, shared: &Mutex<SegmentState>, raw: RawInput) {
    let produced = match raw {
        RawInput::MouseMove { x, y, at } => session.mouse_moved(x, y, at),
        RawInput::MouseButton {
            button,
            pressed,
            x,
            y,
            at,
        } => session.button_changed(button, pressed, x, y, at),
        RawInput::Key { key, pressed, at } => session.key_changed(&key, pressed, at),
    };
    if produced.is_empty() {
        return;
    }
    let mut state = shared.lock();
    // Events only count toward an action once one is named.
    if state.current_action.is_some() {
        state.buffer.extend(produced);
    }
}

fn run_segmenter(
    mut segmenter: ActionSegmenter,
    stop: Arc<AtomicBool>,
    shared: Arc<Mutex<SegmentState>>,
    store: Arc<PatternStore>,
) {
    while !stop.load(Ordering::Relaxed) {
        if let Some(path) = segmenter.poll(&shared, &store, Instant::now()) {
            shared.lock().saved.push(path);
        }
        thread::sleep(TICK);
    }
    debug!("segmenter stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    fn test_config(dir: &std::path::Path) -> RecorderConfig {
        RecorderConfig {
            pause_threshold: Duration::from_millis(50),
            action_check_interval: Duration::ZERO,
            patterns_dir: dir.join("patterns"),
            queue_path: dir.join("queue.txt"),
            max_buffer: 1024,
        }
    }

    #[test]
    fn named_action_is_finalized_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("queue.txt"), "mine_ore\n").unwrap();

        let (tx, rx) = bounded(64);
        let handle = Recorder::new(test_config(dir.path())).start(rx).unwrap();

        // Give the segmenter time to pick the action up before any input.
        thread::sleep(Duration::from_millis(150));
        let t = Instant::now();
        tx.send(RawInput::MouseMove { x: 0, y: 0, at: t }).unwrap();
        tx.send(RawInput::MouseMove {
            x: 5,
            y: 5,
            at: t + Duration::from_millis(10),
        })
        .unwrap();
        thread::sleep(Duration::from_millis(150));

        let summary = handle.stop();
        assert!(summary.total_events >= 2);
        assert_eq!(summary.artifacts.len(), 1);

        let store = PatternStore::new(dir.path().join("patterns")).unwrap();
        let files = store.list().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with("mine_ore_"));
    }

    #[test]
    fn segment_saves_reach_the_summary() {
        let dir = tempfile::tempdir().unwrap();
        let queue = dir.path().join("queue.txt");
        fs::write(&queue, "first_action\n").unwrap();

        let (tx, rx) = bounded(64);
        let handle = Recorder::new(test_config(dir.path())).start(rx).unwrap();
        thread::sleep(Duration::from_millis(150));

        let t = Instant::now();
        tx.send(RawInput::MouseMove { x: 0, y: 0, at: t }).unwrap();
        tx.send(RawInput::MouseMove {
            x: 5,
            y: 5,
            at: t + Duration::from_millis(10),
        })
        .unwrap();
        thread::sleep(Duration::from_millis(150));

        // Head change: the poller finalizes the first action on its own,
        // well before stop.
        fs::write(&queue, "second_action\n").unwrap();
        thread::sleep(Duration::from_millis(200));
        tx.send(RawInput::Key {
            key: "w".to_string(),
            pressed: true,
            at: Instant::now(),
        })
        .unwrap();
        thread::sleep(Duration::from_millis(150));

        let summary = handle.stop();
        assert_eq!(summary.artifacts.len(), 2);
        let names: Vec<_> = summary
            .artifacts
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert!(names.iter().any(|n| n.starts_with("first_action_")));
        assert!(names.iter().any(|n| n.starts_with("second_action_")));
    }

    #[test]
    fn unsegmented_session_saves_generic_recording() {
        let dir = tempfile::tempdir().unwrap();
        // No queue file at all: nothing ever names an action.
        let (tx, rx) = bounded(64);
        let handle = Recorder::new(test_config(dir.path())).start(rx).unwrap();

        let t = Instant::now();
        tx.send(RawInput::Key {
            key: "a".to_string(),
            pressed: true,
            at: t,
        })
        .unwrap();
        tx.send(RawInput::Key {
            key: "a".to_string(),
            pressed: false,
            at: t + Duration::from_millis(10),
        })
        .unwrap();
        thread::sleep(Duration::from_millis(120));

        let summary = handle.stop();
        // Two key events plus the trailing pause from the final check.
        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.artifacts.len(), 1);

        let name = summary.artifacts[0]
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(name.starts_with("recording_"));

        let store = PatternStore::new(dir.path().join("patterns")).unwrap();
        let recording = store.load(&summary.artifacts[0]).unwrap();
        assert_eq!(recording.total_events, 3);
    }

    #[test]
    fn events_before_an_action_are_not_buffered() {
        let shared = Mutex::new(SegmentState::new());
        let mut session = CaptureSession::new(Instant::now(), Duration::from_millis(50));

        ingest(
            &mut session,
            &shared,
            RawInput::MouseMove {
                x: 1,
                y: 1,
                at: Instant::now(),
            },
        );
        assert!(shared.lock().buffer.is_empty());
        assert_eq!(session.event_count(), 1);
    }
}
