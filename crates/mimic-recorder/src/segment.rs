//! Action segmentation.
//!
//! The head line of the action queue names the action currently being
//! captured. When the head changes, the buffer collected for the previous
//! action is finalized through the store. The fields touched by both the
//! capture thread and the poll thread sit behind one mutex; the finalize
//! write itself happens after the lock is released.

use std::mem;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use mimic_core::action::ActionQueue;
use mimic_core::events::Event;
use mimic_core::store::PatternStore;

/// State shared between the capture consumer and the segmenter poller.
#[derive(Debug, Default)]
pub struct SegmentState {
    /// Raw queue line naming the action in progress, if any.
    pub current_action: Option<String>,
    /// Events collected since the current action began.
    pub buffer: Vec<Event>,
    /// Artifacts written by segment finalization, drained into the
    /// session summary on stop.
    pub saved: Vec<PathBuf>,
}

impl SegmentState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Rate-limited queue watcher that drives segment finalization.
pub struct ActionSegmenter {
    queue: ActionQueue,
    interval: Duration,
    last_poll: Option<Instant>,
}

impl ActionSegmenter {
    pub fn new(queue: ActionQueue, interval: Duration) -> Self {
        Self {
            queue,
            interval,
            last_poll: None,
        }
    }

    /// One poll step. The first call runs immediately; later calls are
    /// skipped until `interval` has elapsed since the previous one. On a
    /// head change the previous action's buffer is swapped out under the
    /// lock and saved once the lock is released. Returns the artifact path
    /// when a finalize wrote one.
    pub fn poll(
        &mut self,
        shared: &Mutex<SegmentState>,
        store: &PatternStore,
        now: Instant,
    ) -> Option<PathBuf> {
        if let Some(last) = self.last_poll {
            if now.saturating_duration_since(last) < self.interval {
                return None;
            }
        }
        self.last_poll = Some(now);

        let head = self.queue.head()?;

        let finalize = {
            let mut state = shared.lock();
            if state.current_action.as_deref() == Some(head.as_str()) {
                return None;
            }
            let previous = state.current_action.replace(head.clone());
            let buffer = mem::take(&mut state.buffer);
            previous.map(|action| (action, buffer))
        };

        match finalize {
            Some((action, events)) if !events.is_empty() => {
                info!("action changed to '{}', finalizing '{}'", head, action);
                store.save(&action, &events)
            }
            Some((action, _)) => {
                debug!("action changed to '{}', nothing buffered for '{}'", head, action);
                None
            }
            None => {
                info!("recording action '{}'", head);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::time::Duration;

    use mimic_core::events::MoveMetrics;

    fn event(offset: u64) -> Event {
        Event::MouseMove {
            x: 1,
            y: 1,
            time_offset_ms: offset,
            metrics: MoveMetrics::default(),
        }
    }

    #[test]
    fn head_change_finalizes_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let queue_path = dir.path().join("queue.txt");
        let store = PatternStore::new(dir.path().join("patterns")).unwrap();
        let shared = Mutex::new(SegmentState::new());
        let mut segmenter = ActionSegmenter::new(
            ActionQueue::new(&queue_path),
            Duration::from_millis(500),
        );

        fs::write(&queue_path, "chop_tree\n").unwrap();
        let t0 = Instant::now();
        assert!(segmenter.poll(&shared, &store, t0).is_none());
        assert_eq!(shared.lock().current_action.as_deref(), Some("chop_tree"));

        shared.lock().buffer.push(event(10));
        shared.lock().buffer.push(event(20));

        fs::write(&queue_path, "drop_logs\n").unwrap();
        let saved = segmenter.poll(&shared, &store, t0 + Duration::from_millis(600));
        assert!(saved.is_some());
        assert_eq!(store.list().unwrap().len(), 1);

        let state = shared.lock();
        assert_eq!(state.current_action.as_deref(), Some("drop_logs"));
        assert!(state.buffer.is_empty());
        drop(state);

        // Same head again: nothing new to finalize.
        let again = segmenter.poll(&shared, &store, t0 + Duration::from_millis(1200));
        assert!(again.is_none());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn poll_is_rate_limited() {
        let dir = tempfile::tempdir().unwrap();
        let queue_path = dir.path().join("queue.txt");
        let store = PatternStore::new(dir.path().join("patterns")).unwrap();
        let shared = Mutex::new(SegmentState::new());
        let mut segmenter = ActionSegmenter::new(
            ActionQueue::new(&queue_path),
            Duration::from_millis(500),
        );

        fs::write(&queue_path, "first\n").unwrap();
        let t0 = Instant::now();
        segmenter.poll(&shared, &store, t0);

        // A head change inside the interval is not observed yet.
        fs::write(&queue_path, "second\n").unwrap();
        segmenter.poll(&shared, &store, t0 + Duration::from_millis(100));
        assert_eq!(shared.lock().current_action.as_deref(), Some("first"));

        segmenter.poll(&shared, &store, t0 + Duration::from_millis(600));
        assert_eq!(shared.lock().current_action.as_deref(), Some("second"));
    }

    #[test]
    fn empty_buffer_change_saves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let queue_path = dir.path().join("queue.txt");
        let store = PatternStore::new(dir.path().join("patterns")).unwrap();
        let shared = Mutex::new(SegmentState::new());
        let mut segmenter = ActionSegmenter::new(
            ActionQueue::new(&queue_path),
            Duration::from_millis(0),
        );

        fs::write(&queue_path, "idle\n").unwrap();
        let t0 = Instant::now();
        segmenter.poll(&shared, &store, t0);
        fs::write(&queue_path, "walk\n").unwrap();
        let saved = segmenter.poll(&shared, &store, t0 + Duration::from_millis(1));
        assert!(saved.is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn missing_queue_leaves_state_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = PatternStore::new(dir.path().join("patterns")).unwrap();
        let shared = Mutex::new(SegmentState::new());
        let mut segmenter = ActionSegmenter::new(
            ActionQueue::new(dir.path().join("nope.txt")),
            Duration::from_millis(0),
        );

        assert!(segmenter.poll(&shared, &store, Instant::now()).is_none());
        assert!(shared.lock().current_action.is_none());
    }
}
