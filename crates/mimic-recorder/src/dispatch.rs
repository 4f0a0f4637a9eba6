//! Queue-driven replay dispatch.
//!
//! The replay-side counterpart of the segmenter: watch the action queue,
//! resolve each head line to the newest matching pattern, play it, move
//! on. Head lines are consumed whether or not playback happened, so one
//! bad entry can never wedge the queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use mimic_core::action::{ActionDescriptor, ActionQueue};
use mimic_core::store::PatternStore;

use crate::replay::{ReplayEngine, ReplayOutcome, StopHandle};

pub struct ActionDispatcher {
    queue: ActionQueue,
    store: PatternStore,
    engine: ReplayEngine,
    interval: Duration,
    stop: Arc<AtomicBool>,
}

impl ActionDispatcher {
    pub fn new(
        queue: ActionQueue,
        store: PatternStore,
        engine: ReplayEngine,
        interval: Duration,
    ) -> Self {
        Self {
            queue,
            store,
            engine,
            interval,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that ends [`run`](Self::run) after the current dispatch.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Handle that cancels a replay already in progress. Pairs with
    /// [`stop_flag`](Self::stop_flag) for a prompt shutdown.
    pub fn replay_stop(&self) -> StopHandle {
        self.engine.stop_handle()
    }

    /// Block, dispatching queue entries until the stop flag is set. The
    /// queue is polled only between replays; playback itself is
    /// synchronous.
    pub fn run(&mut self) {
        info!("dispatching from {}", self.queue.path().display());
        while !self.stop.load(Ordering::SeqCst) {
            self.dispatch_next();
            thread::sleep(self.interval);
        }
        info!("dispatcher stopped");
    }

    /// One poll step: read the head line, resolve it, play it, consume
    /// it. Returns the playback outcome when a pattern was played.
    pub fn dispatch_next(&mut self) -> Option<ReplayOutcome> {
        let line = self.queue.head()?;
        let descriptor = ActionDescriptor::parse(&line);
        debug!(
            "queue head '{}' -> type '{}', box {:?}",
            line, descriptor.action_type, descriptor.box_id
        );

        let outcome = match self
            .store
            .find_latest(&descriptor.action_type, descriptor.box_id)
        {
            Some(path) => match self.engine.load(&self.store, &path) {
                Ok(count) => {
                    info!("playing {} ({} events) for '{}'", path.display(), count, line);
                    Some(self.engine.play())
                }
                Err(e) => {
                    warn!("cannot load pattern for '{}': {}", line, e);
                    None
                }
            },
            None => {
                warn!(
                    "no pattern recorded for '{}', skipping",
                    descriptor.action_type
                );
                None
            }
        };

        // Consume regardless of outcome; a missing pattern must not turn
        // into an infinite retry.
        if let Err(e) = self.queue.consume_head() {
            warn!("cannot consume queue head: {}", e);
        }
        outcome
    }
}
