//! Window focus gating.

use std::time::{Duration, Instant};

/// Answers "does the target window have focus right now".
pub trait FocusProbe: Send {
    fn is_focused(&mut self) -> bool;
}

/// Fixed verdict, for tests and for platforms without a window backend.
pub struct StaticFocus(pub bool);

impl FocusProbe for StaticFocus {
    fn is_focused(&mut self) -> bool {
        self.0
    }
}

/// Caches the wrapped probe's verdict between real queries, so replay can
/// re-check focus around every step without hammering the OS window list.
pub struct RateLimited<P> {
    inner: P,
    interval: Duration,
    checked_at: Option<Instant>,
    verdict: bool,
}

impl<P: FocusProbe> RateLimited<P> {
    pub fn new(inner: P, interval: Duration) -> Self {
        Self {
            inner,
            interval,
            checked_at: None,
            verdict: false,
        }
    }
}

impl<P: FocusProbe> FocusProbe for RateLimited<P> {
    fn is_focused(&mut self) -> bool {
        let now = Instant::now();
        let stale = match self.checked_at {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= self.interval,
        };
        if stale {
            self.verdict = self.inner.is_focused();
            self.checked_at = Some(now);
        }
        self.verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting {
        calls: usize,
        verdict: bool,
    }

    impl FocusProbe for Counting {
        fn is_focused(&mut self) -> bool {
            self.calls += 1;
            self.verdict
        }
    }

    #[test]
    fn caches_between_intervals() {
        let mut probe = RateLimited::new(
            Counting {
                calls: 0,
                verdict: true,
            },
            Duration::from_millis(50),
        );

        assert!(probe.is_focused());
        assert!(probe.is_focused());
        assert!(probe.is_focused());
        assert_eq!(probe.inner.calls, 1);

        std::thread::sleep(Duration::from_millis(60));
        assert!(probe.is_focused());
        assert_eq!(probe.inner.calls, 2);
    }

    #[test]
    fn zero_interval_always_queries() {
        let mut probe = RateLimited::new(
            Counting {
                calls: 0,
                verdict: false,
            },
            Duration::ZERO,
        );
        probe.is_focused();
        probe.is_focused();
        assert_eq!(probe.inner.calls, 2);
    }
}
