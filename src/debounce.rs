// ============================================================================
// Debounce
// ============================================================================
//
// Single-slot debouncer driven by caller-supplied timestamps.
//
// At most one timer is ever live: scheduling again replaces the pending
// payload and pushes the deadline out.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Schedule `payload`, cancelling whatever was pending.
    pub fn schedule(&mut self, now: Instant, payload: T) {
        self.pending = Some((now + self.window, payload));
    }

    /// Take the payload if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((deadline, _)) if now >= *deadline => self.pending.take().map(|(_, p)| p),
            _ => None,
        }
    }

    /// Take the payload regardless of its deadline.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(_, p)| p)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|(_, p)| p)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(d, _)| *d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_after_window() {
        let start = Instant::now();
        let mut d = Debouncer::from_millis(200);
        d.schedule(start, 1);
        assert_eq!(d.poll(start + Duration::from_millis(199)), None);
        assert_eq!(d.poll(start + Duration::from_millis(200)), Some(1));
        assert!(!d.is_pending());
    }

    #[test]
    fn test_reschedule_replaces_payload_and_deadline() {
        let start = Instant::now();
        let mut d = Debouncer::from_millis(600);
        d.schedule(start, "old");
        d.schedule(start + Duration::from_millis(500), "new");
        assert_eq!(d.poll(start + Duration::from_millis(700)), None);
        assert_eq!(d.poll(start + Duration::from_millis(1100)), Some("new"));
        assert_eq!(d.poll(start + Duration::from_millis(5000)), None);
    }

    #[test]
    fn test_flush_and_cancel() {
        let start = Instant::now();
        let mut d = Debouncer::from_millis(600);
        d.schedule(start, 7);
        assert_eq!(d.flush(), Some(7));
        d.schedule(start, 8);
        d.cancel();
        assert_eq!(d.poll(start + Duration::from_secs(10)), None);
    }
}
