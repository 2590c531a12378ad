use std::time::{Duration, Instant};

/// Trailing-edge debouncer driven by caller-supplied instants.
///
/// Each `schedule` replaces the pending value and pushes the deadline out to
/// `now + delay`. The value is released by the first `fire` at or after the
/// deadline.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<Pending<T>>,
}

#[derive(Debug, Clone)]
struct Pending<T> {
    value: T,
    deadline: Instant,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some(Pending {
            value,
            deadline: now + self.delay,
        });
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    /// Release the pending value if its deadline has passed.
    pub fn fire(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some(p) if now >= p.deadline => self.pending.take().map(|p| p.value),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(100);

    #[test]
    fn fires_only_after_deadline() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.schedule(1, t0);
        assert_eq!(d.fire(t0 + Duration::from_millis(99)), None);
        assert_eq!(d.fire(t0 + DELAY), Some(1));
        assert_eq!(d.deadline(), None);
    }

    #[test]
    fn rapid_schedules_coalesce_into_latest_value() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.schedule(1, t0);
        d.schedule(2, t0 + Duration::from_millis(50));
        d.schedule(3, t0 + Duration::from_millis(90));
        assert_eq!(d.fire(t0 + Duration::from_millis(150)), None);
        assert_eq!(d.deadline(), Some(t0 + Duration::from_millis(190)));
        assert_eq!(d.fire(t0 + Duration::from_millis(190)), Some(3));
        assert_eq!(d.fire(t0 + Duration::from_millis(500)), None);
    }

    #[test]
    fn cancel_drops_pending_value() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.schedule("window", t0);
        d.cancel();
        assert_eq!(d.fire(t0 + DELAY * 2), None);
        assert_eq!(d.deadline(), None);
    }
}
