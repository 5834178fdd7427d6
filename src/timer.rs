use std::time::{Duration, Instant};

/// A cancellable repeating timer driven by the caller's clock.
///
/// Nothing fires on its own: the event loop asks how long it may sleep
/// ([`RepeatingTimer::time_until_due`]) and calls [`RepeatingTimer::fire`]
/// once that much time has passed. At most one firing is reported per call,
/// so a stalled loop never replays a burst of missed ticks.
#[derive(Debug, Clone, Default)]
pub struct RepeatingTimer {
    interval: Option<Duration>,
    next_due: Option<Instant>,
}

impl RepeatingTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)arm the timer; the first firing is one interval from `now`.
    pub fn arm(&mut self, interval: Duration, now: Instant) {
        self.interval = Some(interval);
        self.next_due = Some(now + interval);
    }

    pub fn cancel(&mut self) {
        self.interval = None;
        self.next_due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }

    /// Returns true and schedules the next firing when the timer is due.
    pub fn fire(&mut self, now: Instant) -> bool {
        let (Some(due), Some(interval)) = (self.next_due, self.interval) else {
            return false;
        };
        if now < due {
            return false;
        }
        let next = due + interval;
        self.next_due = Some(if next > now { next } else { now + interval });
        true
    }
}
