use std::time::{Duration, Instant};

/// Periods that would overflow `Instant` fall back to this
pub const MAX_TIMER_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Repeating deadline polled by the foreground loop.
///
/// Ticks missed while the loop was busy collapse into one; the next deadline
/// is always measured from the instant the tick was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicTimer {
    period: Duration,
    next_due: Instant,
}

impl PeriodicTimer {
    pub fn start(now: Instant, period: Duration) -> Self {
        Self {
            period,
            next_due: due_after(now, period),
        }
    }

    /// True once per elapsed period
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due = due_after(now, self.period);
        true
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }
}

fn due_after(now: Instant, period: Duration) -> Instant {
    now.checked_add(period)
        .or_else(|| now.checked_add(MAX_TIMER_PERIOD))
        .unwrap_or(now)
}
